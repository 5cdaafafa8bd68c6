use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One submitted unit of work. Lives only as long as its request handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: Uuid,
    pub language: String,
    pub filename: String,
    pub source: String,
    pub received_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        language: impl Into<String>,
        filename: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            language: language.into(),
            filename: filename.into(),
            source: source.into(),
            received_at: Utc::now(),
        }
    }

    /// Delimited wire form forwarded to workers: `language|filename|source`.
    pub fn to_wire(&self) -> String {
        format!("{}|{}|{}", self.language, self.filename, self.source)
    }

    /// Milliseconds since the job was received.
    pub fn age_ms(&self) -> i64 {
        (Utc::now() - self.received_at).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_creation() {
        let job = Job::new("python", "main.py", "print(2+2)");
        assert_eq!(job.language, "python");
        assert_eq!(job.filename, "main.py");
        assert_eq!(job.source, "print(2+2)");
        assert!(job.age_ms() >= 0);
    }

    #[test]
    fn jobs_get_distinct_ids() {
        let a = Job::new("c", "a.c", "");
        let b = Job::new("c", "a.c", "");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn wire_form_keeps_pipes_in_source() {
        let job = Job::new("c++", "x.cpp", "int main(){return 1|2;}");
        assert_eq!(job.to_wire(), "c++|x.cpp|int main(){return 1|2;}");
    }
}
