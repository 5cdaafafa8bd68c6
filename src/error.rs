use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("Invalid request: {0}")]
    Protocol(String),

    /// The payload names a language outside the supported set. The offending
    /// tag is kept for logging only; the rendered text is fixed.
    #[error("Unsupported or unknown language")]
    UnsupportedLanguage(String),

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker {addr} unreachable: {reason}")]
    Delegation { addr: SocketAddr, reason: String },

    #[error("No worker available")]
    NoWorkerAvailable,

    #[error("Worker on port {0} did not pass its health check")]
    Unhealthy(u16),

    #[error("Admin request not authorized from {0}")]
    AdminUnauthorized(IpAddr),

    #[error("{0}")]
    AdminValue(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl JudgeError {
    /// Text written back to the client when this error ends a request.
    pub fn to_response(&self) -> String {
        format!("Error: {}\n", self)
    }
}

pub type Result<T> = std::result::Result<T, JudgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_language_text_is_fixed() {
        let a = JudgeError::UnsupportedLanguage("rust".into()).to_response();
        let b = JudgeError::UnsupportedLanguage("cobol".into()).to_response();
        assert_eq!(a, b);
        assert_eq!(a, "Error: Unsupported or unknown language\n");
    }

    #[test]
    fn protocol_error_carries_reason() {
        let err = JudgeError::Protocol("expected language|filename|source".into());
        assert!(err
            .to_response()
            .contains("expected language|filename|source"));
    }
}
