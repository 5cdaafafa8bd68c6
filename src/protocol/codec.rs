use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::ReadLimits;
use crate::error::{JudgeError, Result};
use crate::protocol::message::{is_legacy_language, Request};

const CHUNK_SIZE: usize = 8192;

/// Which wire form a message uses, decided by its first delimiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Form {
    /// `LANGUAGE\n<length>\n<bytes>`
    Legacy,
    /// `language|filename|source` or `ADMIN|...`
    Delimited,
}

fn classify(buf: &[u8]) -> Option<Form> {
    buf.iter().find_map(|b| match b {
        b'\n' => Some(Form::Legacy),
        b'|' => Some(Form::Delimited),
        _ => None,
    })
}

/// Buffered reader for one inbound message.
struct FrameReader<'a, R> {
    reader: &'a mut R,
    limits: &'a ReadLimits,
    buf: Vec<u8>,
    eof: bool,
}

impl<'a, R: AsyncRead + Unpin> FrameReader<'a, R> {
    fn new(reader: &'a mut R, limits: &'a ReadLimits) -> Self {
        Self {
            reader,
            limits,
            buf: Vec::new(),
            eof: false,
        }
    }

    /// Read one chunk. Returns false on EOF or when the sender went quiet for
    /// longer than `wait`.
    async fn fill(&mut self, wait: std::time::Duration) -> Result<bool> {
        if self.eof {
            return Ok(false);
        }
        let mut chunk = [0u8; CHUNK_SIZE];
        let n = match tokio::time::timeout(wait, self.reader.read(&mut chunk)).await {
            Ok(read) => read?,
            Err(_) => return Ok(false),
        };
        if n == 0 {
            self.eof = true;
            return Ok(false);
        }
        if self.buf.len() + n > self.limits.max_message_bytes {
            return Err(JudgeError::Protocol(format!(
                "message exceeds {} bytes",
                self.limits.max_message_bytes
            )));
        }
        self.buf.extend_from_slice(&chunk[..n]);
        Ok(true)
    }

    /// Wait for data the sender is still expected to send.
    async fn fill_required(&mut self, what: &str) -> Result<()> {
        if self.fill(self.limits.first_byte_timeout).await? {
            Ok(())
        } else {
            Err(JudgeError::Protocol(format!(
                "connection ended before {}",
                what
            )))
        }
    }

    /// Position just past the `n`-th newline, reading as needed.
    async fn line_end(&mut self, n: usize, what: &str) -> Result<usize> {
        loop {
            let found = self
                .buf
                .iter()
                .enumerate()
                .filter(|(_, b)| **b == b'\n')
                .nth(n - 1)
                .map(|(i, _)| i + 1);
            if let Some(end) = found {
                return Ok(end);
            }
            self.fill_required(what).await?;
        }
    }

    async fn read_legacy(mut self) -> Result<Request> {
        let language_end = self.line_end(1, "language line").await?;
        let length_end = self.line_end(2, "length line").await?;

        let language = String::from_utf8_lossy(&self.buf[..language_end]).trim().to_string();
        let length_line = String::from_utf8_lossy(&self.buf[language_end..length_end]);
        let length: usize = length_line.trim().parse().map_err(|_| {
            JudgeError::Protocol(format!("invalid code length {:?}", length_line.trim()))
        })?;
        if length > self.limits.max_message_bytes {
            return Err(JudgeError::Protocol(format!(
                "code length {} exceeds {} bytes",
                length, self.limits.max_message_bytes
            )));
        }

        while self.buf.len() < length_end + length {
            self.fill_required("end of code").await?;
        }
        let code = &self.buf[length_end..length_end + length];
        let source = String::from_utf8_lossy(code).into_owned();
        Ok(Request::from_legacy(&language, source))
    }

    async fn read_delimited(mut self) -> Result<Request> {
        // No length header: the message ends at EOF or when the sender stops.
        while self.fill(self.limits.quiet_period).await? {}
        let text = String::from_utf8_lossy(&self.buf);
        Request::parse_delimited(&text)
    }
}

/// Read and parse one request in either wire form.
pub async fn read_request<R>(reader: &mut R, limits: &ReadLimits) -> Result<Request>
where
    R: AsyncRead + Unpin,
{
    let mut frame = FrameReader::new(reader, limits);

    let form = loop {
        if let Some(form) = classify(&frame.buf) {
            break form;
        }
        let wait = if frame.buf.is_empty() {
            limits.first_byte_timeout
        } else {
            limits.quiet_period
        };
        if !frame.fill(wait).await? {
            if frame.buf.is_empty() {
                return Err(JudgeError::Protocol("empty request".to_string()));
            }
            break Form::Delimited;
        }
    };

    match form {
        Form::Legacy => {
            let first_line = frame
                .buf
                .iter()
                .position(|b| *b == b'\n')
                .map(|i| String::from_utf8_lossy(&frame.buf[..i]).into_owned())
                .unwrap_or_default();
            if !is_legacy_language(&first_line) {
                // Unknown legacy tokens still carry a length frame; let the
                // executor reject the language.
                tracing::debug!(token = %first_line.trim(), "Unrecognized legacy language token");
            }
            frame.read_legacy().await
        }
        Form::Delimited => frame.read_delimited().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    fn limits() -> ReadLimits {
        ReadLimits {
            max_message_bytes: 1024,
            first_byte_timeout: Duration::from_millis(500),
            quiet_period: Duration::from_millis(50),
        }
    }

    async fn read_bytes(bytes: &[u8]) -> Result<Request> {
        let mut reader = bytes;
        read_request(&mut reader, &limits()).await
    }

    fn job(request: Request) -> crate::scheduler::Job {
        match request {
            Request::Execute(job) => job,
            other => panic!("expected execute, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn reads_legacy_frame() {
        let job = job(read_bytes(b"PYTHON\n10\nprint(2+2)trailing").await.unwrap());
        assert_eq!(job.language, "PYTHON");
        assert_eq!(job.source, "print(2+2)");
    }

    #[tokio::test]
    async fn reads_delimited_to_eof() {
        let job = job(read_bytes(b"cpp|a.cpp|int main(){}\n").await.unwrap());
        assert_eq!(job.language, "cpp");
        assert_eq!(job.source, "int main(){}\n");
    }

    #[tokio::test]
    async fn delimited_source_may_contain_newlines_before_pipes() {
        let job = job(read_bytes(b"python|m.py|a = 1\nprint(a | 2)").await.unwrap());
        assert_eq!(job.source, "a = 1\nprint(a | 2)");
    }

    #[tokio::test]
    async fn reads_admin() {
        match read_bytes(b"ADMIN|GET_INFO").await.unwrap() {
            Request::Admin(req) => assert_eq!(req.subcommand, "GET_INFO"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejects_bad_length() {
        let err = read_bytes(b"C\nabc\nint main(){}").await.unwrap_err();
        assert!(err.to_string().contains("invalid code length"));
    }

    #[tokio::test]
    async fn rejects_truncated_legacy_code() {
        let err = read_bytes(b"C\n100\nint main(){}").await.unwrap_err();
        assert!(matches!(err, JudgeError::Protocol(_)));
    }

    #[tokio::test]
    async fn rejects_oversized_messages() {
        let big = vec![b'x'; 4096];
        assert!(read_bytes(&big).await.is_err());

        let err = read_bytes(b"C\n999999\n").await.unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[tokio::test]
    async fn rejects_empty_request() {
        assert!(read_bytes(b"").await.is_err());
    }

    #[tokio::test]
    async fn delimited_message_ends_on_quiet_period() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        client.write_all(b"python|a.py|print(1)").await.unwrap();

        // The writer stays open; the quiet period ends the message.
        let request = read_request(&mut server, &limits()).await.unwrap();
        assert_eq!(job(request).source, "print(1)");
        drop(client);
    }

    #[tokio::test]
    async fn legacy_frame_split_across_writes() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let reader = tokio::spawn(async move { read_request(&mut server, &limits()).await });

        client.write_all(b"JA").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        client.write_all(b"VA\n1").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        client.write_all(b"2\nclass Main{}").await.unwrap();

        let job = job(reader.await.unwrap().unwrap());
        assert_eq!(job.language, "JAVA");
        assert_eq!(job.filename, "Main.java");
        assert_eq!(job.source, "class Main{}");
    }
}
