use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{JudgeError, Result};
use crate::protocol::AdminRequest;
use crate::scheduler::Job;

/// Send one payload and collect every byte the peer writes until it closes.
///
/// The write side is shut down after the payload so the peer sees EOF.
pub async fn exchange(
    addr: SocketAddr,
    payload: &[u8],
    connect_timeout: Duration,
    io_timeout: Duration,
) -> Result<Vec<u8>> {
    let mut stream = tokio::time::timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| JudgeError::Delegation {
            addr,
            reason: format!("connect timed out after {:?}", connect_timeout),
        })?
        .map_err(|e| JudgeError::Delegation {
            addr,
            reason: format!("connect failed: {}", e),
        })?;

    let io = async {
        stream.write_all(payload).await?;
        stream.shutdown().await?;
        let mut response = Vec::new();
        stream.read_to_end(&mut response).await?;
        Ok::<_, std::io::Error>(response)
    };

    tokio::time::timeout(io_timeout, io)
        .await
        .map_err(|_| JudgeError::Delegation {
            addr,
            reason: format!("no complete response within {:?}", io_timeout),
        })?
        .map_err(|e| JudgeError::Delegation {
            addr,
            reason: e.to_string(),
        })
}

/// Client for a master or worker listener.
#[derive(Debug, Clone)]
pub struct JudgeClient {
    addr: SocketAddr,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl JudgeClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(5),
            io_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Submit source in the delimited form.
    pub async fn submit(&self, language: &str, filename: &str, source: &str) -> Result<String> {
        let job = Job::new(language, filename, source);
        self.send(job.to_wire().as_bytes()).await
    }

    /// Submit source in the legacy line form.
    pub async fn submit_legacy(&self, language: &str, source: &str) -> Result<String> {
        let frame = format!("{}\n{}\n{}", language, source.len(), source);
        self.send(frame.as_bytes()).await
    }

    pub async fn admin(&self, request: &AdminRequest) -> Result<String> {
        self.send(request.to_wire().as_bytes()).await
    }

    /// Send raw bytes and return the response text.
    pub async fn send(&self, payload: &[u8]) -> Result<String> {
        let response = exchange(self.addr, payload, self.connect_timeout, self.io_timeout).await?;
        Ok(String::from_utf8_lossy(&response).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn exchange_reads_until_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            stream.read_to_end(&mut request).await.unwrap();
            stream.write_all(b"echo:").await.unwrap();
            stream.write_all(&request).await.unwrap();
        });

        let response = exchange(addr, b"ping", Duration::from_secs(1), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(response, b"echo:ping");
    }

    #[tokio::test]
    async fn exchange_reports_refused_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = exchange(addr, b"x", Duration::from_secs(1), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, JudgeError::Delegation { .. }));
    }

    #[tokio::test]
    async fn exchange_times_out_on_silent_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(stream);
        });

        let err = exchange(addr, b"x", Duration::from_secs(1), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no complete response"));
    }
}
