use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::config::ReadLimits;
use crate::error::Result;
use crate::protocol::{read_request, Request};

/// Role-specific handling of a parsed request.
pub trait RequestHandler: Send + Sync + 'static {
    /// Produce the full response text for one request. Failures are rendered
    /// into the returned text.
    fn handle(&self, request: Request, peer: SocketAddr) -> impl Future<Output = String> + Send;
}

/// TCP listener speaking the judge wire protocol: one request and one
/// response per connection.
pub struct JudgeServer {
    listener: TcpListener,
    addr: SocketAddr,
}

impl JudgeServer {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        Ok(Self { listener, addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accept connections until `shutdown` is cancelled. Each connection is
    /// served on its own task, so a slow client never blocks the others.
    pub async fn serve<H: RequestHandler>(
        self,
        handler: Arc<H>,
        read_limits: ReadLimits,
        shutdown: CancellationToken,
    ) {
        tracing::info!(addr = %self.addr, "Listening for judge requests");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(addr = %self.addr, "Listener stopping");
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let handler = handler.clone();
                            let limits = read_limits.clone();
                            tokio::spawn(async move {
                                handle_connection(stream, peer, handler, limits).await;
                            });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }
    }
}

async fn handle_connection<H: RequestHandler>(
    mut stream: TcpStream,
    peer: SocketAddr,
    handler: Arc<H>,
    limits: ReadLimits,
) {
    let response = match read_request(&mut stream, &limits).await {
        Ok(request) => handler.handle(request, peer).await,
        Err(e) => {
            // Health probes connect and hang up without sending anything.
            tracing::debug!(peer = %peer, error = %e, "Rejected malformed request");
            e.to_response()
        }
    };

    if let Err(e) = stream.write_all(response.as_bytes()).await {
        tracing::debug!(peer = %peer, error = %e, "Client went away before the response was sent");
        return;
    }
    let _ = stream.shutdown().await;
}
