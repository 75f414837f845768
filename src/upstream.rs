//! Upstream connector.
//!
//! Both listeners forward through [`Upstream::exchange`]: open a fresh TCP
//! connection to the resolver, write one framed request, read one framed
//! response, close. Connections are never reused across queries.

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::UpstreamConfig;
use crate::error::{RelayError, Result};
use crate::frame::read_frame;

/// The upstream resolver all queries are forwarded to.
#[derive(Debug, Clone)]
pub struct Upstream {
    host: String,
    port: u16,
    timeout: Duration,
    /// Display form of `host:port`, used in errors and logs
    endpoint: String,
}

impl Upstream {
    pub fn new(config: &UpstreamConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            timeout: config.timeout,
            endpoint: config.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send one framed request and return the complete framed response.
    ///
    /// The whole exchange (connect, write, read) runs under the configured
    /// deadline. On expiry the connection is dropped.
    pub async fn exchange(&self, request: &[u8]) -> Result<Vec<u8>> {
        match timeout(self.timeout, self.round_trip(request)).await {
            Ok(result) => result,
            Err(_) => Err(RelayError::Timeout {
                upstream: self.endpoint.clone(),
                after: self.timeout,
            }),
        }
    }

    async fn round_trip(&self, request: &[u8]) -> Result<Vec<u8>> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|source| RelayError::Connect {
                upstream: self.endpoint.clone(),
                source,
            })?;
        stream.set_nodelay(true).ok();

        stream
            .write_all(request)
            .await
            .map_err(|source| self.io_error(source))?;

        let response = read_frame(&mut stream)
            .await
            .map_err(|source| self.io_error(source))?
            .ok_or_else(|| RelayError::UpstreamClosed {
                upstream: self.endpoint.clone(),
            })?;

        // Best effort; the socket is closed on drop either way.
        let _ = stream.shutdown().await;

        Ok(response)
    }

    fn io_error(&self, source: std::io::Error) -> RelayError {
        RelayError::Upstream {
            upstream: self.endpoint.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn upstream_on(port: u16, timeout: Duration) -> Upstream {
        Upstream::new(&UpstreamConfig {
            host: "127.0.0.1".to_string(),
            port,
            timeout,
        })
    }

    #[tokio::test]
    async fn exchange_returns_full_response_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let request = read_frame(&mut stream).await.unwrap().unwrap();
            assert_eq!(request, [0x00, 0x02, 0x12, 0x34]);

            // Response split across two writes.
            stream.write_all(&[0x00, 0x03, 0xAA]).await.unwrap();
            stream.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            stream.write_all(&[0xBB, 0xCC]).await.unwrap();

            // The relay closes its side after one response.
            let mut rest = Vec::new();
            stream.read_to_end(&mut rest).await.unwrap();
            assert!(rest.is_empty());
        });

        let upstream = upstream_on(port, Duration::from_secs(2));
        let response = upstream.exchange(&[0x00, 0x02, 0x12, 0x34]).await.unwrap();
        assert_eq!(response, [0x00, 0x03, 0xAA, 0xBB, 0xCC]);

        server.await.unwrap();
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let upstream = upstream_on(port, Duration::from_secs(2));
        let err = upstream.exchange(&[0x00, 0x01, 0x00]).await.unwrap_err();
        assert!(matches!(err, RelayError::Connect { .. }), "{err}");
    }

    #[tokio::test]
    async fn silent_upstream_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
            drop(stream);
        });

        let upstream = upstream_on(port, Duration::from_millis(100));
        let err = upstream.exchange(&[0x00, 0x01, 0x00]).await.unwrap_err();
        assert!(matches!(err, RelayError::Timeout { .. }), "{err}");

        server.abort();
    }

    #[tokio::test]
    async fn closed_without_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _ = read_frame(&mut stream).await;
        });

        let upstream = upstream_on(port, Duration::from_secs(2));
        let err = upstream.exchange(&[0x00, 0x01, 0x00]).await.unwrap_err();
        assert!(matches!(err, RelayError::UpstreamClosed { .. }), "{err}");
    }
}
