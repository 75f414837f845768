//! Error types for the relay.
//!
//! Every error is terminal for the single query (or listener) it occurs
//! in. Query tasks log their own failures; nothing here is surfaced to
//! clients, who only ever observe a missing response.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::transport::Transport;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
    /// The listen socket for one transport could not be bound.
    #[error("failed to bind {transport} listener on {addr}: {source}")]
    Bind {
        transport: Transport,
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// Neither the UDP nor the TCP listener could be bound.
    #[error("no listener could be bound")]
    NoListeners,

    /// The configured listen host did not resolve to any address.
    #[error("failed to resolve listen address {host}:{port}")]
    Resolve { host: String, port: u16 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Opening the TCP connection to the upstream resolver failed.
    #[error("failed to connect to upstream {upstream}: {source}")]
    Connect {
        upstream: String,
        #[source]
        source: io::Error,
    },

    /// Reading from or writing to the upstream connection failed.
    #[error("upstream {upstream} I/O error: {source}")]
    Upstream {
        upstream: String,
        #[source]
        source: io::Error,
    },

    /// The upstream closed its side before sending a response frame.
    #[error("upstream {upstream} closed the connection without responding")]
    UpstreamClosed { upstream: String },

    /// The upstream did not answer within the configured deadline.
    #[error("upstream {upstream} did not respond within {after:?}")]
    Timeout { upstream: String, after: Duration },

    /// A message does not fit behind a 16-bit length prefix.
    #[error("message of {0} bytes exceeds the 65535 byte DNS-over-TCP limit")]
    FrameTooLarge(usize),

    #[error(transparent)]
    Io(#[from] io::Error),
}
