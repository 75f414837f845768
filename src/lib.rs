//! dnsbridge - a transparent DNS relay.
//!
//! Accepts DNS queries over UDP and TCP and forwards each one, as an opaque
//! byte buffer, to a single upstream resolver over DNS-over-TCP.

pub mod config;
pub mod error;
pub mod frame;
pub mod inspect;
pub mod proxy;
pub mod transport;
pub mod upstream;

pub use config::{RelayConfig, UdpReplySizing, UpstreamConfig};
pub use error::{RelayError, Result};
pub use proxy::{Relay, RelayHandle};
