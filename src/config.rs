//! Relay configuration.
//!
//! Configuration is a plain value built once at startup and handed to
//! [`Relay::bind`](crate::proxy::Relay::bind). There is no reloading.

use std::fmt;
use std::time::Duration;

use crate::error::{RelayError, Result};

/// Standard DNS port, used for the upstream resolver.
pub const DNS_PORT: u16 = 53;

/// Default deadline for one upstream exchange.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the DNS relay.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Host both listeners bind to (name or IP literal)
    pub listen_host: String,
    /// Port both listeners bind to
    pub listen_port: u16,
    pub upstream: UpstreamConfig,
    /// How UDP replies are cut from the upstream response frame
    pub udp_reply: UdpReplySizing,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_host: "localhost".to_string(),
            listen_port: DNS_PORT,
            upstream: UpstreamConfig::default(),
            udp_reply: UdpReplySizing::default(),
        }
    }
}

impl RelayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.listen_host.trim().is_empty() {
            return Err(RelayError::InvalidConfig(
                "listen host must not be empty".to_string(),
            ));
        }
        self.upstream.validate()
    }
}

/// Where and how queries are forwarded.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Resolver host (name or IP literal)
    pub host: String,
    pub port: u16,
    /// Deadline for connect + write + read of one query
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            host: "1.1.1.1".to_string(),
            port: DNS_PORT,
            timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }
}

impl UpstreamConfig {
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(RelayError::InvalidConfig(
                "upstream host must not be empty".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(RelayError::InvalidConfig(
                "upstream timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Length of the payload returned to a UDP client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UdpReplySizing {
    /// Reply is exactly as long as the query: the upstream payload is
    /// truncated, or zero-padded when shorter.
    #[default]
    MatchQuery,
    /// Reply is the whole payload of the upstream frame.
    Declared,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_forward_to_port_53() {
        let config = RelayConfig::default();
        assert_eq!(config.listen_host, "localhost");
        assert_eq!(config.listen_port, 53);
        assert_eq!(config.upstream.port, DNS_PORT);
        assert_eq!(config.upstream.to_string(), "1.1.1.1:53");
        assert_eq!(config.udp_reply, UdpReplySizing::MatchQuery);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn ipv6_upstream_is_bracketed() {
        let upstream = UpstreamConfig {
            host: "2606:4700:4700::1111".to_string(),
            ..UpstreamConfig::default()
        };
        assert_eq!(upstream.to_string(), "[2606:4700:4700::1111]:53");
    }

    #[test]
    fn rejects_zero_timeout() {
        let config = RelayConfig {
            upstream: UpstreamConfig {
                timeout: Duration::ZERO,
                ..UpstreamConfig::default()
            },
            ..RelayConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RelayError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_blank_hosts() {
        let mut config = RelayConfig::default();
        config.upstream.host = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.listen_host.clear();
        assert!(config.validate().is_err());
    }
}
