//! DNS relay orchestration.
//!
//! Binds transports and runs the relay server.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::lookup_host;
use tracing::{error, info};

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::inspect::{Inspect, TracingInspector};
use crate::transport::{ListenerHandle, RelayContext, Transport, tcp::TcpTransport, udp::UdpTransport};
use crate::upstream::Upstream;

/// A relay with its listeners bound but not yet serving.
pub struct Relay {
    udp: Option<UdpTransport>,
    tcp: Option<TcpTransport>,
    ctx: Arc<RelayContext>,
}

impl Relay {
    /// Bind both listeners with the default tracing inspector.
    pub async fn bind(config: &RelayConfig) -> Result<Self> {
        Self::bind_with_inspector(config, Arc::new(TracingInspector)).await
    }

    /// Bind both listeners on the configured host and port.
    ///
    /// A transport that fails to bind is logged and left down while the
    /// other one still serves. Fails only if neither can be bound.
    pub async fn bind_with_inspector(config: &RelayConfig, inspector: Arc<dyn Inspect>) -> Result<Self> {
        config.validate()?;

        let addr = resolve_listen_addr(config).await?;

        let udp = match UdpTransport::bind(addr).await {
            Ok(t) => Some(t),
            Err(source) => {
                let err = RelayError::Bind {
                    transport: Transport::Udp,
                    addr,
                    source,
                };
                error!(error = %err, "UDP listener unavailable");
                None
            }
        };

        let tcp = match TcpTransport::bind(addr).await {
            Ok(t) => Some(t),
            Err(source) => {
                let err = RelayError::Bind {
                    transport: Transport::Tcp,
                    addr,
                    source,
                };
                error!(error = %err, "TCP listener unavailable");
                None
            }
        };

        if udp.is_none() && tcp.is_none() {
            return Err(RelayError::NoListeners);
        }

        let upstream = Upstream::new(&config.upstream);
        let ctx = Arc::new(RelayContext::new(upstream, config.udp_reply, inspector));

        Ok(Self { udp, tcp, ctx })
    }

    /// Start serving on every bound listener.
    pub fn start(self) -> Result<RelayHandle> {
        let udp = self.udp.map(|t| t.start(self.ctx.clone())).transpose()?;
        let tcp = self.tcp.map(|t| t.start(self.ctx.clone())).transpose()?;

        for listener in udp.iter().chain(tcp.iter()) {
            info!(
                transport = %listener.transport(),
                addr = %listener.local_addr(),
                upstream = self.ctx.upstream.endpoint(),
                timeout_ms = self.ctx.upstream.timeout().as_millis() as u64,
                "listening"
            );
        }

        Ok(RelayHandle { udp, tcp })
    }
}

/// Handles to a running relay's listeners.
#[derive(Debug)]
pub struct RelayHandle {
    udp: Option<ListenerHandle>,
    tcp: Option<ListenerHandle>,
}

impl RelayHandle {
    /// Address of the UDP listener, if it is running.
    pub fn udp_addr(&self) -> Option<SocketAddr> {
        self.udp.as_ref().map(ListenerHandle::local_addr)
    }

    /// Address of the TCP listener, if it is running.
    pub fn tcp_addr(&self) -> Option<SocketAddr> {
        self.tcp.as_ref().map(ListenerHandle::local_addr)
    }

    /// Stop both listeners.
    pub fn shutdown(self) {
        for listener in self.udp.into_iter().chain(self.tcp) {
            info!(transport = %listener.transport(), "listener stopped");
            listener.shutdown();
        }
    }
}

async fn resolve_listen_addr(config: &RelayConfig) -> Result<SocketAddr> {
    let unresolved = || RelayError::Resolve {
        host: config.listen_host.clone(),
        port: config.listen_port,
    };

    lookup_host((config.listen_host.as_str(), config.listen_port))
        .await
        .map_err(|_| unresolved())?
        .next()
        .ok_or_else(unresolved)
}

/// Run the relay with the given configuration until Ctrl-C.
pub async fn run(config: RelayConfig) -> Result<()> {
    let relay = Relay::bind(&config).await?;
    let handle = relay.start()?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    handle.shutdown();

    Ok(())
}
