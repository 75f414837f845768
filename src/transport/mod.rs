//! Transport layer implementations for the DNS relay.
//!
//! Provides UDP and TCP listeners that accept queries from clients and
//! forward each one to the upstream resolver over its own TCP connection.

pub mod tcp;
pub mod udp;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::UdpReplySizing;
use crate::inspect::{Inspect, MessageEvent, Stage};
use crate::upstream::Upstream;

/// Transport protocol identifier for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
}

impl Transport {
    pub fn as_str(self) -> &'static str {
        match self {
            Transport::Tcp => "TCP",
            Transport::Udp => "UDP",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only state shared by every query task.
pub struct RelayContext {
    pub upstream: Upstream,
    pub udp_reply: UdpReplySizing,
    pub inspector: Arc<dyn Inspect>,
}

impl RelayContext {
    pub fn new(upstream: Upstream, udp_reply: UdpReplySizing, inspector: Arc<dyn Inspect>) -> Self {
        Self {
            upstream,
            udp_reply,
            inspector,
        }
    }

    fn inspect(&self, transport: Transport, stage: Stage, framed: bool, bytes: &[u8]) {
        self.inspector.inspect(&MessageEvent {
            transport,
            stage,
            framed,
            bytes,
        });
    }
}

/// A running listener.
///
/// Dropping the handle leaves the listener running; call
/// [`shutdown`](ListenerHandle::shutdown) to stop it.
#[derive(Debug)]
pub struct ListenerHandle {
    transport: Transport,
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub(crate) fn new(transport: Transport, local_addr: SocketAddr, task: JoinHandle<()>) -> Self {
        Self {
            transport,
            local_addr,
            task,
        }
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting new queries. Queries already in flight finish or hit
    /// the upstream deadline on their own.
    pub fn shutdown(self) {
        self.task.abort();
    }
}
