//! UDP transport for DNS queries.
//!
//! Every datagram is handled by its own task: the payload is framed,
//! exchanged with the upstream over a fresh TCP connection, unframed and
//! sent back to the sender. Tasks share nothing but the socket and the
//! read-only [`RelayContext`], so concurrent queries cannot see each
//! other's responses.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::net::UdpSocket;
use tracing::{debug, warn};

use super::{ListenerHandle, RelayContext, Transport};
use crate::error::Result;
use crate::frame::{self, MAX_MESSAGE_LEN};
use crate::inspect::Stage;

/// UDP transport for the DNS relay.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    /// Bind the listening socket.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);

        Ok(Self { socket })
    }

    /// Start the receive loop.
    pub fn start(self, ctx: Arc<RelayContext>) -> io::Result<ListenerHandle> {
        let local_addr = self.socket.local_addr()?;
        let task = tokio::spawn(run(self.socket, ctx));

        Ok(ListenerHandle::new(Transport::Udp, local_addr, task))
    }
}

/// Receive loop - spawns a task per datagram.
async fn run(socket: Arc<UdpSocket>, ctx: Arc<RelayContext>) {
    let mut buf = vec![0u8; MAX_MESSAGE_LEN];

    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(r) => r,
            Err(e) => {
                log_recv_error(&e);
                continue;
            }
        };

        if len == 0 {
            debug!(%peer, "dropping empty datagram");
            continue;
        }

        let query = buf[..len].to_vec();
        tokio::spawn(handle_query(socket.clone(), ctx.clone(), query, peer));
    }
}

fn log_recv_error(e: &io::Error) {
    warn!(error = %e, "UDP recv error");
}

async fn handle_query(socket: Arc<UdpSocket>, ctx: Arc<RelayContext>, query: Vec<u8>, peer: SocketAddr) {
    let start = Instant::now();

    match relay(&socket, &ctx, &query, peer).await {
        Ok(sent) => debug!(
            %peer,
            upstream = ctx.upstream.endpoint(),
            query_len = query.len(),
            reply_len = sent,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "UDP query forwarded"
        ),
        Err(e) => warn!(
            %peer,
            upstream = ctx.upstream.endpoint(),
            query_len = query.len(),
            error = %e,
            "UDP query dropped"
        ),
    }
}

/// Forward one datagram and send the reply to `peer`.
async fn relay(socket: &UdpSocket, ctx: &RelayContext, query: &[u8], peer: SocketAddr) -> Result<usize> {
    ctx.inspect(Transport::Udp, Stage::ClientQuery, false, query);

    let request = frame::encode(query)?;
    ctx.inspect(Transport::Udp, Stage::UpstreamRequest, true, &request);

    let response = ctx.upstream.exchange(&request).await?;
    ctx.inspect(Transport::Udp, Stage::UpstreamResponse, true, &response);

    let reply = frame::udp_reply(&response, query.len(), ctx.udp_reply);
    ctx.inspect(Transport::Udp, Stage::ClientReply, false, &reply);

    Ok(socket.send_to(&reply, peer).await?)
}
