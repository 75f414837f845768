//! TCP transport for DNS queries.
//!
//! Clients already speak DNS-over-TCP, so their frames are forwarded
//! verbatim and the upstream's response frame is written back verbatim.
//! Every client frame is exchanged in its own task over its own upstream
//! connection; responses are written back in the order they arrive, so a
//! slow query never holds up the ones sent after it.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{ListenerHandle, RelayContext, Transport};
use crate::error::Result;
use crate::frame::read_frame;
use crate::inspect::Stage;

/// Responses queued for one client before exchange tasks wait on the writer.
const REPLY_QUEUE_DEPTH: usize = 32;

/// TCP transport for the DNS relay.
///
/// Binds to a local address and accepts connections from clients.
/// Each connection is handled in a separate task.
pub struct TcpTransport {
    listener: TcpListener,
}

impl TcpTransport {
    /// Bind a TCP listener for the transport.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;

        Ok(Self { listener })
    }

    /// Start the accept loop.
    pub fn start(self, ctx: Arc<RelayContext>) -> io::Result<ListenerHandle> {
        let local_addr = self.listener.local_addr()?;
        let task = tokio::spawn(run_accept_loop(self.listener, ctx));

        Ok(ListenerHandle::new(Transport::Tcp, local_addr, task))
    }
}

/// Accept loop - spawns a handler task for each incoming connection.
async fn run_accept_loop(listener: TcpListener, ctx: Arc<RelayContext>) {
    loop {
        match listener.accept().await {
            Ok((client, peer)) => {
                tokio::spawn(handle_connection(client, peer, ctx.clone()));
            }
            Err(e) => {
                warn!(error = %e, "TCP accept error");
            }
        }
    }
}

/// Serve one client connection until it closes or fails.
///
/// The read side spawns an exchange per frame; a single writer task owns
/// the write side. In-flight replies are still delivered after the client
/// half-closes.
async fn handle_connection(client: TcpStream, peer: SocketAddr, ctx: Arc<RelayContext>) {
    debug!(%peer, "TCP client connected");

    let (mut reader, writer) = client.into_split();
    let (tx, rx) = mpsc::channel(REPLY_QUEUE_DEPTH);
    let writer_task = tokio::spawn(write_replies(writer, rx, peer));

    loop {
        let query = match read_frame(&mut reader).await {
            Ok(Some(q)) => q,
            Ok(None) => break,
            Err(e) => {
                warn!(%peer, error = %e, "TCP client read error");
                break;
            }
        };

        if tx.is_closed() {
            break;
        }
        tokio::spawn(handle_query(ctx.clone(), query, peer, tx.clone()));
    }

    // The writer finishes once every in-flight query has reported back.
    drop(tx);
    let _ = writer_task.await;

    debug!(%peer, "TCP client disconnected");
}

async fn handle_query(ctx: Arc<RelayContext>, query: Vec<u8>, peer: SocketAddr, replies: mpsc::Sender<Vec<u8>>) {
    let start = Instant::now();

    match relay(&ctx, &query).await {
        Ok(response) => {
            debug!(
                %peer,
                upstream = ctx.upstream.endpoint(),
                query_len = query.len(),
                reply_len = response.len(),
                elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
                "TCP query forwarded"
            );
            if replies.send(response).await.is_err() {
                debug!(%peer, "TCP client gone before reply");
            }
        }
        // The query is lost but the client may still send more.
        Err(e) => warn!(
            %peer,
            upstream = ctx.upstream.endpoint(),
            query_len = query.len(),
            error = %e,
            "TCP query dropped"
        ),
    }
}

/// Forward one client frame and return the upstream's frame.
async fn relay(ctx: &RelayContext, query: &[u8]) -> Result<Vec<u8>> {
    ctx.inspect(Transport::Tcp, Stage::ClientQuery, true, query);
    ctx.inspect(Transport::Tcp, Stage::UpstreamRequest, true, query);

    let response = ctx.upstream.exchange(query).await?;
    ctx.inspect(Transport::Tcp, Stage::UpstreamResponse, true, &response);
    ctx.inspect(Transport::Tcp, Stage::ClientReply, true, &response);

    Ok(response)
}

/// Write replies to the client as they arrive.
async fn write_replies(mut writer: OwnedWriteHalf, mut replies: mpsc::Receiver<Vec<u8>>, peer: SocketAddr) {
    while let Some(response) = replies.recv().await {
        if let Err(e) = writer.write_all(&response).await {
            // Dropping the receiver stops the read loop at its next frame.
            warn!(%peer, error = %e, "TCP client write error");
            return;
        }
    }

    let _ = writer.shutdown().await;
}
