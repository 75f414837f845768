//! Diagnostic message inspection.
//!
//! Every buffer that passes through the relay is offered to an [`Inspect`]
//! hook. The default hook emits a `trace` event with a decoded summary
//! and a hex and printable dump; tests swap in their own hook to observe
//! traffic. Nothing here influences forwarding.

mod summary;

use std::fmt;

use tracing::trace;

use crate::frame::PREFIX_LEN;
use crate::transport::Transport;

pub use summary::{
    Answer, AnswerData, HeaderSummary, MessageSummary, Question, answers, questions, record_type_name,
};

/// Point in a query's life at which a buffer was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Received from the client
    ClientQuery,
    /// Written to the upstream resolver
    UpstreamRequest,
    /// Received from the upstream resolver
    UpstreamResponse,
    /// Sent back to the client
    ClientReply,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::ClientQuery => "client-query",
            Stage::UpstreamRequest => "upstream-request",
            Stage::UpstreamResponse => "upstream-response",
            Stage::ClientReply => "client-reply",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed buffer.
#[derive(Debug, Clone, Copy)]
pub struct MessageEvent<'a> {
    pub transport: Transport,
    pub stage: Stage,
    /// Whether `bytes` starts with a DNS-over-TCP length prefix
    pub framed: bool,
    pub bytes: &'a [u8],
}

impl<'a> MessageEvent<'a> {
    /// The DNS message without any length prefix.
    pub fn message(&self) -> &'a [u8] {
        if self.framed {
            self.bytes.get(PREFIX_LEN..).unwrap_or_default()
        } else {
            self.bytes
        }
    }
}

/// Hook receiving every buffer the relay handles.
pub trait Inspect: Send + Sync {
    fn inspect(&self, event: &MessageEvent<'_>);
}

/// Emits each buffer as a `trace` level event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingInspector;

impl Inspect for TracingInspector {
    fn inspect(&self, event: &MessageEvent<'_>) {
        if !tracing::enabled!(tracing::Level::TRACE) {
            return;
        }

        let summary = MessageSummary::decode(event.message())
            .map(|s| s.to_string())
            .unwrap_or_else(|| "<short>".to_string());

        trace!(
            transport = %event.transport,
            stage = %event.stage,
            len = event.bytes.len(),
            framed = event.framed,
            summary = %summary,
            hex = %HexDump(event.bytes),
            text = %PrintableDump(event.bytes),
            "message"
        );
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopInspector;

impl Inspect for NoopInspector {
    fn inspect(&self, _event: &MessageEvent<'_>) {}
}

/// Space separated lowercase hex.
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Bytes as characters, with non-printable bytes shown as `.`.
pub struct PrintableDump<'a>(pub &'a [u8]);

impl fmt::Display for PrintableDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.0 {
            let c = if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' };
            write!(f, "{c}")?;
        }
        Ok(())
    }
}
