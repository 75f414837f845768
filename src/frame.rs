//! DNS-over-TCP framing.
//!
//! A framed message is a 2-byte big-endian length followed by that many
//! bytes of DNS message. UDP datagrams carry no prefix, so the UDP path
//! adds one on the way upstream and removes it on the way back.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::UdpReplySizing;
use crate::error::{RelayError, Result};

/// Size of the length prefix.
pub const PREFIX_LEN: usize = 2;

/// Largest message that fits behind the prefix.
pub const MAX_MESSAGE_LEN: usize = u16::MAX as usize;

/// Prefix `payload` with its length.
pub fn encode(payload: &[u8]) -> Result<Vec<u8>> {
    let len = u16::try_from(payload.len()).map_err(|_| RelayError::FrameTooLarge(payload.len()))?;

    let mut frame = Vec::with_capacity(PREFIX_LEN + payload.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(payload);

    Ok(frame)
}

/// Length announced by a frame's prefix, if the prefix is present.
pub fn declared_len(frame: &[u8]) -> Option<usize> {
    match frame {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo]) as usize),
        _ => None,
    }
}

/// Read one complete frame, prefix included.
///
/// Keeps reading until the declared length has arrived, so a frame split
/// across several TCP segments is reassembled. Returns `None` if the
/// stream ends before a frame starts.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; PREFIX_LEN];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let msg_len = u16::from_be_bytes(prefix) as usize;
    let mut frame = vec![0u8; PREFIX_LEN + msg_len];
    frame[..PREFIX_LEN].copy_from_slice(&prefix);
    reader.read_exact(&mut frame[PREFIX_LEN..]).await?;

    Ok(Some(frame))
}

/// Bytes sent back to a UDP client for an upstream response frame.
///
/// With [`UdpReplySizing::MatchQuery`] the reply is `frame[2..2 + query_len]`,
/// zero-padded when the frame is shorter than that.
pub fn udp_reply(frame: &[u8], query_len: usize, sizing: UdpReplySizing) -> Vec<u8> {
    let payload = frame.get(PREFIX_LEN..).unwrap_or_default();

    match sizing {
        UdpReplySizing::MatchQuery => {
            let mut reply = payload[..payload.len().min(query_len)].to_vec();
            reply.resize(query_len, 0);
            reply
        }
        UdpReplySizing::Declared => {
            let len = declared_len(frame).unwrap_or(0).min(payload.len());
            payload[..len].to_vec()
        }
    }
}
