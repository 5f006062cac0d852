//! Wire messages and buffer framing for the transfer daemon protocol
//!
//! The daemon speaks flat JSON objects over a raw TCP stream with no length
//! prefix: the client sends one request object per connection and reads back
//! a sequence of status objects. Messages are delimited by scanning the
//! receive buffer for the first `{` and the first `}` at or after it.
//!
//! PRECONDITION: server messages contain no nested braces (and no brace
//! bytes inside string values). The scan is deliberately not nesting-aware
//! because the wire format is outside this client's control; if the daemon
//! ever sends nested objects the scanner must be replaced, not tuned.

use serde::{Deserialize, Serialize};

/// Progress percentage above which an ambiguous end of session (clean close
/// or stall with no terminal message) is treated as a completed transfer.
pub const COMPLETE_THRESHOLD: u64 = 90;

// Default timeout constants; `Config` carries the effective values.
pub mod timeouts {
    // Connection establishment (secs)
    pub const CONNECT_SECS: u64 = 30;

    // Single socket read during a transfer (secs)
    pub const READ_SECS: u64 = 300;

    // No bytes at all for this long means the session stalled (secs)
    pub const IDLE_SECS: u64 = 300;

    // Pause between successful transfers to throttle the shared daemon (secs)
    pub const PACE_SECS: u64 = 10;
}

/// The single request object sent after connecting.
#[derive(Debug, Clone, Serialize)]
pub struct TransferRequest {
    pub bot_name: String,
    pub pack_number: String,
    pub send_progress: bool,
    pub download_path: String,
}

/// One framed status object from the daemon, tagged by its `status` field.
///
/// Unknown status values parse as `Unknown` so an unrecognized message is
/// skipped instead of wedging the frame scanner.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ServerMessage {
    Downloading {
        #[serde(default)]
        message: String,
    },
    Progress {
        #[serde(default)]
        progress: u64,
        #[serde(default)]
        filename: String,
        #[serde(default)]
        received: u64,
        #[serde(default)]
        total: u64,
    },
    Success {
        #[serde(default)]
        filename: String,
        #[serde(default)]
        size: u64,
        #[serde(default)]
        path: String,
    },
    Error {
        #[serde(default)]
        message: String,
    },
    #[serde(other)]
    Unknown,
}

/// Scan the receive buffer for one complete message.
///
/// On a parse, the message bytes (and anything before them) are drained from
/// the buffer. A located `{...}` span that does not parse is assumed to be a
/// message whose bytes have not all arrived yet; the buffer is left intact so
/// the next read can complete it.
pub fn scan_message(buf: &mut Vec<u8>) -> Option<ServerMessage> {
    let start = buf.iter().position(|&b| b == b'{')?;
    let end = start + buf[start..].iter().position(|&b| b == b'}')?;
    match serde_json::from_slice::<ServerMessage>(&buf[start..=end]) {
        Ok(msg) => {
            buf.drain(..=end);
            Some(msg)
        }
        Err(_) => None,
    }
}
