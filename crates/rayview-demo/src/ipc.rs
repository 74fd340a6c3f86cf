//! Messages the demo session reports to a viewer front end.
//!
//! Serialized with `#[serde(tag = "type", content = "data")]`, one JSON
//! object per line, so a UI process can tail the log.

use std::io::Write;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use rayview_stream::StreamStats;

/// Messages from the session to the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SessionToUi {
    /// A streamed frame became the live image.
    FrameReceived {
        width: u32,
        height: u32,
    },

    /// Accumulation progress of the live image.
    Progress {
        value: f32,
    },

    /// Stream throughput over the last window.
    Stats {
        stats: StreamStats,
    },

    /// The snapshot worker started or stopped rendering.
    SnapshotBusy {
        busy: bool,
    },

    /// A surface or the live image was written to disk.
    ImageSaved {
        /// What was saved (`"viewport"`, `"thumbnail-0"`, ...).
        name: String,
        path: String,
        width: u32,
        height: u32,
    },

    /// Something went wrong.
    Error {
        message: String,
    },
}

/// Messages queued by event listeners until the session flushes them.
#[derive(Debug, Default)]
pub struct OutboundUiMessages {
    messages: Mutex<Vec<SessionToUi>>,
}

impl OutboundUiMessages {
    /// Queue a message. Callable from any listener.
    pub fn send(&self, msg: SessionToUi) {
        self.messages.lock().push(msg);
    }

    /// Drain all queued messages, returning them.
    pub fn drain(&self) -> Vec<SessionToUi> {
        std::mem::take(&mut *self.messages.lock())
    }

    /// Drain the queue into `out` as JSON lines. Returns the number written.
    pub fn flush_json_lines(&self, mut out: impl Write) -> Result<usize, FlushError> {
        let messages = self.drain();
        for msg in &messages {
            serde_json::to_writer(&mut out, msg)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(messages.len())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FlushError {
    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
