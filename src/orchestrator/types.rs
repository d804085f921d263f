use bytes::Bytes;

/// MIME tag attached to every outbound capture chunk.
pub const PCM_MIME_TYPE: &str = "audio/pcm";

/// One captured (or received) buffer of opaque PCM bytes.
///
/// Chunks are consumed exactly once; nothing holds a second reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub data: Bytes,
    pub mime_type: &'static str,
}

impl AudioChunk {
    pub fn pcm(data: Bytes) -> Self {
        Self {
            data,
            mime_type: PCM_MIME_TYPE,
        }
    }
}

/// Events produced by the live connection's receive stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// Model audio to queue for playback.
    Audio(Bytes),
    /// Model text to surface on the display.
    Text(String),
    /// The remote side ended the turn; buffered unplayed audio is discarded.
    TurnComplete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone)]
pub struct SessionNotice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Updates broadcast to the control surface while a session runs.
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// Model text for the display buffer.
    DisplayText(String),
    /// Status notice (retries, recoveries, terminal errors).
    Notice(SessionNotice),
}

impl SessionUpdate {
    pub fn notice<S: Into<String>>(level: NoticeLevel, message: S) -> Self {
        SessionUpdate::Notice(SessionNotice {
            level,
            message: message.into(),
        })
    }
}
