use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::audio::{AudioError, CaptureSource, PlaybackSink};
use crate::endpoint::{ConnectionError, LiveReceiver, LiveSender};
use crate::orchestrator::constants::QUIT_COMMAND;
use crate::orchestrator::types::{AudioChunk, InboundEvent, SessionUpdate};
use crate::telemetry::events::record_turn_interrupted;

use super::state::PlaybackQueue;

/// Why a pipeline stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PipelineEnd {
    /// Text pipeline observed the quit sentinel.
    Quit,
    /// Remote closed the receive stream.
    Disconnected,
    /// A control-surface channel closed (manager went away).
    InputClosed,
}

#[derive(Debug, Error)]
pub(crate) enum PipelineError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error("pipeline task failed: {0}")]
    Supervisor(String),
}

pub(crate) type PipelineResult = Result<PipelineEnd, PipelineError>;

/// Dequeues captured chunks and forwards them upstream in queue order.
pub(crate) async fn outbound_pipeline(
    mut out_rx: mpsc::Receiver<AudioChunk>,
    sender: Arc<Mutex<Box<dyn LiveSender>>>,
) -> PipelineResult {
    while let Some(chunk) = out_rx.recv().await {
        sender.lock().await.send_audio(chunk).await?;
    }
    Ok(PipelineEnd::InputClosed)
}

/// Reads device frames and enqueues them, blocking while the bounded
/// outbound queue is full. This is the system's only backpressure point.
pub(crate) async fn capture_pipeline(
    mut capture: Box<dyn CaptureSource>,
    out_tx: mpsc::Sender<AudioChunk>,
) -> PipelineResult {
    loop {
        let frame = capture.next_frame().await?;
        if out_tx.send(AudioChunk::pcm(frame)).await.is_err() {
            return Ok(PipelineEnd::InputClosed);
        }
    }
}

/// Consumes inbound events: audio is queued for playback, text is surfaced
/// to the display, and a completed turn flushes the playback queue so an
/// interrupted answer stops immediately.
pub(crate) async fn receive_pipeline(
    mut receiver: Box<dyn LiveReceiver>,
    queue: Arc<PlaybackQueue>,
    update_tx: broadcast::Sender<SessionUpdate>,
) -> PipelineResult {
    loop {
        match receiver.next_event().await? {
            None => return Ok(PipelineEnd::Disconnected),
            Some(InboundEvent::Audio(pcm)) => queue.push(pcm).await,
            Some(InboundEvent::Text(text)) => {
                if update_tx.send(SessionUpdate::DisplayText(text)).is_err() {
                    debug!(target: "session_engine", "no display subscriber for text event");
                }
            }
            Some(InboundEvent::TurnComplete) => {
                let discarded = queue.drain().await;
                record_turn_interrupted(discarded);
                if discarded > 0 {
                    info!(
                        target: "session_engine",
                        discarded,
                        "turn complete, discarded unplayed audio"
                    );
                }
            }
        }
    }
}

/// Dequeues received audio and writes it to the output device in order.
pub(crate) async fn playback_pipeline(
    mut playback: Box<dyn PlaybackSink>,
    queue: Arc<PlaybackQueue>,
) -> PipelineResult {
    loop {
        let pcm = queue.pop().await;
        playback.play(pcm).await?;
    }
}

/// Forwards user-submitted text as turn-ending messages; the quit sentinel
/// ends the pipeline, and with it the whole turn group.
pub(crate) async fn text_pipeline(
    text_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    sender: Arc<Mutex<Box<dyn LiveSender>>>,
) -> PipelineResult {
    let mut text_rx = text_rx.lock().await;
    loop {
        let Some(text) = text_rx.recv().await else {
            return Ok(PipelineEnd::InputClosed);
        };

        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case(QUIT_COMMAND) {
            warn!(target: "session_engine", "quit command received, ending turn group");
            return Ok(PipelineEnd::Quit);
        }

        // The protocol rejects empty turns.
        let message = if trimmed.is_empty() { "." } else { trimmed };
        sender.lock().await.send_turn_text(message).await?;
    }
}
