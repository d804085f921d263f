mod handle;
mod state;
mod worker;

pub use handle::SessionHandle;
pub(crate) use worker::{PipelineEnd, PipelineError};

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::audio::{CaptureSource, PlaybackSink};
use crate::endpoint::{ConnectionError, LiveSession};
use crate::orchestrator::config::ConfigUpdate;
use crate::orchestrator::constants::OUTBOUND_QUEUE_CAPACITY;
use crate::orchestrator::engine::SessionEngine;
use crate::orchestrator::types::SessionUpdate;

use self::state::PlaybackQueue;

/// How an active turn group ended.
#[derive(Debug)]
pub(crate) enum GroupOutcome {
    /// Quit sentinel observed; recover with a new connection.
    Quit,
    /// External stop request.
    Cancelled,
    /// Control-surface channels closed.
    InputClosed,
    /// A pipeline failed; recover with a new connection.
    Failed(PipelineError),
}

/// Spawn the engine state machine and hand back its control handle.
pub(crate) fn spawn_session(engine: SessionEngine) -> SessionHandle {
    let (text_tx, text_rx) = mpsc::unbounded_channel::<String>();
    let (config_tx, config_rx) = mpsc::unbounded_channel::<ConfigUpdate>();
    let cancel = CancellationToken::new();

    let task = tokio::spawn(engine.run(config_rx, text_rx, cancel.clone()));

    SessionHandle::new(text_tx, config_tx, cancel, task)
}

/// Run the five pipelines bound to one connection as a supervised group.
///
/// All-or-nothing: the first pipeline to finish (error, quit, or remote
/// close) decides the outcome, the rest are aborted, and the sender half is
/// closed before returning. Partial survival across a connection boundary is
/// never attempted.
pub(crate) async fn run_turn_group(
    session: LiveSession,
    capture: Box<dyn CaptureSource>,
    playback: Box<dyn PlaybackSink>,
    text_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    update_tx: broadcast::Sender<SessionUpdate>,
    cancel: CancellationToken,
) -> GroupOutcome {
    let LiveSession { sender, receiver } = session;
    let sender = Arc::new(Mutex::new(sender));
    let (out_tx, out_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
    let queue = Arc::new(PlaybackQueue::new());

    let mut group: JoinSet<worker::PipelineResult> = JoinSet::new();
    group.spawn(worker::outbound_pipeline(out_rx, Arc::clone(&sender)));
    group.spawn(worker::capture_pipeline(capture, out_tx));
    group.spawn(worker::receive_pipeline(
        receiver,
        Arc::clone(&queue),
        update_tx,
    ));
    group.spawn(worker::playback_pipeline(playback, Arc::clone(&queue)));
    group.spawn(worker::text_pipeline(text_rx, Arc::clone(&sender)));

    let outcome = tokio::select! {
        _ = cancel.cancelled() => GroupOutcome::Cancelled,
        joined = group.join_next() => match joined {
            Some(Ok(Ok(PipelineEnd::Quit))) => GroupOutcome::Quit,
            Some(Ok(Ok(PipelineEnd::InputClosed))) => GroupOutcome::InputClosed,
            Some(Ok(Ok(PipelineEnd::Disconnected))) => {
                GroupOutcome::Failed(PipelineError::Connection(ConnectionError::Closed))
            }
            Some(Ok(Err(err))) => GroupOutcome::Failed(err),
            Some(Err(join_err)) => {
                GroupOutcome::Failed(PipelineError::Supervisor(join_err.to_string()))
            }
            None => GroupOutcome::InputClosed,
        },
    };

    group.abort_all();
    while group.join_next().await.is_some() {}

    if let Err(err) = sender.lock().await.close().await {
        warn!(target: "session_engine", %err, "error while closing connection");
    }

    outcome
}
