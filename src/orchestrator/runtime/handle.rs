use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::orchestrator::config::ConfigUpdate;

/// Control handle for a running session engine.
///
/// The three operations the control surface is allowed to drive are all
/// non-blocking; `stop` is idempotent and safe from any thread.
pub struct SessionHandle {
    text_tx: mpsc::UnboundedSender<String>,
    config_tx: mpsc::UnboundedSender<ConfigUpdate>,
    cancel: CancellationToken,
    engine: Option<JoinHandle<()>>,
}

impl SessionHandle {
    pub(crate) fn new(
        text_tx: mpsc::UnboundedSender<String>,
        config_tx: mpsc::UnboundedSender<ConfigUpdate>,
        cancel: CancellationToken,
        engine: JoinHandle<()>,
    ) -> Self {
        Self {
            text_tx,
            config_tx,
            cancel,
            engine: Some(engine),
        }
    }

    /// Queue user text for the injection pipeline.
    pub fn send_text<S: Into<String>>(&self, text: S) -> bool {
        self.text_tx.send(text.into()).is_ok()
    }

    /// Queue a partial configuration update; applied to the next connection.
    pub fn update_config(&self, update: ConfigUpdate) -> bool {
        self.config_tx.send(update).is_ok()
    }

    /// Request cancellation of every pipeline and the engine loop.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.engine
            .as_ref()
            .map(JoinHandle::is_finished)
            .unwrap_or(true)
    }

    /// Stop and wait for the engine to release its resources.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(engine) = self.engine.take() {
            if let Err(err) = engine.await {
                warn!(target: "session_engine", %err, "engine task ended abnormally");
            }
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(engine) = self.engine.take() {
            engine.abort();
        }
    }
}
