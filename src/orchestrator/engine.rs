use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::audio::{AudioSystem, CaptureSource, PlaybackSink};
use crate::credentials::CredentialRotator;
use crate::endpoint::{connect_with_retry, LiveEndpoint};
use crate::orchestrator::config::{ConfigUpdate, SessionConfig};
use crate::orchestrator::constants::{MAX_DEVICE_OPEN_FAILURES, RETRY_DELAY};
use crate::orchestrator::runtime::{self, GroupOutcome};
use crate::orchestrator::types::{NoticeLevel, SessionUpdate};
use crate::session::lifecycle::{SessionLifecycleUpdate, SessionPhase};
use crate::telemetry::events::{record_config_applied, record_session_recovering};

/// The session state machine: Connecting → Active → Recovering → Connecting,
/// until cancellation or an unrecoverable failure terminates it.
///
/// Owns the credential rotator and the shared config for the lifetime of one
/// `start()`; all inter-pipeline communication goes through channels.
pub(crate) struct SessionEngine {
    endpoint: Arc<dyn LiveEndpoint>,
    audio: Arc<dyn AudioSystem>,
    rotator: CredentialRotator,
    config: Arc<Mutex<SessionConfig>>,
    update_tx: broadcast::Sender<SessionUpdate>,
    lifecycle_tx: broadcast::Sender<SessionLifecycleUpdate>,
}

impl SessionEngine {
    pub(crate) fn new(
        endpoint: Arc<dyn LiveEndpoint>,
        audio: Arc<dyn AudioSystem>,
        rotator: CredentialRotator,
        config: SessionConfig,
        update_tx: broadcast::Sender<SessionUpdate>,
        lifecycle_tx: broadcast::Sender<SessionLifecycleUpdate>,
    ) -> Self {
        Self {
            endpoint,
            audio,
            rotator,
            config: Arc::new(Mutex::new(config)),
            update_tx,
            lifecycle_tx,
        }
    }

    pub(crate) async fn run(
        mut self,
        config_rx: mpsc::UnboundedReceiver<ConfigUpdate>,
        text_rx: mpsc::UnboundedReceiver<String>,
        cancel: CancellationToken,
    ) {
        let text_rx = Arc::new(Mutex::new(text_rx));
        let config_task = tokio::spawn(apply_config_updates(
            config_rx,
            Arc::clone(&self.config),
            self.update_tx.clone(),
        ));

        let mut device_open_failures = 0_u32;
        let final_update = loop {
            if cancel.is_cancelled() {
                break SessionLifecycleUpdate::terminated();
            }

            self.emit_phase(SessionPhase::Connecting);
            let snapshot = self.config.lock().await.clone();

            let connected = tokio::select! {
                _ = cancel.cancelled() => break SessionLifecycleUpdate::terminated(),
                result = connect_with_retry(
                    self.endpoint.as_ref(),
                    &mut self.rotator,
                    &snapshot,
                ) => result,
            };

            let session = match connected {
                Ok(session) => session,
                Err(err) => {
                    error!(target: "session_engine", %err, "connection retries exhausted");
                    self.emit_notice(
                        NoticeLevel::Error,
                        format!("failed to reach the endpoint: {err}"),
                    );
                    break SessionLifecycleUpdate::failed(err.to_string());
                }
            };

            let (capture, playback) = match self.open_devices() {
                Ok(pair) => {
                    device_open_failures = 0;
                    pair
                }
                Err(err) => {
                    device_open_failures += 1;
                    warn!(
                        target: "session_engine",
                        %err,
                        consecutive = device_open_failures,
                        "failed to open audio devices"
                    );
                    if device_open_failures >= MAX_DEVICE_OPEN_FAILURES {
                        self.emit_notice(
                            NoticeLevel::Error,
                            format!("audio device unavailable: {err}"),
                        );
                        break SessionLifecycleUpdate::failed(err.to_string());
                    }
                    drop(session);
                    if self.recover(&format!("device open failed: {err}"), &cancel).await {
                        continue;
                    }
                    break SessionLifecycleUpdate::terminated();
                }
            };

            self.emit_phase(SessionPhase::Active);
            info!(target: "session_engine", "session active");

            let outcome = runtime::run_turn_group(
                session,
                capture,
                playback,
                Arc::clone(&text_rx),
                self.update_tx.clone(),
                cancel.clone(),
            )
            .await;

            match outcome {
                GroupOutcome::Cancelled => break SessionLifecycleUpdate::terminated(),
                GroupOutcome::InputClosed => {
                    info!(target: "session_engine", "control surface gone, shutting down");
                    break SessionLifecycleUpdate::terminated();
                }
                GroupOutcome::Quit => {
                    self.emit_notice(NoticeLevel::Info, "turn ended, reconnecting");
                    if self.recover("quit command", &cancel).await {
                        continue;
                    }
                    break SessionLifecycleUpdate::terminated();
                }
                GroupOutcome::Failed(err) => {
                    warn!(target: "session_engine", %err, "pipeline failure, recovering");
                    self.emit_notice(
                        NoticeLevel::Warn,
                        format!("session interrupted ({err}), reconnecting"),
                    );
                    if self.recover(&err.to_string(), &cancel).await {
                        continue;
                    }
                    break SessionLifecycleUpdate::terminated();
                }
            }
        };

        config_task.abort();
        self.emit(final_update);
    }

    fn open_devices(
        &self,
    ) -> Result<(Box<dyn CaptureSource>, Box<dyn PlaybackSink>), crate::audio::AudioError> {
        let capture = self.audio.open_capture()?;
        let playback = self.audio.open_playback()?;
        Ok((capture, playback))
    }

    /// Enter Recovering and wait out the inter-attempt delay.
    ///
    /// Returns false when cancellation arrived during the delay.
    async fn recover(&self, reason: &str, cancel: &CancellationToken) -> bool {
        record_session_recovering(reason, RETRY_DELAY);
        self.emit(SessionLifecycleUpdate::recovering(reason));
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = sleep(RETRY_DELAY) => true,
        }
    }

    fn emit_phase(&self, phase: SessionPhase) {
        self.emit(SessionLifecycleUpdate::new(phase));
    }

    fn emit(&self, update: SessionLifecycleUpdate) {
        let _ = self.lifecycle_tx.send(update);
    }

    fn emit_notice<S: Into<String>>(&self, level: NoticeLevel, message: S) {
        let _ = self.update_tx.send(SessionUpdate::notice(level, message));
    }
}

/// Long-lived config-apply task: merges partial updates into the shared
/// config. Effective only for connections established afterwards.
async fn apply_config_updates(
    mut config_rx: mpsc::UnboundedReceiver<ConfigUpdate>,
    config: Arc<Mutex<SessionConfig>>,
    update_tx: broadcast::Sender<SessionUpdate>,
) {
    while let Some(update) = config_rx.recv().await {
        if update.is_empty() {
            continue;
        }

        let applied = {
            let mut guard = config.lock().await;
            update.apply(&mut guard)
        };

        info!(
            target: "session_engine",
            fields = ?applied,
            "configuration updated, effective on next connection"
        );
        record_config_applied(applied.clone());
        let _ = update_tx.send(SessionUpdate::notice(
            NoticeLevel::Info,
            format!("updated {} (takes effect on reconnect)", applied.join(", ")),
        ));
    }
}
