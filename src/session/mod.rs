//! Session control surface.

pub mod lifecycle;

use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::{broadcast, Mutex};
use tracing::info;

use crate::audio::AudioSystem;
use crate::credentials::CredentialRotator;
use crate::endpoint::LiveEndpoint;
use crate::orchestrator::{
    spawn_session, ConfigUpdate, SessionConfig, SessionEngine, SessionHandle, SessionUpdate,
};
use crate::session::lifecycle::SessionLifecycleUpdate;

const UPDATE_CHANNEL_CAPACITY: usize = 64;
const LIFECYCLE_CHANNEL_CAPACITY: usize = 32;

/// Facade the caller drives the whole system through.
///
/// Owns the broadcast channels so subscribers can attach before a session
/// starts, and at most one engine at a time. Dropping the manager cancels
/// any running session.
pub struct SessionManager {
    endpoint: Arc<dyn LiveEndpoint>,
    audio: Arc<dyn AudioSystem>,
    rotator: CredentialRotator,
    update_tx: broadcast::Sender<SessionUpdate>,
    lifecycle_tx: broadcast::Sender<SessionLifecycleUpdate>,
    active: Mutex<Option<SessionHandle>>,
}

impl SessionManager {
    pub fn new(
        endpoint: Arc<dyn LiveEndpoint>,
        audio: Arc<dyn AudioSystem>,
        rotator: CredentialRotator,
    ) -> Self {
        let (update_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let (lifecycle_tx, _) = broadcast::channel(LIFECYCLE_CHANNEL_CAPACITY);

        Self {
            endpoint,
            audio,
            rotator,
            update_tx,
            lifecycle_tx,
            active: Mutex::new(None),
        }
    }

    /// Start a session with the given initial configuration.
    ///
    /// Fails if a session is already running; a finished engine whose handle
    /// was never reaped does not count as running.
    pub async fn start(&self, config: SessionConfig) -> Result<()> {
        let mut active = self.active.lock().await;
        if let Some(handle) = active.as_ref() {
            if !handle.is_finished() {
                bail!("a session is already running");
            }
        }

        let engine = SessionEngine::new(
            Arc::clone(&self.endpoint),
            Arc::clone(&self.audio),
            self.rotator.clone(),
            config,
            self.update_tx.clone(),
            self.lifecycle_tx.clone(),
        );
        *active = Some(spawn_session(engine));
        info!(target: "session", "session spawned");
        Ok(())
    }

    /// Stop the running session and wait for it to wind down. Idempotent.
    pub async fn stop(&self) {
        let handle = self.active.lock().await.take();
        if let Some(mut handle) = handle {
            handle.shutdown().await;
            info!(target: "session", "session stopped");
        }
    }

    /// Queue user text for the active session's injection pipeline.
    pub async fn send_text<S: Into<String>>(&self, text: S) -> Result<()> {
        let active = self.active.lock().await;
        let Some(handle) = active.as_ref() else {
            bail!("no active session");
        };
        if !handle.send_text(text) {
            bail!("session is shutting down");
        }
        Ok(())
    }

    /// Queue a partial configuration update for the active session.
    pub async fn update_config(&self, update: ConfigUpdate) -> Result<()> {
        let active = self.active.lock().await;
        let Some(handle) = active.as_ref() else {
            bail!("no active session");
        };
        if !handle.update_config(update) {
            bail!("session is shutting down");
        }
        Ok(())
    }

    pub fn subscribe_updates(&self) -> broadcast::Receiver<SessionUpdate> {
        self.update_tx.subscribe()
    }

    pub fn subscribe_lifecycle(&self) -> broadcast::Receiver<SessionLifecycleUpdate> {
        self.lifecycle_tx.subscribe()
    }
}
