//! Live endpoint abstraction: one duplex streaming session per connection.

pub mod gemini;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::credentials::{Credential, CredentialRotator};
use crate::orchestrator::config::SessionConfig;
use crate::orchestrator::constants::{MAX_CONNECT_ATTEMPTS, RETRY_DELAY};
use crate::orchestrator::types::{AudioChunk, InboundEvent};
use crate::telemetry::events::{record_connect_attempt, record_connect_exhausted};

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("handshake failed: {0}")]
    Handshake(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("connection closed by remote")]
    Closed,
}

/// Opens duplex sessions against the remote streaming service.
#[async_trait]
pub trait LiveEndpoint: Send + Sync {
    async fn connect(
        &self,
        credential: &Credential,
        config: &SessionConfig,
    ) -> Result<LiveSession, ConnectionError>;
}

/// Send half of a live session; shared by the outbound audio and
/// text-injection pipelines.
#[async_trait]
pub trait LiveSender: Send {
    async fn send_audio(&mut self, chunk: AudioChunk) -> Result<(), ConnectionError>;
    /// Send user text as a turn-ending message.
    async fn send_turn_text(&mut self, text: &str) -> Result<(), ConnectionError>;
    async fn close(&mut self) -> Result<(), ConnectionError>;
}

/// Receive half of a live session.
#[async_trait]
pub trait LiveReceiver: Send {
    /// Next inbound event; `Ok(None)` means the remote closed the stream.
    async fn next_event(&mut self) -> Result<Option<InboundEvent>, ConnectionError>;
}

/// One live duplex session, owned exclusively by the orchestrator.
pub struct LiveSession {
    pub sender: Box<dyn LiveSender>,
    pub receiver: Box<dyn LiveReceiver>,
}

/// Establish a connection, drawing a fresh credential per attempt.
///
/// Up to [`MAX_CONNECT_ATTEMPTS`] attempts with a fixed delay in between;
/// the last observed error is surfaced when the budget is exhausted. Reused
/// for both initial establishment and mid-session recovery.
pub async fn connect_with_retry(
    endpoint: &dyn LiveEndpoint,
    rotator: &mut CredentialRotator,
    config: &SessionConfig,
) -> Result<LiveSession, ConnectionError> {
    let mut last_error = None;

    for attempt in 1..=MAX_CONNECT_ATTEMPTS {
        let credential = rotator.next();
        match endpoint.connect(&credential, config).await {
            Ok(session) => {
                record_connect_attempt(attempt, MAX_CONNECT_ATTEMPTS, true);
                info!(target: "live_endpoint", attempt, "connection established");
                return Ok(session);
            }
            Err(err) => {
                record_connect_attempt(attempt, MAX_CONNECT_ATTEMPTS, false);
                warn!(
                    target: "live_endpoint",
                    %err,
                    attempt,
                    max_attempts = MAX_CONNECT_ATTEMPTS,
                    "connection attempt failed"
                );
                last_error = Some(err);
                if attempt < MAX_CONNECT_ATTEMPTS {
                    sleep(RETRY_DELAY).await;
                }
            }
        }
    }

    let err = last_error.expect("at least one attempt was made");
    record_connect_exhausted(MAX_CONNECT_ATTEMPTS, &err.to_string());
    Err(err)
}
