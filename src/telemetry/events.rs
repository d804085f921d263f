use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

pub(crate) const TARGET: &str = "telemetry::session";
pub(crate) const EVENT_CONNECT_ATTEMPT: &str = "connect_attempt";
pub(crate) const EVENT_CONNECT_EXHAUSTED: &str = "connect_exhausted";
pub(crate) const EVENT_SESSION_RECOVERING: &str = "session_recovering";
pub(crate) const EVENT_TURN_INTERRUPTED: &str = "turn_interrupted";
pub(crate) const EVENT_CONFIG_APPLIED: &str = "config_applied";

#[derive(Debug, Serialize)]
pub struct ConnectAttemptEvent {
    pub attempt: u32,
    pub max_attempts: u32,
    pub succeeded: bool,
}

#[derive(Debug, Serialize)]
pub struct TurnInterruptedEvent {
    pub discarded_chunks: usize,
}

#[derive(Debug, Serialize)]
pub struct ConfigAppliedEvent {
    pub fields: Vec<&'static str>,
}

pub fn record_connect_attempt(attempt: u32, max_attempts: u32, succeeded: bool) {
    let event = ConnectAttemptEvent {
        attempt,
        max_attempts,
        succeeded,
    };

    match serde_json::to_string(&event) {
        Ok(payload) => info!(
            target: TARGET,
            event = EVENT_CONNECT_ATTEMPT,
            attempt = event.attempt,
            max_attempts = event.max_attempts,
            succeeded = event.succeeded,
            payload = %payload
        ),
        Err(err) => warn!(
            target: TARGET,
            event = EVENT_CONNECT_ATTEMPT,
            %err,
            "failed to encode connect attempt event"
        ),
    }
}

pub fn record_connect_exhausted(attempts: u32, error: &str) {
    info!(
        target: TARGET,
        event = EVENT_CONNECT_EXHAUSTED,
        attempts,
        error,
    );
}

pub fn record_session_recovering(reason: &str, retry_delay: Duration) {
    info!(
        target: TARGET,
        event = EVENT_SESSION_RECOVERING,
        reason,
        retry_delay_ms = duration_to_ms(retry_delay),
    );
}

pub fn record_turn_interrupted(discarded_chunks: usize) {
    let event = TurnInterruptedEvent { discarded_chunks };

    match serde_json::to_string(&event) {
        Ok(payload) => info!(
            target: TARGET,
            event = EVENT_TURN_INTERRUPTED,
            discarded_chunks = event.discarded_chunks,
            payload = %payload
        ),
        Err(err) => warn!(
            target: TARGET,
            event = EVENT_TURN_INTERRUPTED,
            %err,
            "failed to encode turn interrupted event"
        ),
    }
}

pub fn record_config_applied(fields: Vec<&'static str>) {
    let event = ConfigAppliedEvent { fields };

    match serde_json::to_string(&event) {
        Ok(payload) => info!(
            target: TARGET,
            event = EVENT_CONFIG_APPLIED,
            field_count = event.fields.len(),
            payload = %payload
        ),
        Err(err) => warn!(
            target: TARGET,
            event = EVENT_CONFIG_APPLIED,
            %err,
            "failed to encode config applied event"
        ),
    }
}

fn duration_to_ms(duration: Duration) -> u64 {
    duration.as_millis().min(u64::MAX as u128) as u64
}
