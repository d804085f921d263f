//! Lifecycle phase broadcast payloads.

use std::time::SystemTime;

/// The orchestrator's state machine, as observed by the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Connecting,
    Active,
    Recovering,
    Terminated,
}

#[derive(Debug, Clone)]
pub enum SessionLifecyclePayload {
    None,
    Recovering(RecoveryPayload),
    Failed(FailurePayload),
}

impl Default for SessionLifecyclePayload {
    fn default() -> Self {
        SessionLifecyclePayload::None
    }
}

/// Why the engine is recycling the connection.
#[derive(Debug, Clone)]
pub struct RecoveryPayload {
    pub reason: String,
}

/// Terminal failure context (retry budget exhausted or device gone).
#[derive(Debug, Clone)]
pub struct FailurePayload {
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct SessionLifecycleUpdate {
    pub phase: SessionPhase,
    pub issued_at: SystemTime,
    pub payload: SessionLifecyclePayload,
}

impl SessionLifecycleUpdate {
    pub fn new(phase: SessionPhase) -> Self {
        Self {
            phase,
            issued_at: SystemTime::now(),
            payload: SessionLifecyclePayload::None,
        }
    }

    /// Recovering, with the failure that triggered it.
    pub fn recovering(reason: impl Into<String>) -> Self {
        Self {
            phase: SessionPhase::Recovering,
            issued_at: SystemTime::now(),
            payload: SessionLifecyclePayload::Recovering(RecoveryPayload {
                reason: reason.into(),
            }),
        }
    }

    /// Terminated because of an unrecoverable error.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            phase: SessionPhase::Terminated,
            issued_at: SystemTime::now(),
            payload: SessionLifecyclePayload::Failed(FailurePayload {
                error: error.into(),
            }),
        }
    }

    /// Neutral terminal update (stop request, orderly shutdown).
    pub fn terminated() -> Self {
        Self::new(SessionPhase::Terminated)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.payload, SessionLifecyclePayload::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovering_helper_sets_payload() {
        let update = SessionLifecycleUpdate::recovering("connection reset");

        assert_eq!(update.phase, SessionPhase::Recovering);
        match update.payload {
            SessionLifecyclePayload::Recovering(payload) => {
                assert_eq!(payload.reason, "connection reset");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn failed_helper_is_terminal_with_error() {
        let update = SessionLifecycleUpdate::failed("retries exhausted");

        assert_eq!(update.phase, SessionPhase::Terminated);
        assert!(update.is_failure());
        match update.payload {
            SessionLifecyclePayload::Failed(payload) => {
                assert_eq!(payload.error, "retries exhausted");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn terminated_helper_is_neutral() {
        let update = SessionLifecycleUpdate::terminated();
        assert_eq!(update.phase, SessionPhase::Terminated);
        assert!(!update.is_failure());
        assert!(matches!(update.payload, SessionLifecyclePayload::None));
    }
}
