//! API credential loading and rotation.

use std::collections::VecDeque;
use std::env;

use rand::seq::SliceRandom;
use rand::thread_rng;
use thiserror::Error;
use tracing::info;

pub const CREDENTIALS_ENV_VAR: &str = "VOICELINK_API_KEYS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("{CREDENTIALS_ENV_VAR} environment variable not set")]
    Missing,
    #[error("no valid credentials found in {CREDENTIALS_ENV_VAR}")]
    Empty,
}

/// An opaque authentication token for the live endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Dispenses credentials in randomized round-robin order.
///
/// The full set is drained in a shuffled permutation before any credential
/// repeats; a fresh permutation is drawn each time the queue empties.
#[derive(Debug, Clone)]
pub struct CredentialRotator {
    credentials: Vec<Credential>,
    queue: VecDeque<Credential>,
}

impl CredentialRotator {
    /// Load the credential set from `VOICELINK_API_KEYS` (comma separated).
    ///
    /// An absent or empty set is a fatal startup error, never a runtime one.
    pub fn from_env() -> Result<Self, CredentialError> {
        let raw = env::var(CREDENTIALS_ENV_VAR).map_err(|_| CredentialError::Missing)?;
        Self::from_keys(raw.split(',').map(str::to_string))
    }

    pub fn from_keys<I>(keys: I) -> Result<Self, CredentialError>
    where
        I: IntoIterator<Item = String>,
    {
        let credentials: Vec<Credential> = keys
            .into_iter()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .map(Credential)
            .collect();

        if credentials.is_empty() {
            return Err(CredentialError::Empty);
        }

        info!(
            target: "credentials",
            count = credentials.len(),
            "loaded credential set"
        );

        Ok(Self {
            credentials,
            queue: VecDeque::new(),
        })
    }

    /// Next credential in the rotation, reshuffling when the cycle completes.
    pub fn next(&mut self) -> Credential {
        if self.queue.is_empty() {
            let mut cycle = self.credentials.clone();
            cycle.shuffle(&mut thread_rng());
            self.queue = cycle.into();
        }

        self.queue
            .pop_front()
            .expect("credential set is never empty")
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn rotator(keys: &[&str]) -> CredentialRotator {
        CredentialRotator::from_keys(keys.iter().map(|k| k.to_string())).expect("valid keys")
    }

    #[test]
    fn empty_set_is_rejected() {
        let err = CredentialRotator::from_keys(Vec::new()).expect_err("must fail");
        assert_eq!(err, CredentialError::Empty);

        let err =
            CredentialRotator::from_keys(vec![" ".to_string(), "".to_string()]).expect_err("blank");
        assert_eq!(err, CredentialError::Empty);
    }

    #[test]
    fn keys_are_trimmed() {
        let mut rotator = rotator(&[" alpha ", "beta"]);
        let drawn: HashSet<String> = (0..2).map(|_| rotator.next().as_str().to_string()).collect();
        assert!(drawn.contains("alpha"));
        assert!(drawn.contains("beta"));
    }

    #[test]
    fn full_cycle_uses_each_credential_once() {
        let keys = ["a", "b", "c", "d", "e"];
        let mut rotator = rotator(&keys);

        let cycle: HashSet<String> = (0..keys.len())
            .map(|_| rotator.next().as_str().to_string())
            .collect();
        assert_eq!(cycle.len(), keys.len());

        // The next cycle is again a full permutation.
        let second: HashSet<String> = (0..keys.len())
            .map(|_| rotator.next().as_str().to_string())
            .collect();
        assert_eq!(second.len(), keys.len());
    }

    #[test]
    fn single_credential_repeats() {
        let mut rotator = rotator(&["only"]);
        assert_eq!(rotator.next().as_str(), "only");
        assert_eq!(rotator.next().as_str(), "only");
    }
}
