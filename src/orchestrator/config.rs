use serde::{Deserialize, Serialize};

pub const DEFAULT_VOICE: &str = "Puck";
pub const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "You are a helpful assistant and answer in a friendly tone.";

/// What the remote model streams back for each turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResponseModality {
    Audio,
    Text,
}

impl ResponseModality {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseModality::Audio => "AUDIO",
            ResponseModality::Text => "TEXT",
        }
    }
}

/// Session parameters read once per connection attempt.
///
/// Updates land via [`ConfigUpdate`] and take effect on the next
/// (re)connect, never mid-turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub voice: String,
    pub system_instruction: String,
    pub response_modality: ResponseModality,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            voice: DEFAULT_VOICE.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            response_modality: ResponseModality::Audio,
        }
    }
}

/// Partial configuration update; absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigUpdate {
    pub voice: Option<String>,
    pub system_instruction: Option<String>,
    pub response_modality: Option<ResponseModality>,
}

impl ConfigUpdate {
    /// Merge into `config`, returning the names of the fields that changed.
    pub fn apply(self, config: &mut SessionConfig) -> Vec<&'static str> {
        let mut applied = Vec::new();
        if let Some(voice) = self.voice {
            config.voice = voice;
            applied.push("voice");
        }
        if let Some(instruction) = self.system_instruction {
            config.system_instruction = instruction;
            applied.push("system_instruction");
        }
        if let Some(modality) = self.response_modality {
            config.response_modality = modality;
            applied.push("response_modality");
        }
        applied
    }

    pub fn is_empty(&self) -> bool {
        self.voice.is_none()
            && self.system_instruction.is_none()
            && self.response_modality.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.voice, DEFAULT_VOICE);
        assert_eq!(config.system_instruction, DEFAULT_SYSTEM_INSTRUCTION);
        assert_eq!(config.response_modality, ResponseModality::Audio);
    }

    #[test]
    fn partial_update_leaves_other_fields() {
        let mut config = SessionConfig::default();
        let applied = ConfigUpdate {
            voice: Some("Kore".to_string()),
            ..Default::default()
        }
        .apply(&mut config);

        assert_eq!(applied, vec!["voice"]);
        assert_eq!(config.voice, "Kore");
        assert_eq!(config.system_instruction, DEFAULT_SYSTEM_INSTRUCTION);
        assert_eq!(config.response_modality, ResponseModality::Audio);
    }

    #[test]
    fn full_update_applies_every_field() {
        let mut config = SessionConfig::default();
        let applied = ConfigUpdate {
            voice: Some("Charon".to_string()),
            system_instruction: Some("Be terse.".to_string()),
            response_modality: Some(ResponseModality::Text),
        }
        .apply(&mut config);

        assert_eq!(applied.len(), 3);
        assert_eq!(config.voice, "Charon");
        assert_eq!(config.system_instruction, "Be terse.");
        assert_eq!(config.response_modality, ResponseModality::Text);
    }

    #[test]
    fn empty_update_is_noop() {
        let mut config = SessionConfig::default();
        let update = ConfigUpdate::default();
        assert!(update.is_empty());
        assert!(update.apply(&mut config).is_empty());
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn modality_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&ResponseModality::Audio).expect("serializes"),
            "\"AUDIO\""
        );
    }
}
