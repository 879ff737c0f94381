use std::fmt;
use serde::{Serialize, Deserialize};

/// Represents a chat-completion model identifier.
///
/// This can be a predefined model or a custom string value for models served
/// by OpenAI-compatible endpoints that this crate does not know about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Model {
    /// Known model versions
    Known(KnownModel),

    /// Custom model identifier
    Custom(String),
}

/// Known OpenAI chat models.
///
/// Anything else travels as [`Model::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KnownModel {
    /// GPT-3.5 Turbo
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
}

impl Default for Model {
    fn default() -> Self {
        Model::Known(KnownModel::Gpt35Turbo)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Model::Known(known_model) => write!(f, "{}", known_model),
            Model::Custom(custom) => write!(f, "{}", custom),
        }
    }
}

impl fmt::Display for KnownModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnownModel::Gpt35Turbo => write!(f, "gpt-3.5-turbo"),
        }
    }
}

impl From<KnownModel> for Model {
    fn from(model: KnownModel) -> Self {
        Model::Known(model)
    }
}

impl From<String> for Model {
    fn from(model: String) -> Self {
        Model::Custom(model)
    }
}

impl From<&str> for Model {
    fn from(model: &str) -> Self {
        Model::Custom(model.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_serializes_as_id() {
        let model = Model::Known(KnownModel::Gpt35Turbo);
        let json = serde_json::to_string(&model).unwrap();
        assert_eq!(json, r#""gpt-3.5-turbo""#);
    }

    #[test]
    fn model_deserialization() {
        let model: Model = serde_json::from_str(r#""gpt-3.5-turbo""#).unwrap();
        assert_eq!(model, Model::Known(KnownModel::Gpt35Turbo));

        let model: Model = serde_json::from_str(r#""llama-3-70b""#).unwrap();
        assert_eq!(model, Model::Custom("llama-3-70b".to_string()));
    }

    #[test]
    fn display_matches_wire_id() {
        assert_eq!(Model::default().to_string(), "gpt-3.5-turbo");
        assert_eq!(Model::from("local-model").to_string(), "local-model");
    }
}
