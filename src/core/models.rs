//! Built-in model registry
//!
//! The table of completion models and their capabilities is embedded at
//! compile time from `builtin_models.toml`. Settings may only reference
//! models present in this table.

use std::error::Error as StdError;
use std::fmt;

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelSpec {
    pub id: String,
    /// Upper bound for the `max_tokens` completion budget.
    pub max_tokens: u32,
    /// Whether the model accepts image content parts.
    pub supports_images: bool,
}

#[derive(Debug, Deserialize)]
struct ModelsConfig {
    models: Vec<ModelSpec>,
}

/// A model id that does not appear in the built-in registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownModel(pub String);

impl fmt::Display for UnknownModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown model: {}", self.0)
    }
}

impl StdError for UnknownModel {}

/// Load the built-in model table from the embedded configuration.
pub fn builtin_models() -> Vec<ModelSpec> {
    const CONFIG_CONTENT: &str = include_str!("../builtin_models.toml");

    let config: ModelsConfig =
        toml::from_str(CONFIG_CONTENT).expect("Failed to parse builtin_models.toml");

    config.models
}

/// Look up a model by id.
pub fn lookup(id: &str) -> Result<ModelSpec, UnknownModel> {
    builtin_models()
        .into_iter()
        .find(|m| m.id == id)
        .ok_or_else(|| UnknownModel(id.to_string()))
}

/// The model used for fresh sessions when nothing else is configured.
pub fn default_model() -> ModelSpec {
    builtin_models()
        .into_iter()
        .next()
        .expect("builtin_models.toml must list at least one model")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_is_non_empty_and_well_formed() {
        let models = builtin_models();
        assert!(!models.is_empty());

        for model in &models {
            assert!(!model.id.is_empty());
            assert!(model.max_tokens > 0);
        }
    }

    #[test]
    fn lookup_finds_registered_models() {
        let haiku = lookup("anthropic/claude-3-5-haiku").unwrap();
        assert_eq!(haiku.max_tokens, 8100);
        assert!(!haiku.supports_images);

        let mini = lookup("openai/gpt-4o-mini").unwrap();
        assert_eq!(mini.max_tokens, 16000);
        assert!(mini.supports_images);
    }

    #[test]
    fn lookup_rejects_unregistered_models() {
        let err = lookup("nonexistent/model").unwrap_err();
        assert_eq!(err, UnknownModel("nonexistent/model".to_string()));
    }

    #[test]
    fn default_model_is_first_entry() {
        assert_eq!(default_model().id, "anthropic/claude-3-5-haiku");
    }
}
