//! Session settings
//!
//! Settings are scoped to one running session and rebuilt from defaults at
//! startup; only the chat store is persisted.

use crate::core::constants::{
    DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, MIN_MAX_TOKENS, TEMPERATURE_RANGE,
};
use crate::core::models::ModelSpec;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Partial settings update carried by the `ChangeSettings` intent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsPatch {
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl SettingsPatch {
    pub fn model(id: impl Into<String>) -> Self {
        SettingsPatch {
            model: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn temperature(value: f64) -> Self {
        SettingsPatch {
            temperature: Some(value),
            ..Default::default()
        }
    }

    pub fn max_tokens(value: u32) -> Self {
        SettingsPatch {
            max_tokens: Some(value),
            ..Default::default()
        }
    }
}

impl Settings {
    /// Defaults for a fresh session on the given model.
    pub fn for_model(model: &ModelSpec) -> Self {
        Settings {
            model: model.id.clone(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS.clamp(MIN_MAX_TOKENS, model.max_tokens),
        }
    }

    /// Apply a patch, clamping values into their valid ranges. `model` must
    /// be the registry entry for the patched model id (or the current one
    /// when the patch leaves the model unchanged); the caller resolves it so
    /// unknown models are rejected before anything is applied.
    ///
    /// Switching to a model with a lower token ceiling clamps `max_tokens`
    /// down; switching to a roomier model leaves it unchanged.
    pub fn apply(&self, patch: SettingsPatch, model: &ModelSpec) -> Settings {
        let (temp_min, temp_max) = TEMPERATURE_RANGE;
        let temperature = patch
            .temperature
            .unwrap_or(self.temperature)
            .clamp(temp_min, temp_max);
        let max_tokens = patch
            .max_tokens
            .unwrap_or(self.max_tokens)
            .clamp(MIN_MAX_TOKENS, model.max_tokens);

        Settings {
            model: model.id.clone(),
            temperature,
            max_tokens,
        }
    }
}
