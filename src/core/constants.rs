//! Shared constants used across the application

/// API base URL used when neither the config file nor `--base-url` says
/// otherwise.
pub const DEFAULT_BASE_URL: &str = "https://api.vsegpt.ru/v1";

/// Application title advertised to the API via the `X-Title` extra header.
pub const APP_TITLE: &str = "Causerie";

/// Fixed model identifier for the transcription endpoint.
pub const TRANSCRIPTION_MODEL: &str = "stt-openai/whisper-1";

/// Language hint sent with transcription requests.
pub const TRANSCRIPTION_LANGUAGE: &str = "ru";

/// Environment variable that overrides the stored API credential.
pub const API_KEY_ENV: &str = "CAUSERIE_API_KEY";

/// Lower bound for the `max_tokens` setting; the upper bound comes from the
/// selected model.
pub const MIN_MAX_TOKENS: u32 = 100;

/// Inclusive sampling temperature range accepted by the API.
pub const TEMPERATURE_RANGE: (f64, f64) = (0.0, 2.0);

/// Default sampling temperature for a fresh session.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Default completion budget for a fresh session, clamped to the model
/// ceiling when the default model is narrower.
pub const DEFAULT_MAX_TOKENS: u32 = 3000;
