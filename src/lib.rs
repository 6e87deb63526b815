//! Causerie is a terminal chat client that keeps multiple independent
//! conversation threads, persists them locally, and relays messages to an
//! OpenAI-compatible chat-completion API.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the conversation state machine: the chat store, message
//!   composition, settings, the model registry, and local persistence.
//! - [`api`] defines the wire payloads and the completion/transcription
//!   client used against the remote endpoint.
//! - [`ui`] renders session snapshots as plain terminal output.
//! - [`cli`] parses arguments and runs the interactive chat loop that
//!   translates input lines into session intents.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::run`].

pub mod api;
pub mod auth;
pub mod cli;
pub mod core;
pub mod ui;
pub mod utils;
