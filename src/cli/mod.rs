//! Command-line entrypoint: argument parsing and session bootstrap.

use clap::Parser;

use crate::api::ApiClient;
use crate::auth;
use crate::core::config::Config;
use crate::core::constants::DEFAULT_BASE_URL;
use crate::core::models;
use crate::core::session::{Intent, SessionController};
use crate::core::settings::Settings;
use crate::core::storage::StateStore;

pub mod chat_loop;

#[derive(Parser)]
#[command(name = "causerie")]
#[command(about = "A terminal chat client for OpenAI-compatible APIs")]
#[command(long_about = "Causerie keeps multiple conversation threads, persists them locally, and \
relays messages (text, images, voice-note transcriptions) to an OpenAI-compatible \
chat-completion API.\n\n\
Environment Variables:\n\
  CAUSERIE_API_KEY  Bearer credential for the API (otherwise read from local \
storage, prompted for on first run)\n\n\
Type a message at the prompt to send it; /help lists the available commands.")]
pub struct Args {
    /// Completion model for this session
    #[arg(short, long)]
    pub model: Option<String>,

    /// Override the API base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Append a transcript of the session to this file
    #[arg(long)]
    pub log_file: Option<String>,
}

pub async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let storage = StateStore::open_default();
    let credential = auth::resolve_credential(&storage)?;

    let base_url = args
        .base_url
        .or(config.base_url)
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let model_id = args
        .model
        .or(config.default_model)
        .unwrap_or_else(|| models::default_model().id);
    let model = models::lookup(&model_id)?;

    let chats = storage.load_chats()?;
    let mut controller = SessionController::new(chats, Settings::for_model(&model), storage);
    if controller.snapshot().chats.is_empty() {
        controller.dispatch(Intent::NewChat)?;
    }

    let client = ApiClient::new(base_url, credential);
    chat_loop::run(controller, client, args.log_file).await
}
