//! Terminal rendering
//!
//! Pure consumers of session snapshots: nothing here mutates state, and
//! everything takes whatever the controller handed out. Line-oriented
//! output only.

use std::io::{self, Write};

use crate::core::chat::Chat;
use crate::core::message::Role;
use crate::core::models;
use crate::core::session::SessionSnapshot;
use crate::core::settings::Settings;

pub fn render_greeting(snapshot: &SessionSnapshot) {
    println!("Causerie: terminal chat. Type a message and press Enter; /help lists commands.");
    render_settings(&snapshot.settings);
    if snapshot.chats.len() > 1 || snapshot.current_chat.is_none() {
        render_chat_list(snapshot);
    }
    if let Some(chat) = snapshot.current_chat.and_then(|id| snapshot.chats.get(id)) {
        println!("Active chat: {}", chat.title);
        render_transcript(chat);
    }
}

pub fn render_chat_list(snapshot: &SessionSnapshot) {
    if snapshot.chats.is_empty() {
        println!("No chats yet; /new starts one.");
        return;
    }
    println!("Chats:");
    for (index, chat) in snapshot.chats.iter().enumerate() {
        let marker = if snapshot.current_chat == Some(chat.id) {
            "*"
        } else {
            " "
        };
        println!(
            "{} {}. {} ({} messages)",
            marker,
            index + 1,
            chat.title,
            chat.messages.len()
        );
    }
}

pub fn render_transcript(chat: &Chat) {
    for message in &chat.messages {
        match message.role {
            Role::User => println!("You: {}", message.content.display_text()),
            Role::Assistant => println!("{}", message.content.display_text()),
        }
    }
}

pub fn render_assistant_reply(text: &str) {
    println!();
    println!("{text}");
}

pub fn render_settings(settings: &Settings) {
    println!(
        "Model: {} | temperature: {} | max tokens: {}",
        settings.model, settings.temperature, settings.max_tokens
    );
}

pub fn render_model_list(settings: &Settings) {
    println!("Models:");
    for model in models::builtin_models() {
        let marker = if model.id == settings.model { "*" } else { " " };
        let images = if model.supports_images {
            "text+images"
        } else {
            "text only"
        };
        println!(
            "{} {} (up to {} tokens, {})",
            marker, model.id, model.max_tokens, images
        );
    }
}

pub fn render_error(err: &dyn std::error::Error) {
    println!("! {err}");
}

pub fn render_notice(text: &str) {
    println!("{text}");
}

pub fn render_help() {
    println!("Commands:");
    println!("  /new                start a new chat");
    println!("  /list               list chats");
    println!("  /switch <n|id>      make a chat active");
    println!("  /delete [n|id]      delete a chat (default: the active one)");
    println!("  /model <id>         switch completion model");
    println!("  /temp <value>       set sampling temperature (0..2)");
    println!("  /max-tokens <n>     set the completion budget");
    println!("  /attach <path>      stage an image for the next message");
    println!("  /voice <path>       transcribe an audio file into the next message");
    println!("  /settings           show current settings and models");
    println!("  /help               this list");
    println!("  /quit               exit");
}

/// Print the input prompt without a trailing newline.
pub fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}
