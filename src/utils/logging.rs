//! Transcript logging
//!
//! An observer that appends user and assistant turns to a plain-text log
//! file as session snapshots arrive. Each chat's messages are written once,
//! in order; the logger tracks how far into every chat it has written so a
//! snapshot per transition never duplicates earlier turns.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;

use chrono::Local;

use crate::core::chat::ChatId;
use crate::core::message::Role;
use crate::core::session::SessionSnapshot;

pub struct TranscriptLogger {
    file_path: String,
    seen: HashMap<ChatId, usize>,
}

impl TranscriptLogger {
    /// Open (or create) the log file and write a session header. Fails early
    /// if the path is not writable.
    pub fn new(file_path: String) -> std::io::Result<Self> {
        let mut logger = TranscriptLogger {
            file_path,
            seen: HashMap::new(),
        };
        logger.append(&format!(
            "## Transcript started {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        ))?;
        Ok(logger)
    }

    /// Append any turns this logger has not written yet.
    pub fn observe(&mut self, snapshot: &SessionSnapshot) -> std::io::Result<()> {
        let mut pending = String::new();

        for chat in snapshot.chats.iter() {
            let seen = self.seen.entry(chat.id).or_insert(0);
            for message in chat.messages.iter().skip(*seen) {
                let speaker = match message.role {
                    Role::User => "You",
                    Role::Assistant => "Assistant",
                };
                pending.push_str(&format!(
                    "[{}] {}: {}\n",
                    chat.title,
                    speaker,
                    message.content.display_text()
                ));
            }
            *seen = chat.messages.len();
        }

        if pending.is_empty() {
            return Ok(());
        }
        self.append(&pending)
    }

    fn append(&mut self, content: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}
