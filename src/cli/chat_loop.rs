//! Interactive chat loop
//!
//! One `select!` loop owns the session controller and serializes every state
//! transition: terminal lines become intents, and completion/transcription
//! requests run in spawned tasks that report back over an mpsc channel.
//! A reply always lands in the chat captured at send time, even if the
//! selection changed while the request was in flight.

use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::api::{ApiClient, ApiError};
use crate::core::chat::ChatId;
use crate::core::message::MessageContent;
use crate::core::models;
use crate::core::session::{
    Intent, Outcome, PendingCompletion, SessionController, SessionSnapshot,
};
use crate::core::settings::SettingsPatch;
use crate::ui;
use crate::utils::image;
use crate::utils::logging::TranscriptLogger;

/// Events fed back into the loop by spawned request tasks.
enum LoopEvent {
    Completion {
        chat_id: ChatId,
        result: Result<MessageContent, ApiError>,
    },
    Transcription(Result<String, String>),
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    New,
    List,
    Switch(String),
    Delete(Option<String>),
    Model(String),
    Temperature(f64),
    MaxTokens(u32),
    Attach(PathBuf),
    Voice(PathBuf),
    Settings,
    Help,
    Quit,
}

fn parse_command(input: &str) -> Result<Command, String> {
    let mut words = input.split_whitespace();
    let name = words.next().unwrap_or("");
    let rest = words.collect::<Vec<_>>().join(" ");

    let required = |usage: &str| -> Result<String, String> {
        if rest.is_empty() {
            Err(format!("usage: {usage}"))
        } else {
            Ok(rest.clone())
        }
    };

    match name {
        "new" => Ok(Command::New),
        "list" | "chats" => Ok(Command::List),
        "switch" | "select" => required("/switch <n|id>").map(Command::Switch),
        "delete" | "del" => Ok(Command::Delete(if rest.is_empty() {
            None
        } else {
            Some(rest.clone())
        })),
        "model" => required("/model <id>").map(Command::Model),
        "temp" | "temperature" => rest
            .parse::<f64>()
            .map(Command::Temperature)
            .map_err(|_| "usage: /temp <value between 0 and 2>".to_string()),
        "max-tokens" | "tokens" => rest
            .parse::<u32>()
            .map(Command::MaxTokens)
            .map_err(|_| "usage: /max-tokens <number>".to_string()),
        "attach" | "image" => required("/attach <path>")
            .map(|p| Command::Attach(PathBuf::from(p))),
        "voice" | "transcribe" => required("/voice <path>")
            .map(|p| Command::Voice(PathBuf::from(p))),
        "settings" => Ok(Command::Settings),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        other => Err(format!("Unknown command '/{other}'; /help lists commands")),
    }
}

/// Resolve a chat argument: a 1-based position in the displayed list, or a
/// raw chat id.
fn resolve_chat_arg(snapshot: &SessionSnapshot, arg: &str) -> Option<ChatId> {
    if let Ok(index) = arg.parse::<usize>() {
        if index >= 1 {
            if let Some(chat) = snapshot.chats.iter().nth(index - 1) {
                return Some(chat.id);
            }
        }
    }
    arg.parse::<ChatId>()
        .ok()
        .filter(|id| snapshot.chats.contains(*id))
}

struct ChatLoop {
    controller: SessionController,
    client: ApiClient,
    events_tx: mpsc::UnboundedSender<LoopEvent>,
    /// Images staged for the next message, as data URLs.
    staged_images: Vec<String>,
    /// Transcribed voice input waiting to be prepended to the next message.
    draft: String,
}

impl ChatLoop {
    async fn handle_line(&mut self, line: &str) -> Flow {
        if line.is_empty() {
            return Flow::Continue;
        }
        match line.strip_prefix('/') {
            Some(rest) => self.handle_command(rest).await,
            None => {
                self.send_message(line);
                Flow::Continue
            }
        }
    }

    async fn handle_command(&mut self, input: &str) -> Flow {
        let command = match parse_command(input) {
            Ok(command) => command,
            Err(usage) => {
                ui::render_notice(&usage);
                return Flow::Continue;
            }
        };

        match command {
            Command::Quit => return Flow::Quit,
            Command::Help => ui::render_help(),
            Command::List => ui::render_chat_list(&self.controller.snapshot()),
            Command::Settings => {
                ui::render_settings(self.controller.settings());
                ui::render_model_list(self.controller.settings());
            }
            Command::New => {
                if self.apply(Intent::NewChat) {
                    let snapshot = self.controller.snapshot();
                    if let Some(chat) =
                        snapshot.current_chat.and_then(|id| snapshot.chats.get(id))
                    {
                        ui::render_notice(&format!("Started {}", chat.title));
                    }
                }
            }
            Command::Switch(arg) => {
                let snapshot = self.controller.snapshot();
                match resolve_chat_arg(&snapshot, &arg) {
                    Some(id) => {
                        if self.apply(Intent::SelectChat(id)) {
                            let snapshot = self.controller.snapshot();
                            if let Some(chat) = snapshot.chats.get(id) {
                                ui::render_notice(&format!("Switched to {}", chat.title));
                                ui::render_transcript(chat);
                            }
                        }
                    }
                    None => ui::render_notice(&format!("No chat matches '{arg}'")),
                }
            }
            Command::Delete(arg) => {
                let snapshot = self.controller.snapshot();
                let target = match arg {
                    Some(arg) => resolve_chat_arg(&snapshot, &arg),
                    None => snapshot.current_chat,
                };
                match target {
                    Some(id) => {
                        if self.apply(Intent::DeleteChat(id)) {
                            ui::render_notice("Chat deleted.");
                            ui::render_chat_list(&self.controller.snapshot());
                        }
                    }
                    None => ui::render_notice("Nothing to delete; no chat is selected."),
                }
            }
            Command::Model(id) => {
                if self.apply(Intent::ChangeSettings(SettingsPatch::model(id))) {
                    ui::render_settings(self.controller.settings());
                }
            }
            Command::Temperature(value) => {
                if self.apply(Intent::ChangeSettings(SettingsPatch::temperature(value))) {
                    ui::render_settings(self.controller.settings());
                }
            }
            Command::MaxTokens(value) => {
                if self.apply(Intent::ChangeSettings(SettingsPatch::max_tokens(value))) {
                    ui::render_settings(self.controller.settings());
                }
            }
            Command::Attach(path) => self.attach(path).await,
            Command::Voice(path) => self.spawn_transcription(path),
        }

        Flow::Continue
    }

    fn apply(&mut self, intent: Intent) -> bool {
        match self.controller.dispatch(intent) {
            Ok(_) => true,
            Err(err) => {
                ui::render_error(&err);
                false
            }
        }
    }

    fn send_message(&mut self, line: &str) {
        let text = if self.draft.is_empty() {
            line.to_string()
        } else {
            format!("{} {}", self.draft.trim_end(), line)
        };

        let intent = Intent::SendMessage {
            text,
            images: self.staged_images.clone(),
        };
        match self.controller.dispatch(intent) {
            Ok(Outcome::Pending(pending)) => {
                self.draft.clear();
                self.staged_images.clear();
                self.spawn_completion(pending);
            }
            Ok(Outcome::Done) => {}
            Err(err) => ui::render_error(&err),
        }
    }

    fn spawn_completion(&self, pending: PendingCompletion) {
        let client = self.client.clone();
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = client.complete(&pending.messages, &pending.settings).await;
            let _ = events_tx.send(LoopEvent::Completion {
                chat_id: pending.chat_id,
                result,
            });
        });
    }

    /// Attaching is refused outright on an image-incapable model; images
    /// staged before a model switch are instead dropped at compose time.
    async fn attach(&mut self, path: PathBuf) {
        let model = match models::lookup(&self.controller.settings().model) {
            Ok(model) => model,
            Err(err) => {
                ui::render_error(&err);
                return;
            }
        };
        if !model.supports_images {
            ui::render_notice("The current model does not support image input.");
            return;
        }

        match image::file_to_data_url(&path).await {
            Ok(url) => {
                self.staged_images.push(url);
                ui::render_notice(&format!(
                    "Attached {} ({} image(s) staged for the next message)",
                    path.display(),
                    self.staged_images.len()
                ));
            }
            Err(err) => {
                ui::render_notice(&format!("! could not read {}: {err}", path.display()))
            }
        }
    }

    fn spawn_transcription(&self, path: PathBuf) {
        let client = self.client.clone();
        let events_tx = self.events_tx.clone();
        ui::render_notice("Transcribing...");
        tokio::spawn(async move {
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "speech.mp3".to_string());
            let result = match tokio::fs::read(&path).await {
                Ok(bytes) => client
                    .transcribe(bytes, &filename)
                    .await
                    .map_err(|err| err.to_string()),
                Err(err) => Err(format!("could not read {}: {err}", path.display())),
            };
            let _ = events_tx.send(LoopEvent::Transcription(result));
        });
    }

    fn handle_event(&mut self, event: LoopEvent) {
        match event {
            LoopEvent::Completion { chat_id, result } => match result {
                Ok(content) => {
                    ui::render_assistant_reply(&content.display_text());
                    if let Err(err) = self.controller.resolve_completion(chat_id, content) {
                        ui::render_error(&err);
                    }
                }
                // The user turn stays in the log; sending again is the retry.
                Err(err) => ui::render_error(&err),
            },
            LoopEvent::Transcription(result) => match result {
                Ok(text) => {
                    let text = text.trim();
                    if text.is_empty() {
                        ui::render_notice("Transcription came back empty.");
                    } else {
                        if !self.draft.is_empty() {
                            self.draft.push(' ');
                        }
                        self.draft.push_str(text);
                        ui::render_notice(&format!("Transcribed: {text}"));
                        ui::render_notice("It will be prepended to your next message.");
                    }
                }
                Err(message) => ui::render_notice(&format!("! {message}")),
            },
        }
    }
}

pub async fn run(
    mut controller: SessionController,
    client: ApiClient,
    log_file: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();

    if let Some(path) = log_file {
        let mut logger = TranscriptLogger::new(path)?;
        let mut updates = controller.subscribe();
        tokio::spawn(async move {
            while let Some(snapshot) = updates.recv().await {
                if let Err(err) = logger.observe(&snapshot) {
                    tracing::warn!("transcript logging failed: {err}");
                }
            }
        });
    }

    ui::render_notice(&format!("API endpoint: {}", client.base_url()));
    ui::render_greeting(&controller.snapshot());

    let mut state = ChatLoop {
        controller,
        client,
        events_tx,
        staged_images: Vec::new(),
        draft: String::new(),
    };

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    ui::prompt();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    None => break,
                    Some(line) => {
                        if state.handle_line(line.trim()).await == Flow::Quit {
                            break;
                        }
                        ui::prompt();
                    }
                }
            }
            Some(event) = events_rx.recv() => {
                state.handle_event(event);
                ui::prompt();
            }
        }
    }

    Ok(())
}
