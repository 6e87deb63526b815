//! Session controller
//!
//! One controller instance owns the full mutable application state (chat
//! store, current chat, settings) and is the only writer of the durable
//! copy. UI layers never mutate state directly: they dispatch intents and
//! consume snapshots.
//!
//! Every transition is atomic from an observer's point of view: the next
//! state is computed in full, the chat store is persisted, and only then are
//! observers handed the new snapshot. Sending a message is two-phased: the
//! user turn is appended synchronously before any network traffic, and the
//! assistant turn arrives later via [`SessionController::resolve_completion`]
//! as its own transition, addressed to the chat id captured at send time.

use std::error::Error as StdError;
use std::fmt;

use tokio::sync::mpsc;

use crate::core::chat::{ChatId, ChatIdGenerator, ChatStore, UnknownChat};
use crate::core::compose::{self, EmptyMessage};
use crate::core::message::{Message, MessageContent};
use crate::core::models::{self, UnknownModel};
use crate::core::settings::{Settings, SettingsPatch};
use crate::core::storage::{StateStore, StorageError};

/// The full mutable application state for one running instance. Cloned
/// freely as the snapshot type handed to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub chats: ChatStore,
    pub current_chat: Option<ChatId>,
    pub settings: Settings,
}

/// Snapshots are plain state clones.
pub type SessionSnapshot = SessionState;

/// A discrete user intent, translated from UI events.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    NewChat,
    SelectChat(ChatId),
    DeleteChat(ChatId),
    SendMessage { text: String, images: Vec<String> },
    ChangeSettings(SettingsPatch),
}

/// Everything a completion request needs, captured at send time. The chat id
/// pins where the reply lands even if the user has moved on to another chat
/// by the time it arrives.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCompletion {
    pub chat_id: ChatId,
    pub messages: Vec<Message>,
    pub settings: Settings,
}

/// Result of a successfully dispatched intent.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The transition is fully applied.
    Done,
    /// Phase one of a send is applied; the caller must run the completion
    /// request and feed the reply back through `resolve_completion`.
    Pending(PendingCompletion),
}

#[derive(Debug)]
pub enum SessionError {
    /// `SendMessage` with no chat selected; nothing was mutated.
    NoActiveChat,
    UnknownChat(UnknownChat),
    UnknownModel(UnknownModel),
    EmptyMessage(EmptyMessage),
    Storage(StorageError),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::NoActiveChat => {
                write!(f, "no chat is selected; use /new to start one")
            }
            SessionError::UnknownChat(err) => write!(f, "{err}"),
            SessionError::UnknownModel(err) => write!(f, "{err}"),
            SessionError::EmptyMessage(err) => write!(f, "{err}"),
            SessionError::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl StdError for SessionError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            SessionError::NoActiveChat => None,
            SessionError::UnknownChat(err) => Some(err),
            SessionError::UnknownModel(err) => Some(err),
            SessionError::EmptyMessage(err) => Some(err),
            SessionError::Storage(err) => Some(err),
        }
    }
}

impl From<UnknownChat> for SessionError {
    fn from(err: UnknownChat) -> Self {
        SessionError::UnknownChat(err)
    }
}

impl From<UnknownModel> for SessionError {
    fn from(err: UnknownModel) -> Self {
        SessionError::UnknownModel(err)
    }
}

impl From<EmptyMessage> for SessionError {
    fn from(err: EmptyMessage) -> Self {
        SessionError::EmptyMessage(err)
    }
}

impl From<StorageError> for SessionError {
    fn from(err: StorageError) -> Self {
        SessionError::Storage(err)
    }
}

pub struct SessionController {
    state: SessionState,
    ids: ChatIdGenerator,
    storage: StateStore,
    observers: Vec<mpsc::UnboundedSender<SessionSnapshot>>,
}

impl SessionController {
    pub fn new(chats: ChatStore, settings: Settings, storage: StateStore) -> Self {
        let ids = ChatIdGenerator::resuming_from(&chats);
        Self {
            state: SessionState {
                chats,
                current_chat: None,
                settings,
            },
            ids,
            storage,
            observers: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.clone()
    }

    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }

    pub fn current_chat(&self) -> Option<ChatId> {
        self.state.current_chat
    }

    /// Register an observer. Each completed transition delivers one snapshot;
    /// closed receivers are dropped on the next notification.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionSnapshot> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        rx
    }

    pub fn dispatch(&mut self, intent: Intent) -> Result<Outcome, SessionError> {
        match intent {
            Intent::NewChat => {
                let (chats, id) = self.state.chats.create_chat(&mut self.ids);
                self.state.chats = chats;
                self.state.current_chat = Some(id);
                self.commit()?;
                Ok(Outcome::Done)
            }
            Intent::SelectChat(id) => {
                if !self.state.chats.contains(id) {
                    return Err(UnknownChat(id).into());
                }
                self.state.current_chat = Some(id);
                self.commit()?;
                Ok(Outcome::Done)
            }
            Intent::DeleteChat(id) => {
                let chats = self.state.chats.delete_chat(id);
                if self.state.current_chat == Some(id) {
                    self.state.current_chat = chats.first_id();
                }
                self.state.chats = chats;
                self.commit()?;
                Ok(Outcome::Done)
            }
            Intent::SendMessage { text, images } => {
                let chat_id = self.state.current_chat.ok_or(SessionError::NoActiveChat)?;
                let model = models::lookup(&self.state.settings.model)?;
                let content = compose::compose(&text, &images, &model)?;

                self.state.chats = self
                    .state
                    .chats
                    .append_message(chat_id, Message::user(content))?;
                self.commit()?;

                let messages = self
                    .state
                    .chats
                    .get(chat_id)
                    .map(|chat| chat.messages.clone())
                    .unwrap_or_default();
                Ok(Outcome::Pending(PendingCompletion {
                    chat_id,
                    messages,
                    settings: self.state.settings.clone(),
                }))
            }
            Intent::ChangeSettings(patch) => {
                let model_id = patch
                    .model
                    .clone()
                    .unwrap_or_else(|| self.state.settings.model.clone());
                let model = models::lookup(&model_id)?;
                self.state.settings = self.state.settings.apply(patch, &model);
                self.commit()?;
                Ok(Outcome::Done)
            }
        }
    }

    /// Phase two of a send: append the assistant reply to the chat captured
    /// at send time. If that chat was deleted while the request was in
    /// flight, the reply is dropped without error.
    pub fn resolve_completion(
        &mut self,
        chat_id: ChatId,
        content: MessageContent,
    ) -> Result<(), SessionError> {
        match self.state.chats.append_message(chat_id, Message::assistant(content)) {
            Ok(chats) => {
                self.state.chats = chats;
                self.commit()?;
                Ok(())
            }
            Err(UnknownChat(id)) => {
                tracing::debug!("dropping late reply for deleted chat {id}");
                Ok(())
            }
        }
    }

    fn commit(&mut self) -> Result<(), SessionError> {
        self.storage.save_chats(&self.state.chats)?;
        let snapshot = self.state.clone();
        self.observers.retain(|tx| tx.send(snapshot.clone()).is_ok());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::{ContentPart, Role};
    use tempfile::tempdir;

    fn controller_in(dir: &std::path::Path) -> SessionController {
        let storage = StateStore::at(dir.to_path_buf());
        let chats = storage.load_chats().unwrap();
        let settings = Settings::for_model(&models::default_model());
        SessionController::new(chats, settings, storage)
    }

    #[test]
    fn send_then_resolve_builds_the_expected_log() {
        let dir = tempdir().expect("tempdir");
        let mut controller = controller_in(dir.path());

        controller.dispatch(Intent::NewChat).unwrap();
        let chat_id = controller.current_chat().unwrap();
        assert_eq!(
            controller.snapshot().chats.get(chat_id).unwrap().title,
            "Chat 1"
        );

        let outcome = controller
            .dispatch(Intent::SendMessage {
                text: "hello".to_string(),
                images: Vec::new(),
            })
            .unwrap();

        let pending = match outcome {
            Outcome::Pending(pending) => pending,
            other => panic!("expected pending completion, got {other:?}"),
        };
        assert_eq!(pending.chat_id, chat_id);
        assert_eq!(pending.messages.len(), 1);
        assert_eq!(pending.messages[0], Message::user("hello"));

        // Phase one must be durable before the network call resolves.
        let persisted = StateStore::at(dir.path().to_path_buf())
            .load_chats()
            .unwrap();
        assert_eq!(persisted.get(chat_id).unwrap().messages.len(), 1);

        controller
            .resolve_completion(chat_id, MessageContent::Text("hi there".to_string()))
            .unwrap();

        let snapshot = controller.snapshot();
        let messages = &snapshot.chats.get(chat_id).unwrap().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], Message::user("hello"));
        assert_eq!(messages[1], Message::assistant("hi there"));
    }

    #[test]
    fn late_reply_after_delete_is_a_silent_no_op() {
        let dir = tempdir().expect("tempdir");
        let mut controller = controller_in(dir.path());

        controller.dispatch(Intent::NewChat).unwrap();
        let chat_id = controller.current_chat().unwrap();
        let pending = match controller
            .dispatch(Intent::SendMessage {
                text: "hello".to_string(),
                images: Vec::new(),
            })
            .unwrap()
        {
            Outcome::Pending(pending) => pending,
            other => panic!("expected pending completion, got {other:?}"),
        };

        controller.dispatch(Intent::DeleteChat(chat_id)).unwrap();
        let before = controller.snapshot();

        controller
            .resolve_completion(pending.chat_id, MessageContent::Text("late".to_string()))
            .unwrap();

        assert_eq!(controller.snapshot(), before);
    }

    #[test]
    fn send_without_a_chat_is_rejected_before_any_mutation() {
        let dir = tempdir().expect("tempdir");
        let mut controller = controller_in(dir.path());

        let before = controller.snapshot();
        let err = controller
            .dispatch(Intent::SendMessage {
                text: "hello".to_string(),
                images: Vec::new(),
            })
            .unwrap_err();

        assert!(matches!(err, SessionError::NoActiveChat));
        assert_eq!(controller.snapshot(), before);
    }

    #[test]
    fn empty_send_aborts_the_transition() {
        let dir = tempdir().expect("tempdir");
        let mut controller = controller_in(dir.path());
        controller.dispatch(Intent::NewChat).unwrap();

        let before = controller.snapshot();
        let err = controller
            .dispatch(Intent::SendMessage {
                text: "   ".to_string(),
                images: Vec::new(),
            })
            .unwrap_err();

        assert!(matches!(err, SessionError::EmptyMessage(_)));
        assert_eq!(controller.snapshot(), before);
    }

    #[test]
    fn images_ride_along_when_the_model_supports_them() {
        let dir = tempdir().expect("tempdir");
        let mut controller = controller_in(dir.path());
        controller.dispatch(Intent::NewChat).unwrap();
        controller
            .dispatch(Intent::ChangeSettings(SettingsPatch::model(
                "openai/gpt-4o-mini",
            )))
            .unwrap();

        let pending = match controller
            .dispatch(Intent::SendMessage {
                text: "look".to_string(),
                images: vec!["data:image/png;base64,AAAA".to_string()],
            })
            .unwrap()
        {
            Outcome::Pending(pending) => pending,
            other => panic!("expected pending completion, got {other:?}"),
        };

        match &pending.messages[0].content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(parts[0], ContentPart::text("look"));
            }
            other => panic!("expected parts, got {other:?}"),
        }
        assert_eq!(pending.messages[0].role, Role::User);
    }

    #[test]
    fn deleting_the_current_chat_falls_back_to_a_remaining_one() {
        let dir = tempdir().expect("tempdir");
        let mut controller = controller_in(dir.path());

        controller.dispatch(Intent::NewChat).unwrap();
        let first = controller.current_chat().unwrap();
        controller.dispatch(Intent::NewChat).unwrap();
        let second = controller.current_chat().unwrap();

        controller.dispatch(Intent::DeleteChat(second)).unwrap();
        assert_eq!(controller.current_chat(), Some(first));

        controller.dispatch(Intent::DeleteChat(first)).unwrap();
        assert_eq!(controller.current_chat(), None);

        // Deleting an already-deleted chat stays a no-op.
        controller.dispatch(Intent::DeleteChat(first)).unwrap();
        assert!(controller.snapshot().chats.is_empty());
    }

    #[test]
    fn deleting_a_background_chat_keeps_the_selection() {
        let dir = tempdir().expect("tempdir");
        let mut controller = controller_in(dir.path());

        controller.dispatch(Intent::NewChat).unwrap();
        let first = controller.current_chat().unwrap();
        controller.dispatch(Intent::NewChat).unwrap();
        let second = controller.current_chat().unwrap();
        controller.dispatch(Intent::SelectChat(first)).unwrap();

        controller.dispatch(Intent::DeleteChat(second)).unwrap();
        assert_eq!(controller.current_chat(), Some(first));
    }

    #[test]
    fn selecting_an_unknown_chat_is_rejected() {
        let dir = tempdir().expect("tempdir");
        let mut controller = controller_in(dir.path());
        controller.dispatch(Intent::NewChat).unwrap();
        let id = controller.current_chat().unwrap();
        controller.dispatch(Intent::DeleteChat(id)).unwrap();

        let err = controller.dispatch(Intent::SelectChat(id)).unwrap_err();
        assert!(matches!(err, SessionError::UnknownChat(_)));
    }

    #[test]
    fn settings_changes_reject_unknown_models_untouched() {
        let dir = tempdir().expect("tempdir");
        let mut controller = controller_in(dir.path());

        let before = controller.settings().clone();
        let err = controller
            .dispatch(Intent::ChangeSettings(SettingsPatch::model("no/such-model")))
            .unwrap_err();

        assert!(matches!(err, SessionError::UnknownModel(_)));
        assert_eq!(controller.settings(), &before);
    }

    #[test]
    fn model_switch_clamps_max_tokens_through_dispatch() {
        let dir = tempdir().expect("tempdir");
        let mut controller = controller_in(dir.path());

        controller
            .dispatch(Intent::ChangeSettings(SettingsPatch::model(
                "openai/gpt-4o-mini",
            )))
            .unwrap();
        controller
            .dispatch(Intent::ChangeSettings(SettingsPatch::max_tokens(12_000)))
            .unwrap();
        controller
            .dispatch(Intent::ChangeSettings(SettingsPatch::model(
                "anthropic/claude-3-5-haiku",
            )))
            .unwrap();

        assert_eq!(controller.settings().max_tokens, 8100);
    }

    #[test]
    fn observers_get_one_snapshot_per_transition() {
        let dir = tempdir().expect("tempdir");
        let mut controller = controller_in(dir.path());
        let mut updates = controller.subscribe();

        controller.dispatch(Intent::NewChat).unwrap();
        let snapshot = updates.try_recv().unwrap();
        assert_eq!(snapshot.chats.len(), 1);
        assert!(updates.try_recv().is_err());

        controller
            .dispatch(Intent::SendMessage {
                text: "hello".to_string(),
                images: Vec::new(),
            })
            .unwrap();
        let snapshot = updates.try_recv().unwrap();
        let chat = snapshot.chats.iter().next().unwrap();
        assert_eq!(chat.messages.len(), 1);
    }

    #[test]
    fn a_reloaded_session_sees_persisted_chats() {
        let dir = tempdir().expect("tempdir");
        {
            let mut controller = controller_in(dir.path());
            controller.dispatch(Intent::NewChat).unwrap();
            let id = controller.current_chat().unwrap();
            controller
                .dispatch(Intent::SendMessage {
                    text: "persist me".to_string(),
                    images: Vec::new(),
                })
                .unwrap();
            controller
                .resolve_completion(id, MessageContent::Text("saved".to_string()))
                .unwrap();
        }

        let controller = controller_in(dir.path());
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.chats.len(), 1);
        let chat = snapshot.chats.iter().next().unwrap();
        assert_eq!(chat.messages.len(), 2);
        // Nothing is selected until the user picks a chat.
        assert_eq!(snapshot.current_chat, None);
    }
}
