//! Chat threads and the chat store.
//!
//! Store operations are pure: they return a new store instead of mutating in
//! place, which keeps persistence trivial (serialize whatever the controller
//! currently holds) and makes the transition tests straightforward.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::core::message::Message;

/// Identity of one chat thread.
///
/// Ids are derived from the millisecond clock at creation time and are
/// strictly increasing within a process: same-millisecond creations are
/// disambiguated with a sequence counter. Ordering by id is creation order,
/// which is what the store relies on for display.
///
/// Serialized as a string (`"1736882000000"`, or `"1736882000000-1"` for
/// tie-broken ids) so it can key a JSON object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChatId {
    millis: i64,
    seq: u32,
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.seq == 0 {
            write!(f, "{}", self.millis)
        } else {
            write!(f, "{}-{}", self.millis, self.seq)
        }
    }
}

impl FromStr for ChatId {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (millis, seq) = match value.split_once('-') {
            Some((millis, seq)) => (millis, seq),
            None => (value, "0"),
        };
        let millis = millis
            .parse::<i64>()
            .map_err(|_| format!("invalid chat id: {value}"))?;
        let seq = seq
            .parse::<u32>()
            .map_err(|_| format!("invalid chat id: {value}"))?;
        Ok(ChatId { millis, seq })
    }
}

impl TryFrom<String> for ChatId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChatId> for String {
    fn from(value: ChatId) -> Self {
        value.to_string()
    }
}

/// Source of strictly increasing chat ids, owned by the session controller.
#[derive(Debug, Default)]
pub struct ChatIdGenerator {
    last: Option<ChatId>,
}

impl ChatIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from the ids already present in a loaded store so that new ids
    /// stay ahead of persisted ones.
    pub fn resuming_from(store: &ChatStore) -> Self {
        Self {
            last: store.chats.keys().next_back().copied(),
        }
    }

    pub fn next_id(&mut self) -> ChatId {
        self.next_at(Utc::now().timestamp_millis())
    }

    fn next_at(&mut self, millis: i64) -> ChatId {
        let mut candidate = ChatId { millis, seq: 0 };
        if let Some(last) = self.last {
            if candidate <= last {
                candidate = ChatId {
                    millis: last.millis,
                    seq: last.seq + 1,
                };
            }
        }
        self.last = Some(candidate);
        candidate
    }
}

/// One independent conversation thread with its own message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub title: String,
    pub messages: Vec<Message>,
}

/// An operation addressed a chat id that is not in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownChat(pub ChatId);

impl fmt::Display for UnknownChat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown chat: {}", self.0)
    }
}

impl StdError for UnknownChat {}

/// Mapping of chat id to chat. Iteration follows id order, which is creation
/// order because ids are strictly increasing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatStore {
    chats: BTreeMap<ChatId, Chat>,
}

impl ChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }

    pub fn contains(&self, id: ChatId) -> bool {
        self.chats.contains_key(&id)
    }

    pub fn get(&self, id: ChatId) -> Option<&Chat> {
        self.chats.get(&id)
    }

    /// Chats in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Chat> {
        self.chats.values()
    }

    /// Id of the oldest remaining chat, used as the fallback selection after
    /// the current chat is deleted.
    pub fn first_id(&self) -> Option<ChatId> {
        self.chats.keys().next().copied()
    }

    /// Create a new empty chat titled `"Chat N"` where N is the current chat
    /// count plus one.
    pub fn create_chat(&self, ids: &mut ChatIdGenerator) -> (ChatStore, ChatId) {
        let id = ids.next_id();
        let chat = Chat {
            id,
            title: format!("Chat {}", self.chats.len() + 1),
            messages: Vec::new(),
        };

        let mut chats = self.chats.clone();
        chats.insert(id, chat);
        (ChatStore { chats }, id)
    }

    /// Remove a chat. Deleting an id that is not present is a benign no-op.
    pub fn delete_chat(&self, id: ChatId) -> ChatStore {
        let mut chats = self.chats.clone();
        chats.remove(&id);
        ChatStore { chats }
    }

    /// Append a message to the end of a chat's log. Prior messages are never
    /// reordered or rewritten.
    pub fn append_message(&self, id: ChatId, message: Message) -> Result<ChatStore, UnknownChat> {
        if !self.chats.contains_key(&id) {
            return Err(UnknownChat(id));
        }

        let mut chats = self.chats.clone();
        chats
            .get_mut(&id)
            .expect("presence checked above")
            .messages
            .push(message);
        Ok(ChatStore { chats })
    }
}
