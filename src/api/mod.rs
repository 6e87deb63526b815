//! Wire payloads for the chat-completion endpoint.

use serde::{Deserialize, Serialize};

use crate::core::constants::APP_TITLE;
use crate::core::message::{Message, MessageContent};

#[derive(Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub temperature: f64,
    pub max_tokens: u32,
    pub extra_headers: ExtraHeaders,
}

/// Extra headers the API expects inside the JSON body rather than as HTTP
/// headers.
#[derive(Serialize)]
pub struct ExtraHeaders {
    #[serde(rename = "X-Title")]
    pub x_title: &'static str,
}

impl Default for ExtraHeaders {
    fn default() -> Self {
        Self { x_title: APP_TITLE }
    }
}

#[derive(Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatResponseChoice>,
}

#[derive(Deserialize)]
pub struct ChatResponseChoice {
    pub message: ChatResponseMessage,
}

#[derive(Deserialize)]
pub struct ChatResponseMessage {
    pub content: MessageContent,
}

pub mod client;

pub use client::{ApiClient, ApiError};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::{ContentPart, Message};

    #[test]
    fn request_body_matches_the_wire_contract() {
        let messages = vec![
            Message::user("hello"),
            Message::user(MessageContent::Parts(vec![
                ContentPart::text("look"),
                ContentPart::image("data:image/png;base64,AAAA"),
            ])),
        ];
        let request = ChatRequest {
            model: "openai/gpt-4o-mini",
            messages: &messages,
            temperature: 0.7,
            max_tokens: 3000,
            extra_headers: ExtraHeaders::default(),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "openai/gpt-4o-mini");
        assert_eq!(value["temperature"], 0.7);
        assert_eq!(value["max_tokens"], 3000);
        assert_eq!(value["extra_headers"]["X-Title"], "Causerie");

        // Bare text goes out as a string, multimodal content as parts.
        assert_eq!(value["messages"][0]["content"], "hello");
        assert_eq!(value["messages"][1]["content"][1]["type"], "image_url");
    }

    #[test]
    fn response_content_accepts_both_shapes() {
        let text: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"hi there"}}]}"#,
        )
        .unwrap();
        assert_eq!(
            text.choices[0].message.content,
            MessageContent::Text("hi there".to_string())
        );

        let parts: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":[{"type":"text","text":"hi"}]}}]}"#,
        )
        .unwrap();
        assert!(matches!(
            parts.choices[0].message.content,
            MessageContent::Parts(_)
        ));
    }
}
