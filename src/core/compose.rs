//! Message composition
//!
//! Normalizes heterogeneous input (typed text plus staged image data URLs)
//! into [`MessageContent`], respecting the capability of the model that will
//! receive it.

use std::error::Error as StdError;
use std::fmt;

use crate::core::message::{ContentPart, MessageContent};
use crate::core::models::ModelSpec;

/// Nothing sendable was composed; the caller must not issue a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyMessage;

impl fmt::Display for EmptyMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "message has no text and no usable attachments")
    }
}

impl StdError for EmptyMessage {}

/// Build normalized message content from text and staged images.
///
/// Images are silently dropped when the model lacks image support; they can
/// end up staged on such a model only by being attached before a model
/// switch. A text part, if any, always precedes the image parts, and image
/// order is preserved. The result collapses to bare text when it would be a
/// single text part.
pub fn compose(
    text: &str,
    images: &[String],
    model: &ModelSpec,
) -> Result<MessageContent, EmptyMessage> {
    let text = text.trim();

    let mut parts = Vec::new();
    if !text.is_empty() {
        parts.push(ContentPart::text(text));
    }
    if model.supports_images {
        for url in images {
            parts.push(ContentPart::image(url.clone()));
        }
    }

    if parts.is_empty() {
        return Err(EmptyMessage);
    }
    if parts.len() == 1 {
        if let ContentPart::Text { text } = &parts[0] {
            return Ok(MessageContent::Text(text.clone()));
        }
    }
    Ok(MessageContent::Parts(parts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models;

    fn image_model() -> ModelSpec {
        models::lookup("openai/gpt-4o-mini").unwrap()
    }

    fn text_model() -> ModelSpec {
        models::lookup("anthropic/claude-3-5-haiku").unwrap()
    }

    #[test]
    fn lone_text_collapses_to_bare_string() {
        let content = compose("hi", &[], &image_model()).unwrap();
        assert_eq!(content, MessageContent::Text("hi".to_string()));
    }

    #[test]
    fn text_plus_image_builds_ordered_parts() {
        let images = vec!["data:image/png;base64,AAAA".to_string()];
        let content = compose("hi", &images, &image_model()).unwrap();

        match content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts.len(), 2);
                assert_eq!(parts[0], ContentPart::text("hi"));
                assert_eq!(parts[1], ContentPart::image("data:image/png;base64,AAAA"));
            }
            other => panic!("expected parts, got {other:?}"),
        }
    }

    #[test]
    fn image_order_is_preserved() {
        let images = vec![
            "data:image/png;base64,ONE".to_string(),
            "data:image/png;base64,TWO".to_string(),
        ];
        let content = compose("", &images, &image_model()).unwrap();

        match content {
            MessageContent::Parts(parts) => {
                assert_eq!(parts[0], ContentPart::image("data:image/png;base64,ONE"));
                assert_eq!(parts[1], ContentPart::image("data:image/png;base64,TWO"));
            }
            other => panic!("expected parts, got {other:?}"),
        }
    }

    #[test]
    fn images_are_dropped_for_text_only_models() {
        let images = vec!["data:image/png;base64,AAAA".to_string()];
        let content = compose("hi", &images, &text_model()).unwrap();
        assert_eq!(content, MessageContent::Text("hi".to_string()));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(compose("", &[], &image_model()), Err(EmptyMessage));
        assert_eq!(compose("   ", &[], &image_model()), Err(EmptyMessage));
    }

    #[test]
    fn dropped_images_alone_are_an_empty_message() {
        let images = vec!["data:image/png;base64,AAAA".to_string()];
        assert_eq!(compose("", &images, &text_model()), Err(EmptyMessage));
    }

    #[test]
    fn lone_image_stays_a_part_list() {
        let images = vec!["data:image/png;base64,AAAA".to_string()];
        let content = compose("", &images, &image_model()).unwrap();
        assert!(matches!(content, MessageContent::Parts(ref parts) if parts.len() == 1));
    }
}
