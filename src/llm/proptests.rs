//! Property-based tests for the Gemini translation layer
//!
//! - Message translation keeps every message, in order, with its role
//! - Chunk parsing joins all non-thought text parts
//! - Only `STOP` and `MAX_TOKENS` end a reply normally; other reasons keep
//!   the chunk text and report the stop

use super::gemini::{parse_chunk, translate_request};
use super::types::{LlmMessage, MessageRole};
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// Strategies
// ============================================================================

fn arb_role() -> impl Strategy<Value = MessageRole> {
    prop_oneof![Just(MessageRole::User), Just(MessageRole::Assistant)]
}

fn arb_message() -> impl Strategy<Value = LlmMessage> {
    (arb_role(), "[a-zA-Z0-9 _.!?,\"\n]{0,80}").prop_map(|(role, text)| LlmMessage { role, text })
}

/// A part: text plus whether it is a thought summary
fn arb_part() -> impl Strategy<Value = (String, bool)> {
    ("[a-zA-Z0-9 _.!?,*>\n]{0,40}", prop::bool::weighted(0.2))
}

fn arb_bad_finish_reason() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("SAFETY"),
        Just("RECITATION"),
        Just("BLOCKLIST"),
        Just("PROHIBITED_CONTENT"),
        Just("OTHER"),
    ]
}

proptest! {
    #[test]
    fn prop_translation_preserves_messages(
        system in "[a-zA-Z .]{0,40}",
        messages in proptest::collection::vec(arb_message(), 0..10)
    ) {
        let request = translate_request(&system, &messages);
        prop_assert_eq!(request.contents.len(), messages.len());
        prop_assert_eq!(request.system_instruction.is_some(), !system.is_empty());

        for (content, message) in request.contents.iter().zip(&messages) {
            let expected_role = match message.role {
                MessageRole::User => "user",
                MessageRole::Assistant => "model",
            };
            prop_assert_eq!(content.role.as_deref(), Some(expected_role));
            prop_assert_eq!(content.parts.len(), 1);
            prop_assert_eq!(content.parts[0].text.as_deref(), Some(message.text.as_str()));
        }
    }

    #[test]
    fn prop_chunk_text_is_joined_parts(parts in proptest::collection::vec(arb_part(), 0..6)) {
        let json_parts: Vec<_> = parts
            .iter()
            .map(|(text, thought)| if *thought {
                json!({ "text": text, "thought": true })
            } else {
                json!({ "text": text })
            })
            .collect();
        let data = json!({
            "candidates": [{ "content": { "role": "model", "parts": json_parts } }]
        })
        .to_string();

        let chunk = parse_chunk(&data).unwrap();
        let expected: String = parts
            .iter()
            .filter(|(_, thought)| !thought)
            .map(|(text, _)| text.as_str())
            .collect();
        prop_assert_eq!(chunk.text, expected);
        prop_assert!(!chunk.finished);
    }

    #[test]
    fn prop_abnormal_finish_keeps_text(reason in arb_bad_finish_reason(), text in "[a-z ]{0,20}") {
        let data = json!({
            "candidates": [{
                "content": { "parts": [{ "text": text }] },
                "finishReason": reason
            }]
        })
        .to_string();
        let chunk = parse_chunk(&data).unwrap();
        prop_assert_eq!(chunk.stopped.as_deref(), Some(reason));
        prop_assert!(!chunk.finished);
        prop_assert_eq!(chunk.text, text);
    }

    #[test]
    fn prop_normal_finish_keeps_text(finish_on_limit in any::<bool>(), text in "[a-z ]{0,20}") {
        let reason = if finish_on_limit { "MAX_TOKENS" } else { "STOP" };
        let data = json!({
            "candidates": [{
                "content": { "parts": [{ "text": text }] },
                "finishReason": reason
            }]
        })
        .to_string();
        let chunk = parse_chunk(&data).unwrap();
        prop_assert!(chunk.finished);
        prop_assert_eq!(chunk.text, text);
    }
}
