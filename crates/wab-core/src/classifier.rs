//! Inbound text extraction and reply classification. Pure functions, no I/O.

use crate::{domain::InboundMessage, messaging::types::MessageContent};

/// Envelopes nest at most a couple of levels in practice; the bound only
/// protects against pathological payloads.
const MAX_ENVELOPE_DEPTH: usize = 8;

const AFFIRMATIVE_WORDS: &[&str] = &[
    "si", "sí", "sii", "siii", "si.", "sí.", "si!", "sí!", "si,", "sí,",
];

const NEGATIVE_WORDS: &[&str] = &["no", "no.", "no!", "nop", "nel", "noup", "no,"];

/// What to answer to a (post-greeting) message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// "1": meets the requirements, send the enrollment link.
    Eligible,
    /// "2": does not meet the requirements.
    Ineligible,
    /// A written yes/no: ask for the numeric option, then show the menu again.
    ClarifyThenMenu,
    /// Anything else: show the menu.
    Menu,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eligible => "eligible",
            Self::Ineligible => "ineligible",
            Self::ClarifyThenMenu => "clarify_then_menu",
            Self::Menu => "menu",
        }
    }
}

/// Strip envelope layers (ephemeral, view-once, ...) down to the innermost content.
pub fn unwrap_envelopes(content: &MessageContent) -> &MessageContent {
    let mut current = content;
    for _ in 0..MAX_ENVELOPE_DEPTH {
        match current.inner() {
            Some(inner) => current = inner,
            None => break,
        }
    }
    current
}

/// Trimmed text body of `content`, by kind priority: conversation text,
/// extended text, image caption, video caption. Empty when there is none.
pub fn extract_text(content: &MessageContent) -> String {
    let msg = unwrap_envelopes(content);

    let candidates = [
        msg.conversation.as_deref(),
        msg.extended_text_message
            .as_ref()
            .and_then(|m| m.text.as_deref()),
        msg.image_message.as_ref().and_then(|m| m.caption.as_deref()),
        msg.video_message.as_ref().and_then(|m| m.caption.as_deref()),
    ];

    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or_default()
        .to_string()
}

/// Normalized body used for matching: trimmed and lower-cased.
pub fn normalize_body(message: &InboundMessage) -> String {
    message
        .message
        .as_ref()
        .map(extract_text)
        .unwrap_or_default()
        .to_lowercase()
}

/// Map a normalized body to an action. Exact matches only.
pub fn classify(body: &str) -> Action {
    let body = body.trim();
    match body {
        "1" => Action::Eligible,
        "2" => Action::Ineligible,
        _ if is_written_yes_no(body) => Action::ClarifyThenMenu,
        _ => Action::Menu,
    }
}

fn is_written_yes_no(body: &str) -> bool {
    AFFIRMATIVE_WORDS.contains(&body) || NEGATIVE_WORDS.contains(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn content(v: serde_json::Value) -> MessageContent {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn extracts_plain_and_extended_text() {
        assert_eq!(
            extract_text(&content(json!({ "conversation": "  Hola  " }))),
            "Hola"
        );
        assert_eq!(
            extract_text(&content(json!({
                "extendedTextMessage": { "text": "mira https://x.y", "contextInfo": {} }
            }))),
            "mira https://x.y"
        );
    }

    #[test]
    fn conversation_wins_over_captions() {
        let c = content(json!({
            "conversation": "1",
            "imageMessage": { "caption": "2" }
        }));
        assert_eq!(extract_text(&c), "1");
    }

    #[test]
    fn falls_back_to_image_then_video_caption() {
        assert_eq!(
            extract_text(&content(json!({
                "imageMessage": { "caption": "foto", "mimetype": "image/jpeg" },
                "videoMessage": { "caption": "video" }
            }))),
            "foto"
        );
        assert_eq!(
            extract_text(&content(json!({ "videoMessage": { "caption": "video" } }))),
            "video"
        );
        assert_eq!(
            extract_text(&content(json!({
                "imageMessage": { "caption": "   " },
                "videoMessage": { "caption": "video" }
            }))),
            "video"
        );
    }

    #[test]
    fn unwraps_nested_envelopes() {
        let c = content(json!({
            "ephemeralMessage": { "message": {
                "viewOnceMessageV2": { "message": {
                    "imageMessage": { "caption": "Sí" }
                }}
            }}
        }));
        assert_eq!(extract_text(&c), "Sí");

        let c = content(json!({
            "viewOnceMessage": { "message": { "conversation": "2" } }
        }));
        assert_eq!(extract_text(&c), "2");
    }

    #[test]
    fn non_text_content_yields_empty() {
        assert_eq!(
            extract_text(&content(json!({ "stickerMessage": { "url": "x" } }))),
            ""
        );
        assert_eq!(
            extract_text(&content(json!({ "ephemeralMessage": {} }))),
            ""
        );
    }

    #[test]
    fn normalize_lowercases_and_handles_missing_message() {
        let msg: InboundMessage = serde_json::from_value(json!({
            "key": { "remoteJid": "a@s.whatsapp.net", "fromMe": false, "id": "X" },
            "message": { "conversation": "  SIII " }
        }))
        .unwrap();
        assert_eq!(normalize_body(&msg), "siii");

        let empty = InboundMessage::default();
        assert_eq!(normalize_body(&empty), "");
    }

    #[test]
    fn numeric_options() {
        assert_eq!(classify("1"), Action::Eligible);
        assert_eq!(classify("2"), Action::Ineligible);
        assert_eq!(classify(" 1 "), Action::Eligible);
        assert_eq!(classify("1."), Action::Menu);
        assert_eq!(classify("12"), Action::Menu);
        assert_eq!(classify("3"), Action::Menu);
    }

    #[test]
    fn written_yes_no_variants_ask_for_numbers() {
        for word in ["si", "sí", "sii", "siii", "si.", "sí!", "sí,"] {
            assert_eq!(classify(word), Action::ClarifyThenMenu, "{word}");
        }
        for word in ["no", "no.", "no!", "nop", "nel", "noup", "no,"] {
            assert_eq!(classify(word), Action::ClarifyThenMenu, "{word}");
        }
    }

    #[test]
    fn no_substring_or_fuzzy_matching() {
        assert_eq!(classify("si cumplo"), Action::Menu);
        assert_eq!(classify("nope"), Action::Menu);
        assert_eq!(classify("siiii"), Action::Menu);
        assert_eq!(classify(""), Action::Menu);
        assert_eq!(classify("hola"), Action::Menu);
    }

    #[test]
    fn classification_runs_on_normalized_body() {
        let msg = InboundMessage {
            message: Some(MessageContent::text("No.")),
            ..InboundMessage::default()
        };
        assert_eq!(classify(&normalize_body(&msg)), Action::ClarifyThenMenu);
    }
}
