//! Decoding of result payloads.
//!
//! In legacy mode the payload is a JSON document; in the current protocol
//! it is handed to the presenter untouched and decoded there. When a JSON
//! document is available, [`Guidance`] picks out the two fields a
//! presentation layer cares about: the spoken instruction and the latest
//! guidance image.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use serde_json::Value;

use crate::error::ClientError;

/// Key of the instruction text inside a result document.
pub const JSON_KEY_SPEECH: &str = "speech";
/// Key of the animation frame list inside a result document.
pub const JSON_KEY_ANIMATION: &str = "animation";

/// A result payload after format-specific parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    /// Legacy mode: the payload parsed as JSON.
    Json(Value),
    /// Current protocol: raw bytes, decoded by the consumer.
    Raw(Bytes),
}

/// Parse a payload according to the protocol variant.
pub fn parse(data: Bytes, legacy: bool) -> Result<ParsedResponse, ClientError> {
    if legacy {
        Ok(ParsedResponse::Json(serde_json::from_slice(&data)?))
    } else {
        Ok(ParsedResponse::Raw(data))
    }
}

// ── Guidance ─────────────────────────────────────────────────────

/// User-facing content extracted from a result document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Guidance {
    /// Instruction to show or speak, if non-empty.
    pub instruction: Option<String>,
    /// Encoded image (typically JPEG) from the last animation step.
    pub image: Option<Vec<u8>>,
}

impl Guidance {
    /// Extract guidance from a result document.
    ///
    /// `animation` is a list of `[base64_image, duration]` steps; only the
    /// first element of the final step is used.
    pub fn from_value(doc: &Value) -> Result<Self, ClientError> {
        let instruction = doc
            .get(JSON_KEY_SPEECH)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned);

        let encoded = doc
            .get(JSON_KEY_ANIMATION)
            .and_then(Value::as_array)
            .and_then(|steps| steps.last())
            .and_then(Value::as_array)
            .and_then(|step| step.first())
            .and_then(Value::as_str);

        let image = encoded
            .map(|b64| BASE64.decode(b64))
            .transpose()?
            .filter(|img| !img.is_empty());

        Ok(Self { instruction, image })
    }

    /// Guidance for a parsed payload; raw payloads carry none.
    pub fn from_response(parsed: &ParsedResponse) -> Result<Self, ClientError> {
        match parsed {
            ParsedResponse::Json(doc) => Self::from_value(doc),
            ParsedResponse::Raw(_) => Ok(Self::default()),
        }
    }

    /// Whether there is nothing to present.
    pub fn is_empty(&self) -> bool {
        self.instruction.is_none() && self.image.is_none()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_payload_parses_as_json() {
        let parsed = parse(Bytes::from_static(br#"{"speech":"hi"}"#), true).unwrap();
        assert_eq!(parsed, ParsedResponse::Json(json!({"speech": "hi"})));
    }

    #[test]
    fn legacy_payload_must_be_json() {
        assert!(matches!(
            parse(Bytes::from_static(b"\xff\x00"), true),
            Err(ClientError::Json(_))
        ));
    }

    #[test]
    fn current_payload_passes_through() {
        let data = Bytes::from_static(b"\x00\x01binary");
        assert_eq!(parse(data.clone(), false).unwrap(), ParsedResponse::Raw(data));
    }

    #[test]
    fn extracts_instruction_and_last_image() {
        let first = BASE64.encode(b"first");
        let last = BASE64.encode(b"last");
        let doc = json!({
            "speech": "Put the lid on.",
            "animation": [[first, 100], [last, 100]],
        });
        let g = Guidance::from_value(&doc).unwrap();
        assert_eq!(g.instruction.as_deref(), Some("Put the lid on."));
        assert_eq!(g.image.as_deref(), Some(&b"last"[..]));
    }

    #[test]
    fn empty_fields_yield_nothing() {
        let doc = json!({"speech": "", "animation": [[]]});
        let g = Guidance::from_value(&doc).unwrap();
        assert!(g.is_empty());

        let g = Guidance::from_value(&json!({"status": "nothing"})).unwrap();
        assert!(g.is_empty());
    }

    #[test]
    fn bad_base64_is_an_error() {
        let doc = json!({"animation": [["***not base64***"]]});
        assert!(matches!(
            Guidance::from_value(&doc),
            Err(ClientError::Base64(_))
        ));
    }

    #[test]
    fn raw_responses_have_no_guidance() {
        let parsed = ParsedResponse::Raw(Bytes::from_static(b"{}"));
        assert!(Guidance::from_response(&parsed).unwrap().is_empty());
    }
}
