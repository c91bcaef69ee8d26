//! `tokio_util` codecs for both directions of a session.
//!
//! - [`FrameCodec`] encodes the outbound video stream: JSON frame header
//!   immediately followed by the encoded image, no length prefix.
//! - [`ResponseCodec`] decodes the inbound result stream:
//!   `[u32 BE header_size][header JSON][payload]`.
//!
//! The response decoder is incremental; it keeps the parsed header across
//! calls while the payload is still arriving. Any framing fault is fatal:
//! a byte stream cannot be resynchronised after a bad length.

use bytes::{Buf, Bytes, BytesMut};
use serde_json::{Map, Value};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ClientError;
use crate::protocol::{
    FrameHeader, JSON_KEY_DATA_SIZE, JSON_KEY_RESULT, OutboundFrame, Response,
};

/// Size of the big-endian header length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Largest response header accepted.
pub const MAX_HEADER_SIZE: usize = 1024 * 1024;

/// Largest trailing payload accepted.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

// ── FrameCodec ───────────────────────────────────────────────────

/// Encoder for the video stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl Encoder<OutboundFrame> for FrameCodec {
    type Error = ClientError;

    fn encode(&mut self, item: OutboundFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let header = FrameHeader::new(item.frame_id).to_bytes()?;
        dst.reserve(header.len() + item.payload.len());
        // Header strictly before payload; the service delimits the two.
        dst.extend_from_slice(&header);
        dst.extend_from_slice(&item.payload);
        Ok(())
    }
}

/// Raw bytes, written as-is.
impl Encoder<Bytes> for FrameCodec {
    type Error = ClientError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&item);
        Ok(())
    }
}

// ── ResponseCodec ────────────────────────────────────────────────

#[derive(Debug)]
enum DecodeState {
    /// Waiting for a length prefix and header.
    Header,
    /// Header parsed; waiting for `size` payload bytes.
    Payload { header: Bytes, size: usize },
}

/// Decoder for the result stream.
///
/// The decoder itself has no notion of time: a length prefix or
/// `data_size` within the limits, followed by silence on an open socket,
/// leaves it waiting for the rest of the frame indefinitely. The receive
/// unit can bound that wait with a per-frame deadline.
#[derive(Debug)]
pub struct ResponseCodec {
    legacy: bool,
    state: DecodeState,
    max_header: usize,
    max_payload: usize,
}

impl ResponseCodec {
    /// `legacy` selects the inline-`result` variant of the protocol.
    pub fn new(legacy: bool) -> Self {
        Self {
            legacy,
            state: DecodeState::Header,
            max_header: MAX_HEADER_SIZE,
            max_payload: MAX_PAYLOAD_SIZE,
        }
    }

    /// Override the size limits.
    pub fn with_limits(mut self, max_header: usize, max_payload: usize) -> Self {
        self.max_header = max_header;
        self.max_payload = max_payload;
        self
    }

    /// Whether a header has been parsed and its payload is still arriving.
    pub fn is_mid_frame(&self) -> bool {
        matches!(self.state, DecodeState::Payload { .. })
    }

    fn decode_header(&mut self, src: &mut BytesMut) -> Result<Option<Response>, ClientError> {
        if src.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }
        let header_size = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if header_size > self.max_header {
            return Err(ClientError::HeaderTooLarge {
                size: header_size,
                max: self.max_header,
            });
        }
        let frame_len = LENGTH_PREFIX_SIZE + header_size;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_SIZE);
        let header = src.split_to(header_size).freeze();
        let mut fields = parse_header(&header)?;

        if self.legacy {
            let result = fields
                .remove(JSON_KEY_RESULT)
                .ok_or(ClientError::MissingField(JSON_KEY_RESULT))?;
            let payload = match result {
                Value::String(s) => Bytes::from(s),
                other => Bytes::from(serde_json::to_vec(&other)?),
            };
            let header = Bytes::from(serde_json::to_vec(&fields)?);
            return Ok(Some(Response { header, payload }));
        }

        let size = fields
            .get(JSON_KEY_DATA_SIZE)
            .ok_or(ClientError::MissingField(JSON_KEY_DATA_SIZE))?
            .as_u64()
            .ok_or(ClientError::InvalidField {
                field: JSON_KEY_DATA_SIZE,
                reason: "expected a non-negative integer",
            })?;
        if size > self.max_payload as u64 {
            return Err(ClientError::PayloadTooLarge {
                size,
                max: self.max_payload,
            });
        }
        self.state = DecodeState::Payload {
            header,
            size: size as usize,
        };
        self.decode_payload(src)
    }

    fn decode_payload(&mut self, src: &mut BytesMut) -> Result<Option<Response>, ClientError> {
        match std::mem::replace(&mut self.state, DecodeState::Header) {
            DecodeState::Payload { header, size } if src.len() >= size => {
                let payload = src.split_to(size).freeze();
                Ok(Some(Response { header, payload }))
            }
            DecodeState::Payload { header, size } => {
                src.reserve(size - src.len());
                self.state = DecodeState::Payload { header, size };
                Ok(None)
            }
            DecodeState::Header => Ok(None),
        }
    }
}

impl Decoder for ResponseCodec {
    type Item = Response;
    type Error = ClientError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.state {
            DecodeState::Header => self.decode_header(src),
            DecodeState::Payload { .. } => self.decode_payload(src),
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(response) => Ok(Some(response)),
            None if buf.is_empty() && matches!(self.state, DecodeState::Header) => Ok(None),
            None => Err(ClientError::TruncatedFrame {
                buffered: buf.len(),
            }),
        }
    }
}

fn parse_header(header: &[u8]) -> Result<Map<String, Value>, ClientError> {
    match serde_json::from_slice(header)? {
        Value::Object(map) => Ok(map),
        _ => Err(ClientError::HeaderNotObject),
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire(header: &Value, payload: &[u8]) -> BytesMut {
        let header = serde_json::to_vec(header).unwrap();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&(header.len() as u32).to_be_bytes());
        buf.extend_from_slice(&header);
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn frame_codec_writes_header_then_payload() {
        let mut codec = FrameCodec;
        let mut dst = BytesMut::new();
        codec
            .encode(
                OutboundFrame {
                    frame_id: 3,
                    payload: Bytes::from_static(b"\xFF\xD8jpeg"),
                },
                &mut dst,
            )
            .unwrap();
        assert_eq!(&dst[..], b"{\"frame_id\":\"3\"}\xFF\xD8jpeg");
    }

    #[test]
    fn decodes_sized_payloads() {
        for size in [0usize, 1, 4096] {
            let payload = vec![0x5A; size];
            let header = json!({"frame_id": "1", "status": "success", "data_size": size});
            let mut buf = wire(&header, &payload);

            let response = ResponseCodec::new(false).decode(&mut buf).unwrap().unwrap();
            let fields = response.header_json().unwrap();
            assert_eq!(Value::Object(fields), header);
            assert_eq!(&response.payload[..], &payload[..]);
            assert!(buf.is_empty());
        }
    }

    #[test]
    fn decodes_byte_by_byte() {
        let header = json!({"data_size": 5});
        let all = wire(&header, b"hello");
        let mut codec = ResponseCodec::new(false);
        let mut buf = BytesMut::new();

        let mut decoded = None;
        for (i, byte) in all.iter().enumerate() {
            buf.extend_from_slice(&[*byte]);
            match codec.decode(&mut buf).unwrap() {
                Some(r) => {
                    assert_eq!(i, all.len() - 1, "decoded before the last byte");
                    decoded = Some(r);
                }
                None => assert!(i < all.len() - 1),
            }
        }
        assert_eq!(&decoded.unwrap().payload[..], b"hello");
    }

    #[test]
    fn decodes_back_to_back_responses() {
        let mut buf = wire(&json!({"data_size": 2}), b"ab");
        buf.extend_from_slice(&wire(&json!({"data_size": 3}), b"cde"));
        let mut codec = ResponseCodec::new(false);
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap().payload[..], b"ab");
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap().payload[..], b"cde");
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn legacy_extracts_result() {
        let header = json!({
            "frame_id": "12",
            "engine_id": "lego",
            "result": "{\"speech\":\"done\"}",
        });
        let mut buf = wire(&header, b"");
        let response = ResponseCodec::new(true).decode(&mut buf).unwrap().unwrap();

        assert_eq!(&response.payload[..], br#"{"speech":"done"}"#);
        let fields = response.header_json().unwrap();
        assert!(!fields.contains_key("result"));
        assert_eq!(fields["frame_id"], "12");
        assert_eq!(fields["engine_id"], "lego");
    }

    #[test]
    fn legacy_non_string_result_is_reserialized() {
        let mut buf = wire(&json!({"result": {"speech": "ok"}}), b"");
        let response = ResponseCodec::new(true).decode(&mut buf).unwrap().unwrap();
        let doc: Value = serde_json::from_slice(&response.payload).unwrap();
        assert_eq!(doc, json!({"speech": "ok"}));
    }

    #[test]
    fn legacy_requires_result() {
        let mut buf = wire(&json!({"frame_id": "1"}), b"");
        let err = ResponseCodec::new(true).decode(&mut buf).unwrap_err();
        assert!(matches!(err, ClientError::MissingField("result")));
    }

    #[test]
    fn missing_data_size_is_fatal() {
        let mut buf = wire(&json!({"frame_id": "1"}), b"");
        let err = ResponseCodec::new(false).decode(&mut buf).unwrap_err();
        assert!(matches!(err, ClientError::MissingField("data_size")));
    }

    #[test]
    fn negative_data_size_is_fatal() {
        let mut buf = wire(&json!({"data_size": -4}), b"");
        let err = ResponseCodec::new(false).decode(&mut buf).unwrap_err();
        assert!(matches!(err, ClientError::InvalidField { .. }));
    }

    #[test]
    fn garbage_header_is_fatal() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&4u32.to_be_bytes());
        buf.extend_from_slice(b"nope");
        assert!(matches!(
            ResponseCodec::new(false).decode(&mut buf),
            Err(ClientError::Json(_))
        ));
    }

    #[test]
    fn oversized_prefix_is_rejected_early() {
        let mut buf = BytesMut::from(&u32::MAX.to_be_bytes()[..]);
        let err = ResponseCodec::new(false).decode(&mut buf).unwrap_err();
        assert!(matches!(err, ClientError::HeaderTooLarge { .. }));

        let mut buf = wire(&json!({"data_size": 1000}), b"");
        let err = ResponseCodec::new(false)
            .with_limits(MAX_HEADER_SIZE, 10)
            .decode(&mut buf)
            .unwrap_err();
        assert!(matches!(err, ClientError::PayloadTooLarge { size: 1000, .. }));
    }

    #[test]
    fn eof_mid_frame_is_truncation() {
        // Prefix promises 100 header bytes, only 10 arrive.
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&100u32.to_be_bytes());
        buf.extend_from_slice(b"{\"data_siz");
        let mut codec = ResponseCodec::new(false);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(matches!(
            codec.decode_eof(&mut buf),
            Err(ClientError::TruncatedFrame { buffered: 14 })
        ));
    }

    #[test]
    fn eof_while_awaiting_payload_is_truncation() {
        let mut buf = wire(&json!({"data_size": 8}), b"");
        let mut codec = ResponseCodec::new(false);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
        assert!(matches!(
            codec.decode_eof(&mut buf),
            Err(ClientError::TruncatedFrame { buffered: 0 })
        ));
    }

    #[test]
    fn tracks_frames_awaiting_payload() {
        let mut codec = ResponseCodec::new(false);
        assert!(!codec.is_mid_frame());

        let mut buf = wire(&json!({"data_size": 3}), b"ab");
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(codec.is_mid_frame());

        buf.extend_from_slice(b"c");
        assert!(codec.decode(&mut buf).unwrap().is_some());
        assert!(!codec.is_mid_frame());
    }

    #[test]
    fn clean_eof_between_frames() {
        let mut codec = ResponseCodec::new(false);
        assert!(codec.decode_eof(&mut BytesMut::new()).unwrap().is_none());
    }
}
