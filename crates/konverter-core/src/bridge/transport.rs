//! Text-safe payload encoding.
//!
//! Some worker transports only carry strings. Converted bytes then travel as
//! standard base64 and are decoded back on the receiving side.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Encode bytes for a string-only transport.
pub fn encode_payload(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode a payload produced by [`encode_payload`].
///
/// A `data:` URL prefix (`data:<mime>;base64,`) is accepted and stripped.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, TransportError> {
    let body = match payload.split_once(";base64,") {
        Some((prefix, body)) if prefix.starts_with("data:") => body,
        _ => payload,
    };
    Ok(STANDARD.decode(body.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_value() {
        assert_eq!(encode_payload(b"RIFF"), "UklGRg==");
    }

    #[test]
    fn test_decode_plain_and_data_url() {
        assert_eq!(decode_payload("UklGRg==").unwrap(), b"RIFF");
        assert_eq!(
            decode_payload("data:image/webp;base64,UklGRg==").unwrap(),
            b"RIFF"
        );
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_payload("not base64!"),
            Err(TransportError::Base64(_))
        ));
    }
}
