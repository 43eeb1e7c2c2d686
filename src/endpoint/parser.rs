//! Descriptor and subscription blob decoding.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use thiserror::Error;

use crate::endpoint::shadowsocks::{self, Shadowsocks};
use crate::endpoint::vmess::{self, VMess};
use crate::endpoint::{Endpoint, ParseError};

const LENIENT: GeneralPurposeConfig = GeneralPurposeConfig::new()
    .with_decode_padding_mode(DecodePaddingMode::Indifferent)
    .with_decode_allow_trailing_bits(true);

const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, LENIENT);
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, LENIENT);

/// Decode base64 in either alphabet, with or without padding.
pub(crate) fn decode_lenient(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let input = input.trim();
    if input.contains(['-', '_']) {
        URL_SAFE_LENIENT.decode(input)
    } else {
        STANDARD_LENIENT.decode(input)
    }
}

/// Errors that fail a whole subscription batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("decoding subscription blob failed: {0}")]
    Blob(#[source] base64::DecodeError),

    #[error("subscription contained no usable endpoints")]
    NoEndpoints,
}

/// Dispatch a single descriptor on its scheme.
pub(crate) fn parse_descriptor(descriptor: &str) -> Result<Endpoint, ParseError> {
    let descriptor = descriptor.trim();
    let Some((scheme, body)) = descriptor.split_once("://") else {
        return Err(ParseError::UnsupportedScheme(descriptor.to_string()));
    };

    match scheme {
        shadowsocks::SCHEME => Shadowsocks::parse(descriptor, body),
        vmess::SCHEME => VMess::parse(descriptor, body),
        other => Err(ParseError::UnsupportedScheme(other.to_string())),
    }
}

/// Decode a subscription blob: base64 over newline separated descriptors.
///
/// Lines that fail to parse are logged and skipped.
pub fn decode_batch(blob: &[u8]) -> Result<Vec<Endpoint>, BatchError> {
    let compact: String = String::from_utf8_lossy(blob)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    if compact.is_empty() {
        return Err(BatchError::NoEndpoints);
    }

    let decoded = decode_lenient(&compact).map_err(BatchError::Blob)?;
    let text = String::from_utf8_lossy(&decoded);

    let mut endpoints = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_descriptor(line) {
            Ok(ep) => endpoints.push(ep),
            Err(e) => {
                tracing::warn!(line = index + 1, error = %e, "Skipping unparseable descriptor");
            }
        }
    }

    if endpoints.is_empty() {
        return Err(BatchError::NoEndpoints);
    }

    tracing::debug!(count = endpoints.len(), "Decoded subscription endpoints");
    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};

    fn ss(host: &str, tag: &str) -> String {
        format!("ss://{}#{}", URL_SAFE_NO_PAD.encode(format!("aes-256-gcm:pw@{}:8388", host)), tag)
    }

    fn vmess(tag: &str) -> String {
        let json = serde_json::json!({
            "v": "2", "ps": tag, "add": "v.example.com", "port": "443",
            "id": "b831381d-6324-4d53-ad4f-8cda48b30811", "aid": "0", "net": "ws"
        });
        format!("vmess://{}", STANDARD.encode(json.to_string()))
    }

    #[test]
    fn test_unsupported_scheme() {
        let err = parse_descriptor("trojan://password@host:443").unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedScheme(s) if s == "trojan"));

        let err = parse_descriptor("no scheme at all").unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedScheme(_)));
    }

    #[test]
    fn test_decode_batch_skips_bad_lines() {
        let lines = [ss("1.1.1.1", "A"), "garbage-line".to_string(), String::new(), vmess("B"), "ss://%%%".to_string()];
        let blob = STANDARD.encode(lines.join("\r\n"));

        let endpoints = decode_batch(blob.as_bytes()).unwrap();
        let tags: Vec<_> = endpoints.iter().map(|e| e.tag()).collect();
        assert_eq!(tags, vec!["A", "B"]);
    }

    #[test]
    fn test_decode_batch_keeps_order_and_duplicates() {
        let lines = [ss("2.2.2.2", "B"), ss("1.1.1.1", "A"), ss("2.2.2.2", "B")];
        let blob = STANDARD.encode(lines.join("\n"));
        let endpoints = decode_batch(blob.as_bytes()).unwrap();
        let forms: Vec<_> = endpoints.iter().map(|e| e.canonical_form().to_string()).collect();
        assert_eq!(forms, lines.to_vec());
    }

    #[test]
    fn test_decode_batch_tolerates_wrapped_blob() {
        let blob = STANDARD.encode(format!("{}\n{}\n", ss("1.1.1.1", "A"), vmess("B")));
        let wrapped: String = blob
            .as_bytes()
            .chunks(20)
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(decode_batch(wrapped.as_bytes()).unwrap().len(), 2);
    }

    #[test]
    fn test_decode_batch_no_endpoints() {
        let blob = STANDARD.encode("nothing useful\nhere either\n");
        assert!(matches!(decode_batch(blob.as_bytes()), Err(BatchError::NoEndpoints)));
        assert!(matches!(decode_batch(b"  \n"), Err(BatchError::NoEndpoints)));
    }

    #[test]
    fn test_decode_batch_rejects_non_base64() {
        assert!(matches!(decode_batch(b"!!not base64!!"), Err(BatchError::Blob(_))));
    }
}
