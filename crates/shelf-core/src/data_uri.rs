//! `data:` URIs and base64 payloads crossing the host boundary.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use log::debug;
use percent_encoding::percent_decode_str;
use thiserror::Error;

/// Mirrors `atob`: padding is optional and interior whitespace is skipped by the caller.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const DEFAULT_MEDIA_TYPE: &str = "text/plain";

#[derive(Debug, Error, PartialEq)]
pub enum DataUriError {
    #[error("not a data URI")]
    MissingScheme,
    #[error("data URI has no `,` separator")]
    MissingSeparator,
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// A decoded `data:` URI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataUri {
    mime: String,
    data: Vec<u8>,
}

impl DataUri {
    pub fn parse(uri: &str) -> Result<Self, DataUriError> {
        let (header, payload) = split(uri)?;
        let mut params = header.split(';');
        let mime = params
            .next()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MEDIA_TYPE)
            .to_ascii_lowercase();
        let is_base64 = params.any(|p| p.trim().eq_ignore_ascii_case("base64"));

        let data = if is_base64 {
            decode_lenient(payload)?
        } else {
            percent_decode_str(payload).collect()
        };
        Ok(Self { mime, data })
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Decodes a base64 payload handed over by the host.
///
/// Accepts bare base64 (with or without padding, whitespace anywhere) as well as a full
/// `data:` URI, since hosts often forward `FileReader` output unchanged.
pub fn decode_base64_payload(input: &str) -> Result<Vec<u8>, DataUriError> {
    let trimmed = input.trim();
    if has_data_scheme(trimmed) {
        let uri = DataUri::parse(trimmed)?;
        debug!("event=payload_decode form=data_uri media_type={}", uri.mime());
        return Ok(uri.into_data());
    }
    decode_lenient(trimmed)
}

fn decode_lenient(payload: &str) -> Result<Vec<u8>, DataUriError> {
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    Ok(LENIENT.decode(compact)?)
}

fn has_data_scheme(s: &str) -> bool {
    s.get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

fn split(uri: &str) -> Result<(&str, &str), DataUriError> {
    let uri = uri.trim();
    if !has_data_scheme(uri) {
        return Err(DataUriError::MissingScheme);
    }
    uri[5..]
        .split_once(',')
        .ok_or(DataUriError::MissingSeparator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_base64_image_uri() {
        let uri = DataUri::parse("data:IMAGE/JPEG;base64,/9j/4A==").unwrap();
        assert_eq!(uri.mime(), "image/jpeg");
        assert_eq!(uri.into_data(), vec![0xFF, 0xD8, 0xFF, 0xE0]);
    }

    #[test]
    fn parses_percent_encoded_uri() {
        let uri = DataUri::parse("data:,a%20b%E2%9C%93").unwrap();
        assert_eq!(uri.mime(), "text/plain");
        assert_eq!(uri.into_data(), "a b\u{2713}".as_bytes());

        // Stray `%` sequences pass through as literal bytes.
        let uri = DataUri::parse("data:;charset=utf-8,100%zz%4").unwrap();
        assert_eq!(uri.mime(), "text/plain");
        assert_eq!(uri.into_data(), b"100%zz%4");
    }

    #[test]
    fn rejects_non_data_uris() {
        assert_eq!(DataUri::parse("https://x/y.png"), Err(DataUriError::MissingScheme));
        assert_eq!(DataUri::parse("data:image/png;base64"), Err(DataUriError::MissingSeparator));
    }

    #[test]
    fn payload_decoding_is_lenient_like_atob() {
        assert_eq!(decode_base64_payload("  aGVsbG8=\n").unwrap(), b"hello");
        assert_eq!(decode_base64_payload("aGVsbG8").unwrap(), b"hello");
        assert_eq!(decode_base64_payload("aGVs\r\nbG8=").unwrap(), b"hello");
        assert_eq!(
            decode_base64_payload("data:application/octet-stream;base64,aGVsbG8=").unwrap(),
            b"hello"
        );
        assert_eq!(decode_base64_payload("data:,he%6Clo").unwrap(), b"hello");
        assert!(matches!(
            decode_base64_payload("not base64!"),
            Err(DataUriError::Base64(_))
        ));
    }
}
