//! Text codec for the two-field command datagram
//!
//! Requests are plain text:
//! ```text
//! <left><delimiter><right>[anything]
//! ```
//!
//! The payload is treated as a C string: it ends at the first NUL byte.
//! Every byte of the delimiter is a separator and empty segments are skipped,
//! so `"10,,20"` and `",10,20"` both yield two tokens. Only the first two
//! tokens are inspected; the remainder is ignored.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::Command;

/// Errors that can occur while decoding a command datagram
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Received message is in wrong format")]
    MalformedMessage,

    #[error("Invalid numeric token: {0:?}")]
    InvalidNumber(String),
}

/// How numeric tokens are converted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberParsing {
    /// Longest valid numeric prefix, anything else reads as zero
    #[default]
    Lenient,
    /// The whole token (minus surrounding whitespace) must be an integer
    Strict,
}

/// Decode a command with lenient number parsing
pub fn decode(bytes: &[u8], delimiter: &[u8]) -> Result<Command, DecodeError> {
    decode_with(bytes, delimiter, NumberParsing::Lenient)
}

/// Decode a command with the given number parsing mode
pub fn decode_with(
    bytes: &[u8],
    delimiter: &[u8],
    parsing: NumberParsing,
) -> Result<Command, DecodeError> {
    let payload = match bytes.iter().position(|&b| b == 0) {
        Some(end) => &bytes[..end],
        None => bytes,
    };

    let mut tokens = payload
        .split(|b| delimiter.contains(b))
        .filter(|token| !token.is_empty());

    let left = tokens.next().ok_or(DecodeError::MalformedMessage)?;
    let right = tokens.next().ok_or(DecodeError::MalformedMessage)?;

    Ok(Command::new(
        parse_number(left, parsing)?,
        parse_number(right, parsing)?,
    ))
}

/// Encode a command into request text
pub fn encode(command: &Command, delimiter: &[u8]) -> Bytes {
    let left = command.left_speed.to_string();
    let right = command.right_speed.to_string();

    let mut buf = BytesMut::with_capacity(left.len() + delimiter.len() + right.len());
    buf.put_slice(left.as_bytes());
    buf.put_slice(delimiter);
    buf.put_slice(right.as_bytes());
    buf.freeze()
}

fn parse_number(token: &[u8], parsing: NumberParsing) -> Result<i32, DecodeError> {
    match parsing {
        NumberParsing::Lenient => Ok(parse_lenient(token)),
        NumberParsing::Strict => parse_strict(token),
    }
}

/// Whitespace as the C locale sees it
fn is_c_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}

/// Leading whitespace, optional sign, digits. Saturates at the `i32` range.
fn parse_lenient(token: &[u8]) -> i32 {
    let start = token
        .iter()
        .position(|&b| !is_c_space(b))
        .unwrap_or(token.len());
    let mut rest = &token[start..];

    let negative = match rest.first() {
        Some(b'-') => {
            rest = &rest[1..];
            true
        }
        Some(b'+') => {
            rest = &rest[1..];
            false
        }
        _ => false,
    };

    let limit = i64::from(i32::MAX) + 1;
    let magnitude = rest
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .fold(0i64, |acc, &b| (acc * 10 + i64::from(b - b'0')).min(limit));

    let value = if negative { -magnitude } else { magnitude };
    value.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

fn parse_strict(token: &[u8]) -> Result<i32, DecodeError> {
    let invalid = || DecodeError::InvalidNumber(String::from_utf8_lossy(token).into_owned());

    let start = token.iter().position(|&b| !is_c_space(b)).ok_or_else(invalid)?;
    let end = token
        .iter()
        .rposition(|&b| !is_c_space(b))
        .map_or(start, |i| i + 1);

    std::str::from_utf8(&token[start..end])
        .ok()
        .and_then(|text| text.parse::<i32>().ok())
        .ok_or_else(invalid)
}

/// Decoder bound to one delimiter and parsing mode
#[derive(Debug, Clone)]
pub struct CommandDecoder {
    delimiter: Bytes,
    parsing: NumberParsing,
}

impl Default for CommandDecoder {
    fn default() -> Self {
        Self::new(
            Bytes::from_static(crate::protocol::COMMAND_DELIMITER),
            NumberParsing::default(),
        )
    }
}

impl CommandDecoder {
    /// Create a decoder for the given delimiter and parsing mode
    pub fn new(delimiter: impl Into<Bytes>, parsing: NumberParsing) -> Self {
        Self {
            delimiter: delimiter.into(),
            parsing,
        }
    }

    /// Decode one datagram payload
    pub fn decode(&self, bytes: &[u8]) -> Result<Command, DecodeError> {
        decode_with(bytes, &self.delimiter, self.parsing)
    }

    pub fn delimiter(&self) -> &[u8] {
        &self.delimiter
    }

    pub fn parsing(&self) -> NumberParsing {
        self.parsing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_two_tokens() {
        assert_eq!(decode(b"10,20", b","), Ok(Command::new(10, 20)));
    }

    #[test]
    fn test_decode_single_token_is_malformed() {
        assert_eq!(decode(b"10", b","), Err(DecodeError::MalformedMessage));
    }

    #[test]
    fn test_decode_empty_is_malformed() {
        assert_eq!(decode(b"", b","), Err(DecodeError::MalformedMessage));
        assert_eq!(decode(b",,,", b","), Err(DecodeError::MalformedMessage));
    }

    #[test]
    fn test_decode_ignores_extra_tokens() {
        assert_eq!(decode(b"10,20,30", b","), Ok(Command::new(10, 20)));
        assert_eq!(decode(b"-5,7,garbage,,", b","), Ok(Command::new(-5, 7)));
    }

    #[test]
    fn test_trailing_content_does_not_change_result() {
        let expected = decode(b"42,-42", b",").expect("decode failed");
        for trailing in [&b""[..], b",1", b"\n", b",x,y,z", b"\0junk"] {
            let mut input = b"42,-42".to_vec();
            input.extend_from_slice(trailing);
            assert_eq!(decode(&input, b","), Ok(expected));
        }
    }

    #[test]
    fn test_lenient_non_numeric_reads_as_zero() {
        assert_eq!(decode(b"abc,def", b","), Ok(Command::new(0, 0)));
    }

    #[test]
    fn test_lenient_numeric_prefix() {
        assert_eq!(decode(b"  12abc,+7x", b","), Ok(Command::new(12, 7)));
        assert_eq!(decode(b"-100,100\r\n", b","), Ok(Command::new(-100, 100)));
        assert_eq!(decode(b"- 3,--4", b","), Ok(Command::new(0, 0)));
    }

    #[test]
    fn test_lenient_saturates() {
        assert_eq!(
            decode(b"99999999999,-99999999999", b","),
            Ok(Command::new(i32::MAX, i32::MIN))
        );
    }

    #[test]
    fn test_empty_segments_are_skipped() {
        assert_eq!(decode(b"10,,20", b","), Ok(Command::new(10, 20)));
        assert_eq!(decode(b",10,20", b","), Ok(Command::new(10, 20)));
        assert_eq!(decode(b",10", b","), Err(DecodeError::MalformedMessage));
    }

    #[test]
    fn test_payload_ends_at_nul() {
        assert_eq!(decode(b"10\0,20", b","), Err(DecodeError::MalformedMessage));
    }

    #[test]
    fn test_multi_byte_delimiter_splits_on_each_byte() {
        assert_eq!(decode(b"10;20", b",;"), Ok(Command::new(10, 20)));
        assert_eq!(decode(b"10,20", b",;"), Ok(Command::new(10, 20)));
    }

    #[test]
    fn test_strict_rejects_non_numeric() {
        let result = decode_with(b"abc,20", b",", NumberParsing::Strict);
        assert_eq!(result, Err(DecodeError::InvalidNumber("abc".into())));

        let result = decode_with(b"10,20x", b",", NumberParsing::Strict);
        assert!(matches!(result, Err(DecodeError::InvalidNumber(_))));
    }

    #[test]
    fn test_strict_accepts_padded_integers() {
        let result = decode_with(b" 10 ,-20\n", b",", NumberParsing::Strict);
        assert_eq!(result, Ok(Command::new(10, -20)));
    }

    #[test]
    fn test_strict_still_reports_missing_token() {
        let result = decode_with(b"10", b",", NumberParsing::Strict);
        assert_eq!(result, Err(DecodeError::MalformedMessage));
    }

    #[test]
    fn test_encode_request() {
        let encoded = encode(&Command::new(-15, 30), b",");
        assert_eq!(&encoded[..], b"-15,30");
        assert_eq!(decode(&encoded, b","), Ok(Command::new(-15, 30)));
    }

    #[test]
    fn test_command_decoder_defaults() {
        let decoder = CommandDecoder::default();
        assert_eq!(decoder.delimiter(), b",");
        assert_eq!(decoder.parsing(), NumberParsing::Lenient);
        assert_eq!(decoder.decode(b"1,2"), Ok(Command::new(1, 2)));
    }
}
