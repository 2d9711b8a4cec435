//! Memcached Text Protocol Parser
//!
//! Requests are CRLF-terminated command lines of space-separated tokens. The
//! storage commands are followed by a data block of exactly `<bytes>` bytes
//! plus a CRLF.
//!
//! ## How the Parser Works
//!
//! The framing functions read from a buffer and return either:
//! - `Ok(Some((value, consumed)))` - A complete frame, `consumed` bytes were used
//! - `Ok(None)` - Need more data, the frame is incomplete
//! - `Err(ParseError)` - Invalid protocol data
//!
//! The caller appends network data to a buffer, attempts a parse, and on
//! success advances the buffer by `consumed` bytes.

use crate::protocol::types::CRLF;
use bytes::Bytes;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur while parsing requests.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The command line is not valid UTF-8
    #[error("invalid UTF-8 in command line")]
    InvalidUtf8,

    /// No CRLF within the maximum line length
    #[error("command line exceeds {max} bytes")]
    LineTooLong { max: usize },

    /// A required argument is absent
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    /// A numeric argument failed to parse
    #[error("invalid numeric argument: {0:?}")]
    InvalidNumeric(String),

    /// The data block is not followed by CRLF
    #[error("data block not terminated by CRLF")]
    BadDataChunk,
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum length of a command line, terminator included (64 KB)
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// The token that suppresses replies when it ends a command line
pub const NOREPLY: &str = "noreply";

/// Finds the position of CRLF in the buffer.
///
/// Returns the position of `\r` if found, or None if CRLF is not present.
#[inline]
pub fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|pair| pair == CRLF)
}

/// Parses one command line from the buffer.
///
/// The returned line excludes the CRLF; `consumed` includes it. A buffer
/// holding [`MAX_LINE_LENGTH`] bytes without a terminator is an error.
///
/// # Example
///
/// ```
/// use flashcached::protocol::parse_line;
///
/// let (line, consumed) = parse_line(b"get name\r\nextra").unwrap().unwrap();
/// assert_eq!(line, "get name");
/// assert_eq!(consumed, 10);
/// ```
pub fn parse_line(buf: &[u8]) -> ParseResult<Option<(String, usize)>> {
    match find_crlf(buf) {
        Some(pos) if pos + 2 > MAX_LINE_LENGTH => Err(ParseError::LineTooLong {
            max: MAX_LINE_LENGTH,
        }),
        Some(pos) => {
            let line = std::str::from_utf8(&buf[..pos]).map_err(|_| ParseError::InvalidUtf8)?;
            Ok(Some((line.to_string(), pos + 2)))
        }
        None if buf.len() >= MAX_LINE_LENGTH => Err(ParseError::LineTooLong {
            max: MAX_LINE_LENGTH,
        }),
        None => Ok(None),
    }
}

/// Parses a data block of `len` bytes followed by CRLF.
pub fn parse_payload(buf: &[u8], len: usize) -> ParseResult<Option<(Bytes, usize)>> {
    let total_needed = len.checked_add(2).ok_or(ParseError::BadDataChunk)?;
    if buf.len() < total_needed {
        return Ok(None);
    }

    if &buf[len..total_needed] != CRLF {
        return Err(ParseError::BadDataChunk);
    }

    Ok(Some((Bytes::copy_from_slice(&buf[..len]), total_needed)))
}

/// Splits a command line into its verb and argument tokens.
///
/// Returns `None` for a blank line.
pub fn split_command(line: &str) -> Option<(&str, Vec<&str>)> {
    let mut tokens = line.split_whitespace();
    let verb = tokens.next()?;
    Some((verb, tokens.collect()))
}

/// Parses a numeric argument.
pub fn parse_number<T: FromStr>(token: &str) -> ParseResult<T> {
    token
        .parse()
        .map_err(|_| ParseError::InvalidNumeric(token.to_string()))
}

/// Returns true if the optional token at `index` is `noreply`.
pub fn is_noreply(args: &[&str], index: usize) -> bool {
    args.get(index).is_some_and(|token| *token == NOREPLY)
}
