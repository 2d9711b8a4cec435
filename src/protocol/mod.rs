//! Memcached Text Protocol
//!
//! ## Overview
//!
//! The memcached text protocol is line oriented: a client sends a command line
//! of space-separated tokens, storage commands add a raw data block, and the
//! server answers with one or more CRLF-terminated lines.
//!
//! ## Modules
//!
//! - `types`: Defines the `Response` enum and serialization
//! - `parser`: Line and data-block framing plus argument helpers
//!
//! ## Example
//!
//! ```
//! use flashcached::protocol::{parse_line, split_command, Response};
//!
//! let (line, _) = parse_line(b"get name\r\n").unwrap().unwrap();
//! let (verb, keys) = split_command(&line).unwrap();
//! assert_eq!((verb, keys), ("get", vec!["name"]));
//!
//! assert_eq!(Response::End.serialize(), b"END\r\n");
//! ```

pub mod parser;
pub mod types;

pub use parser::{
    find_crlf, is_noreply, parse_line, parse_number, parse_payload, split_command, ParseError,
    ParseResult, MAX_LINE_LENGTH,
};
pub use types::{messages, Response, CRLF};
