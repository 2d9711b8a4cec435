//! Memcached Text Protocol Responses
//!
//! Every reply the server sends is a CRLF-terminated line, optionally followed
//! by a data block for retrieval hits.
//!
//! ## Wire Format
//!
//! ```text
//! STORED\r\n
//! NOT_STORED\r\n
//! EXISTS\r\n
//! NOT_FOUND\r\n
//! DELETED\r\n
//! TOUCHED\r\n
//! ERROR\r\n
//! CLIENT_ERROR <message>\r\n
//! VALUE <key> <flags> <bytes>[ <cas>]\r\n<data>\r\n
//! END\r\n
//! <integer>\r\n
//! ```

use bytes::Bytes;
use std::fmt;

/// The line terminator used by the protocol
pub const CRLF: &[u8] = b"\r\n";

/// Messages carried by `CLIENT_ERROR` responses
pub mod messages {
    pub const BAD_COMMAND_LINE: &str = "bad command line format";
    pub const BAD_DATA_CHUNK: &str = "bad data chunk";
    pub const OBJECT_TOO_LARGE: &str = "object too large for cache";
    pub const INVALID_DELTA: &str = "invalid numeric delta argument";
    pub const NON_NUMERIC_VALUE: &str = "cannot increment or decrement non-numeric value";
    pub const DELTA_OVERFLOW: &str = "increment or decrement overflow";
    pub const INVALID_EXPTIME: &str = "invalid exptime argument";
}

/// A single server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Stored,
    NotStored,
    Exists,
    NotFound,
    Deleted,
    Touched,

    /// Unknown command or missing arguments
    Error,

    /// The request was understood but invalid.
    /// Format: `CLIENT_ERROR <message>\r\n`
    ClientError(String),

    /// One retrieval hit. `cas` is only sent for `gets`.
    Value {
        key: String,
        flags: u32,
        data: Bytes,
        cas: Option<u64>,
    },

    /// Terminates a retrieval response
    End,

    /// Result of incr/decr
    Number(i64),
}

impl Response {
    /// Creates a `CLIENT_ERROR` response.
    ///
    /// # Example
    /// ```
    /// use flashcached::protocol::types::{messages, Response};
    /// let err = Response::client_error(messages::BAD_DATA_CHUNK);
    /// assert_eq!(err.serialize(), b"CLIENT_ERROR bad data chunk\r\n");
    /// ```
    pub fn client_error(message: impl Into<String>) -> Self {
        Response::ClientError(message.into())
    }

    /// Creates a `VALUE` line with its data block.
    pub fn value(key: impl Into<String>, flags: u32, data: Bytes, cas: Option<u64>) -> Self {
        Response::Value {
            key: key.into(),
            flags,
            data,
            cas,
        }
    }

    /// Serializes the response to bytes for sending over the wire.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the response into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Response::Stored => buf.extend_from_slice(b"STORED"),
            Response::NotStored => buf.extend_from_slice(b"NOT_STORED"),
            Response::Exists => buf.extend_from_slice(b"EXISTS"),
            Response::NotFound => buf.extend_from_slice(b"NOT_FOUND"),
            Response::Deleted => buf.extend_from_slice(b"DELETED"),
            Response::Touched => buf.extend_from_slice(b"TOUCHED"),
            Response::Error => buf.extend_from_slice(b"ERROR"),
            Response::ClientError(message) => {
                buf.extend_from_slice(b"CLIENT_ERROR ");
                buf.extend_from_slice(message.as_bytes());
            }
            Response::Value {
                key,
                flags,
                data,
                cas,
            } => {
                buf.extend_from_slice(b"VALUE ");
                buf.extend_from_slice(key.as_bytes());
                buf.extend_from_slice(format!(" {} {}", flags, data.len()).as_bytes());
                if let Some(cas) = cas {
                    buf.extend_from_slice(format!(" {}", cas).as_bytes());
                }
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(data);
            }
            Response::End => buf.extend_from_slice(b"END"),
            Response::Number(n) => buf.extend_from_slice(n.to_string().as_bytes()),
        }
        buf.extend_from_slice(CRLF);
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Value {
                key, flags, data, ..
            } => write!(f, "VALUE {} {} ({} bytes)", key, flags, data.len()),
            other => {
                let wire = other.serialize();
                f.write_str(String::from_utf8_lossy(&wire).trim_end())
            }
        }
    }
}
