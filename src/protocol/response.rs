//! Response Lines
//!
//! Every request is answered with exactly one newline-terminated line.
//!
//! ## Format
//!
//! - Created: `[201]\n`
//! - Success without a body: `[204]\n`
//! - Retrieved value: the raw value, no status prefix: `somevalue\n`
//! - Failure: `[CODE] message\n`, e.g. `[400] Key already exists\n`
//!
//! ## Status Mapping
//!
//! | Error                                   | Code  |
//! |-----------------------------------------|-------|
//! | `NotFound` (key, sub-key, empty list)   | `404` |
//! | every other storage or request error    | `400` |
//! | I/O failure while reading the request   | `500` |

use crate::protocol::request::RequestError;
use crate::storage::StorageError;
use bytes::Bytes;
use std::fmt;

/// The line terminator used on the wire
pub const LF: u8 = b'\n';

/// Status codes
pub mod status {
    pub const CREATED: u16 = 201;
    pub const NO_CONTENT: u16 = 204;
    pub const BAD_REQUEST: u16 = 400;
    pub const NOT_FOUND: u16 = 404;
    pub const INTERNAL_ERROR: u16 = 500;
}

/// A single response line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// A key was created
    Created,

    /// The operation succeeded and has nothing to return
    NoContent,

    /// A retrieved value, written as-is
    Value(Bytes),

    /// A failure with its status code and message
    Error { code: u16, message: String },
}

impl Response {
    /// Creates a value response.
    pub fn value(data: impl Into<Bytes>) -> Self {
        Response::Value(data.into())
    }

    /// Creates an error response.
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Response::Error {
            code,
            message: message.into(),
        }
    }

    /// Status code for logging; value responses report `200`.
    pub fn code(&self) -> u16 {
        match self {
            Response::Created => status::CREATED,
            Response::NoContent => status::NO_CONTENT,
            Response::Value(_) => 200,
            Response::Error { code, .. } => *code,
        }
    }

    /// Returns true if this is an error response.
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }

    /// Serializes the response to its wire form, newline included.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.serialized_len());
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the response into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            Response::Created | Response::NoContent => {
                buf.push(b'[');
                buf.extend_from_slice(self.code().to_string().as_bytes());
                buf.push(b']');
            }
            Response::Value(data) => buf.extend_from_slice(data),
            Response::Error { code, message } => {
                buf.push(b'[');
                buf.extend_from_slice(code.to_string().as_bytes());
                buf.extend_from_slice(b"] ");
                buf.extend_from_slice(message.as_bytes());
            }
        }
        buf.push(LF);
    }

    fn serialized_len(&self) -> usize {
        match self {
            Response::Created | Response::NoContent => 6,
            Response::Value(data) => data.len() + 1,
            Response::Error { message, .. } => message.len() + 7,
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Created | Response::NoContent => write!(f, "[{}]", self.code()),
            Response::Value(data) => write!(f, "{}", String::from_utf8_lossy(data)),
            Response::Error { code, message } => write!(f, "[{}] {}", code, message),
        }
    }
}

impl From<StorageError> for Response {
    fn from(err: StorageError) -> Self {
        let code = match err {
            StorageError::NotFound => status::NOT_FOUND,
            _ => status::BAD_REQUEST,
        };
        Response::error(code, err.to_string())
    }
}

impl From<RequestError> for Response {
    fn from(err: RequestError) -> Self {
        Response::error(status::BAD_REQUEST, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_lines() {
        assert_eq!(Response::Created.serialize(), b"[201]\n");
        assert_eq!(Response::NoContent.serialize(), b"[204]\n");
    }

    #[test]
    fn test_value_is_written_raw() {
        assert_eq!(Response::value("somevalue").serialize(), b"somevalue\n");
        assert_eq!(Response::value("a b c").serialize(), b"a b c\n");
    }

    #[test]
    fn test_error_line() {
        let resp = Response::error(status::INTERNAL_ERROR, "read failed");
        assert_eq!(resp.serialize(), b"[500] read failed\n");
        assert!(resp.is_error());
        assert_eq!(resp.to_string(), "[500] read failed");
    }

    #[test]
    fn test_storage_error_mapping() {
        assert_eq!(
            Response::from(StorageError::AlreadyExists).serialize(),
            b"[400] Key already exists\n"
        );
        assert_eq!(
            Response::from(StorageError::NotFound).serialize(),
            b"[404] Key not found\n"
        );
        assert_eq!(Response::from(StorageError::NotList).code(), 400);
        assert_eq!(Response::from(StorageError::NotDict).code(), 400);
        assert_eq!(Response::from(StorageError::NoExpire).code(), 400);
        assert_eq!(
            Response::from(StorageError::BadMap).to_string(),
            "[400] Bad argument(s) for hash"
        );
    }

    #[test]
    fn test_request_error_mapping() {
        assert_eq!(
            Response::from(RequestError::BadCommand).serialize(),
            b"[400] Bad command.\n"
        );
        assert_eq!(
            Response::from(RequestError::BadTTL).serialize(),
            b"[400] Bad TTL\n"
        );
    }

    #[test]
    fn test_serialized_len_matches() {
        for resp in [
            Response::Created,
            Response::NoContent,
            Response::value("xyz"),
            Response::error(404, "Key not found"),
        ] {
            assert_eq!(resp.serialize().len(), resp.serialized_len());
        }
    }
}
