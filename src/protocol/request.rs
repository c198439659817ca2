//! Request Parsing
//!
//! A request is one text line: a command word, one space, then the
//! arguments in the shape the command declares.
//!
//! ## How Parsing Works
//!
//! 1. Trim the line and split it on the first space into `(command, body)`
//! 2. Look the command word up in the command table (case-sensitive)
//! 3. Match `body` against the command's [`Pattern`]
//! 4. Assign every captured [`Field`] to the request, converting the ttl

use crate::protocol::grammar::{Field, Pattern};
use std::fmt;
use thiserror::Error;

/// Errors that can occur while parsing a request line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    /// Empty line, or no space after the command word
    #[error("Bad request.")]
    BadRequest,

    /// Unknown command word
    #[error("Bad command.")]
    BadCommand,

    /// The arguments do not fit the command's pattern
    #[error("Bad arguments.")]
    BadArgs(String),

    /// The ttl token is not an integer
    #[error("Bad TTL")]
    BadTTL,

    /// The key is empty or not made of word characters
    #[error("Bad key")]
    BadKey,

    /// The value is unusable (multi-line, or an unknown option)
    #[error("Bad value")]
    BadValue,
}

/// Every command the server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Set,
    Get,
    Upd,
    Del,
    LSet,
    LPush,
    LPop,
    DSet,
    DGet,
    DAdd,
    DDel,
    Opt,
}

impl Command {
    /// All commands, in table order.
    pub const ALL: [Command; 12] = [
        Command::Set,
        Command::Get,
        Command::Upd,
        Command::Del,
        Command::LSet,
        Command::LPush,
        Command::LPop,
        Command::DSet,
        Command::DGet,
        Command::DAdd,
        Command::DDel,
        Command::Opt,
    ];

    /// The command word as it appears on the wire.
    pub fn name(self) -> &'static str {
        match self {
            Command::Set => "SET",
            Command::Get => "GET",
            Command::Upd => "UPD",
            Command::Del => "DEL",
            Command::LSet => "LSET",
            Command::LPush => "LPUSH",
            Command::LPop => "LPOP",
            Command::DSet => "DSET",
            Command::DGet => "DGET",
            Command::DAdd => "DADD",
            Command::DDel => "DDEL",
            Command::Opt => "OPT",
        }
    }

    /// Looks up a command word. Matching is exact and case-sensitive.
    pub fn lookup(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cmd| cmd.name() == word)
    }

    /// The argument shape this command accepts.
    pub fn pattern(self) -> Pattern {
        match self {
            Command::Set | Command::Upd | Command::LSet | Command::DSet => Pattern::KeyValueTtl,
            Command::Get | Command::Del | Command::LPop | Command::Opt => Pattern::Key,
            Command::LPush | Command::DGet | Command::DAdd | Command::DDel => Pattern::KeyValue,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A parsed request.
///
/// Fields the command's pattern does not capture keep their defaults
/// (empty value, ttl `0`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub command: Command,
    pub key: String,
    pub value: String,
    pub ttl: i64,
}

impl Request {
    /// Parses one request line.
    ///
    /// # Example
    ///
    /// ```
    /// use gache::protocol::{Command, Request};
    ///
    /// let req = Request::parse("SET greeting hello world 60\r\n").unwrap();
    /// assert_eq!(req.command, Command::Set);
    /// assert_eq!(req.key, "greeting");
    /// assert_eq!(req.value, "hello world");
    /// assert_eq!(req.ttl, 60);
    /// ```
    pub fn parse(line: &str) -> Result<Self, RequestError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(RequestError::BadRequest);
        }

        let (word, body) = line.split_once(' ').ok_or(RequestError::BadRequest)?;
        let command = Command::lookup(word.trim()).ok_or(RequestError::BadCommand)?;

        let pattern = command.pattern();
        let captures = pattern.capture(body)?;

        let mut request = Request {
            command,
            key: String::new(),
            value: String::new(),
            ttl: 0,
        };

        for &field in pattern.fields() {
            let Some(text) = captures.get(field) else {
                continue;
            };
            match field {
                Field::Key => request.key = text.to_string(),
                Field::Value => {
                    if text.contains(['\r', '\n']) {
                        return Err(RequestError::BadValue);
                    }
                    request.value = text.to_string();
                }
                Field::Ttl => request.ttl = text.parse().map_err(|_| RequestError::BadTTL)?,
            }
        }

        Ok(request)
    }
}
