//! Command Handler Module
//!
//! This module executes parsed requests against the storage engine and turns
//! the outcome into a [`Response`].
//!
//! ## Supported Commands
//!
//! ### Scalar Commands
//! - `SET key value ttl` - Create a key (`[201]`)
//! - `GET key` - Get a key's value
//! - `UPD key value ttl` - Overwrite an existing key (`[204]`)
//! - `DEL key` - Delete a key, absent keys included (`[204]`)
//!
//! ### List Commands
//! - `LSET key v1 v2 ... ttl` - Create a list pushed in the given order (`[201]`)
//! - `LPUSH key value` - Push onto an existing list (`[204]`)
//! - `LPOP key` - Pop the most recently pushed value
//!
//! ### Dictionary Commands
//! - `DSET key k1 v1 k2 v2 ... ttl` - Create a dictionary (`[201]`)
//! - `DGET key subkey` - Get one sub-key
//! - `DADD key subkey value` - Insert or overwrite a sub-key (`[204]`)
//! - `DDEL key subkey` - Remove a sub-key (`[204]`)
//!
//! ### Server Commands
//! - `OPT flush` - Remove every key (`[204]`)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CommandHandler                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐     │
//! │  │   parse()   │───>│  dispatch() │───>│  cmd_xxx()  │     │
//! │  └─────────────┘    └─────────────┘    └─────────────┘     │
//! │                                               │             │
//! │                                               ▼             │
//! │                                      StorageEngine          │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::protocol::{Command, Request, RequestError, Response};
use crate::storage::{StorageEngine, Value};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, warn};

/// Executes requests by dispatching them to the storage engine.
#[derive(Clone)]
pub struct CommandHandler {
    /// The storage engine
    storage: Arc<StorageEngine>,
}

impl CommandHandler {
    /// Creates a new command handler with the given storage engine.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    /// Parses and executes one request line.
    ///
    /// # Returns
    ///
    /// The response to send back to the client. Parse failures become
    /// `[400]` responses.
    pub fn execute_line(&self, line: &str) -> Response {
        match Request::parse(line) {
            Ok(request) => self.execute(&request),
            Err(e) => {
                warn!(request = %line.trim(), error = ?e, "Rejected request");
                e.into()
            }
        }
    }

    /// Executes a parsed request.
    pub fn execute(&self, request: &Request) -> Response {
        debug!(command = %request.command, key = %request.key, "Executing");

        let response = self.dispatch(request);
        if response.is_error() {
            debug!(command = %request.command, key = %request.key, response = %response, "Command failed");
        }
        response
    }

    /// Dispatches a request to its handler.
    fn dispatch(&self, req: &Request) -> Response {
        match req.command {
            Command::Set => self.cmd_set(req),
            Command::Get => self.cmd_get(req),
            Command::Upd => self.cmd_update(req),
            Command::Del => self.cmd_del(req),
            Command::LSet => self.cmd_lset(req),
            Command::LPush => self.cmd_lpush(req),
            Command::LPop => self.cmd_lpop(req),
            Command::DSet => self.cmd_dset(req),
            Command::DGet => self.cmd_dget(req),
            Command::DAdd => self.cmd_dadd(req),
            Command::DDel => self.cmd_ddel(req),
            Command::Opt => self.cmd_opt(req),
        }
    }

    // ========================================================================
    // SCALAR COMMANDS
    // ========================================================================

    fn cmd_set(&self, req: &Request) -> Response {
        match self.storage.set(&req.key, req.value.clone(), req.ttl) {
            Ok(()) => Response::Created,
            Err(e) => e.into(),
        }
    }

    fn cmd_get(&self, req: &Request) -> Response {
        match self.storage.get(&req.key) {
            Ok(Value::Scalar(data)) => Response::Value(data),
            Ok(other) => Response::value(other.to_string()),
            Err(e) => e.into(),
        }
    }

    fn cmd_update(&self, req: &Request) -> Response {
        match self.storage.update(&req.key, req.value.clone(), req.ttl) {
            Ok(()) => Response::NoContent,
            Err(e) => e.into(),
        }
    }

    fn cmd_del(&self, req: &Request) -> Response {
        self.storage.delete(&req.key);
        Response::NoContent
    }

    // ========================================================================
    // LIST COMMANDS
    // ========================================================================

    /// `LSET key v1 v2 v3 ttl`: values are separated by single spaces.
    fn cmd_lset(&self, req: &Request) -> Response {
        let items = req.value.split(' ').map(|s| Bytes::copy_from_slice(s.as_bytes()));
        match self.storage.lset(&req.key, items, req.ttl) {
            Ok(()) => Response::Created,
            Err(e) => e.into(),
        }
    }

    fn cmd_lpush(&self, req: &Request) -> Response {
        match self.storage.lpush(&req.key, req.value.clone()) {
            Ok(()) => Response::NoContent,
            Err(e) => e.into(),
        }
    }

    fn cmd_lpop(&self, req: &Request) -> Response {
        match self.storage.lpop(&req.key) {
            Ok(data) => Response::Value(data),
            Err(e) => e.into(),
        }
    }

    // ========================================================================
    // DICTIONARY COMMANDS
    // ========================================================================

    /// `DSET key k1 v1 k2 v2 ttl`: tokens alternate sub-key and value.
    fn cmd_dset(&self, req: &Request) -> Response {
        let tokens: Vec<Bytes> = req
            .value
            .split(' ')
            .map(|s| Bytes::copy_from_slice(s.as_bytes()))
            .collect();
        match self.storage.dset(&req.key, tokens, req.ttl) {
            Ok(()) => Response::Created,
            Err(e) => e.into(),
        }
    }

    fn cmd_dget(&self, req: &Request) -> Response {
        match self.storage.dget(&req.key, &req.value) {
            Ok(data) => Response::Value(data),
            Err(e) => e.into(),
        }
    }

    /// `DADD key subkey value`: the value is everything after the sub-key.
    fn cmd_dadd(&self, req: &Request) -> Response {
        let Some((subkey, value)) = req.value.split_once(' ') else {
            return RequestError::BadArgs(req.value.clone()).into();
        };
        match self.storage.dadd(&req.key, subkey, value.trim().to_string()) {
            Ok(()) => Response::NoContent,
            Err(e) => e.into(),
        }
    }

    fn cmd_ddel(&self, req: &Request) -> Response {
        self.storage.ddel(&req.key, &req.value);
        Response::NoContent
    }

    // ========================================================================
    // SERVER COMMANDS
    // ========================================================================

    fn cmd_opt(&self, req: &Request) -> Response {
        match req.key.as_str() {
            "flush" => {
                self.storage.flush();
                Response::NoContent
            }
            _ => RequestError::BadValue.into(),
        }
    }
}
