//! Line Protocol Implementation
//!
//! This module implements the text protocol gache speaks over TCP.
//!
//! ## Overview
//!
//! Each request is a single line terminated by `\n` (a trailing `\r` is
//! tolerated). Each response is a single line terminated by `\n`.
//!
//! ```text
//! > SET user_1 hello world 60
//! < [201]
//! > GET user_1
//! < hello world
//! > GET user_2
//! < [404] Key not found
//! ```
//!
//! ## Modules
//!
//! - `grammar`: argument shapes (`key`, `key value`, `key value ttl`)
//! - `request`: the command table and request-line parser
//! - `response`: response lines and the error-to-status mapping

pub mod grammar;
pub mod request;
pub mod response;

// Re-export commonly used types for convenience
pub use grammar::{Field, Pattern};
pub use request::{Command, Request, RequestError};
pub use response::{status, Response};
