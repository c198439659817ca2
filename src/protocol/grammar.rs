//! Argument Grammar
//!
//! Each command declares which of three argument shapes it accepts. A shape
//! is matched against the part of the request line after the command word.
//!
//! ```text
//! Key          GET user_1
//! KeyValue     DGET user_1 email
//! KeyValueTtl  SET user_1 some long value 3600
//!              ─┬──── ──────┬──────── ─┬──
//!               key       value      ttl
//! ```
//!
//! - The key is one or more ASCII word characters (`[A-Za-z0-9_]`).
//! - The value is everything between the key and the last token, and may
//!   contain spaces.
//! - The ttl is the last whitespace-separated token.
//!
//! Only ASCII whitespace separates tokens.

use crate::protocol::request::RequestError;

/// A captured argument slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Key,
    Value,
    Ttl,
}

/// The argument shape of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// `key`
    Key,
    /// `key value...`
    KeyValue,
    /// `key value... ttl`
    KeyValueTtl,
}

impl Pattern {
    /// Returns the fields this pattern captures, in line order.
    pub fn fields(self) -> &'static [Field] {
        match self {
            Pattern::Key => &[Field::Key],
            Pattern::KeyValue => &[Field::Key, Field::Value],
            Pattern::KeyValueTtl => &[Field::Key, Field::Value, Field::Ttl],
        }
    }

    /// Matches `body` against this pattern.
    ///
    /// `body` is expected to carry no trailing whitespace; the request parser
    /// trims the line before splitting off the command word.
    pub fn capture(self, body: &str) -> Result<Captures<'_>, RequestError> {
        let (key, rest) = split_key(body)?;

        match self {
            Pattern::Key => {
                if !rest.is_empty() {
                    return Err(RequestError::BadArgs(body.to_string()));
                }
                Ok(Captures::new(key, None, None))
            }
            Pattern::KeyValue => {
                let value = rest.trim_start_matches(is_separator);
                if value.is_empty() {
                    return Err(RequestError::BadArgs(body.to_string()));
                }
                Ok(Captures::new(key, Some(value), None))
            }
            Pattern::KeyValueTtl => {
                // At least one separator before the value and one before the ttl
                let (head, ttl) = rest
                    .rsplit_once(is_separator)
                    .ok_or_else(|| RequestError::BadArgs(body.to_string()))?;
                if head.is_empty() || ttl.is_empty() {
                    return Err(RequestError::BadArgs(body.to_string()));
                }
                Ok(Captures::new(
                    key,
                    Some(head.trim_start_matches(is_separator)),
                    Some(ttl),
                ))
            }
        }
    }
}

/// Splits the leading key token from the rest of `body`.
///
/// The rest is either empty or starts with whitespace.
fn split_key(body: &str) -> Result<(&str, &str), RequestError> {
    let end = body
        .find(|c: char| !is_word_char(c))
        .unwrap_or(body.len());
    let (key, rest) = body.split_at(end);

    if key.is_empty() {
        return Err(RequestError::BadKey);
    }
    match rest.chars().next() {
        Some(c) if !is_separator(c) => Err(RequestError::BadKey),
        _ => Ok((key, rest)),
    }
}

#[inline]
fn is_separator(c: char) -> bool {
    c.is_ascii_whitespace()
}

#[inline]
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// The raw text captured for each field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Captures<'a> {
    key: &'a str,
    value: Option<&'a str>,
    ttl: Option<&'a str>,
}

impl<'a> Captures<'a> {
    fn new(key: &'a str, value: Option<&'a str>, ttl: Option<&'a str>) -> Self {
        Self { key, value, ttl }
    }

    /// Returns the text captured for `field`, if the pattern has that field.
    pub fn get(&self, field: Field) -> Option<&'a str> {
        match field {
            Field::Key => Some(self.key),
            Field::Value => self.value,
            Field::Ttl => self.ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_pattern() {
        let caps = Pattern::Key.capture("user_1").unwrap();
        assert_eq!(caps.get(Field::Key), Some("user_1"));
        assert_eq!(caps.get(Field::Value), None);

        assert!(matches!(
            Pattern::Key.capture("user_1 extra"),
            Err(RequestError::BadArgs(_))
        ));
        assert_eq!(Pattern::Key.capture("user-1"), Err(RequestError::BadKey));
        assert_eq!(Pattern::Key.capture(""), Err(RequestError::BadKey));
    }

    #[test]
    fn test_key_value_pattern() {
        let caps = Pattern::KeyValue.capture("dict   sub key").unwrap();
        assert_eq!(caps.get(Field::Key), Some("dict"));
        assert_eq!(caps.get(Field::Value), Some("sub key"));

        assert!(matches!(
            Pattern::KeyValue.capture("dict"),
            Err(RequestError::BadArgs(_))
        ));
    }

    #[test]
    fn test_key_value_ttl_pattern() {
        let caps = Pattern::KeyValueTtl.capture("k some long value 60").unwrap();
        assert_eq!(caps.get(Field::Key), Some("k"));
        assert_eq!(caps.get(Field::Value), Some("some long value"));
        assert_eq!(caps.get(Field::Ttl), Some("60"));

        // Greedy value: only the final separator belongs to the ttl
        let caps = Pattern::KeyValueTtl.capture("k a  5").unwrap();
        assert_eq!(caps.get(Field::Value), Some("a "));

        // Empty value between two separators
        let caps = Pattern::KeyValueTtl.capture("k  5").unwrap();
        assert_eq!(caps.get(Field::Value), Some(""));
    }

    #[test]
    fn test_key_value_ttl_needs_three_parts() {
        assert!(matches!(
            Pattern::KeyValueTtl.capture("k 5"),
            Err(RequestError::BadArgs(_))
        ));
        assert!(matches!(
            Pattern::KeyValueTtl.capture("k"),
            Err(RequestError::BadArgs(_))
        ));
        assert_eq!(
            Pattern::KeyValueTtl.capture("k:1 v 5"),
            Err(RequestError::BadKey)
        );
    }

    #[test]
    fn test_unicode_space_is_not_a_separator() {
        // U+2003 EM SPACE belongs to the value, so no ttl token is left
        assert!(matches!(
            Pattern::KeyValueTtl.capture("k a\u{2003}5"),
            Err(RequestError::BadArgs(_))
        ));

        let caps = Pattern::KeyValueTtl.capture("k a\u{2003}b 5").unwrap();
        assert_eq!(caps.get(Field::Value), Some("a\u{2003}b"));

        assert_eq!(
            Pattern::Key.capture("k\u{2003}"),
            Err(RequestError::BadKey)
        );
    }

    #[test]
    fn test_fields_follow_pattern() {
        assert_eq!(Pattern::Key.fields(), &[Field::Key]);
        assert_eq!(Pattern::KeyValueTtl.fields().len(), 3);
    }
}
