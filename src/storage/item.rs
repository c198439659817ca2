//! Stored Values and Expiry Metadata
//!
//! Every key in the cache maps to an [`Item`]: the key itself, a typed
//! [`Value`] and an absolute expiry timestamp in epoch seconds.
//!
//! ## Value Kinds
//!
//! ```text
//! Value::Scalar  ──>  one opaque byte string
//! Value::List    ──>  a stack; push and pop work on the same (top) end
//! Value::Dict    ──>  sub-key -> opaque byte string
//! ```
//!
//! The kind is fixed when the key is created. Container operations match on
//! the tag and fail with `NotList` / `NotDict` when it does not fit.

use crate::storage::StorageError;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Sentinel `expire_at` for keys that never expire.
pub const NO_EXPIRE: i64 = -1;

/// Returns the current time as whole epoch seconds (floored).
pub fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Computes the absolute expiry second for a TTL given relative to `now`.
///
/// A TTL of zero or less means the key never expires.
pub fn make_ttl_stamp(now: i64, ttl: i64) -> i64 {
    if ttl <= 0 {
        NO_EXPIRE
    } else {
        now.saturating_add(ttl)
    }
}

/// A typed cache value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// A single opaque value
    Scalar(Bytes),
    /// A stack of opaque values, bottom first
    List(Vec<Bytes>),
    /// A mapping from sub-key to opaque value
    Dict(HashMap<String, Bytes>),
}

impl Value {
    /// Returns the kind of this value ("scalar", "list" or "dict").
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
        }
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Scalar(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Scalar(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Scalar(Bytes::from(s))
    }
}

impl From<Vec<Bytes>> for Value {
    fn from(items: Vec<Bytes>) -> Self {
        Value::List(items)
    }
}

impl From<HashMap<String, Bytes>> for Value {
    fn from(map: HashMap<String, Bytes>) -> Self {
        Value::Dict(map)
    }
}

/// Text rendering used on the wire.
///
/// Lists are written bottom to top separated by single spaces, dictionaries
/// as `subkey value` pairs in sub-key order.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(b) => write!(f, "{}", String::from_utf8_lossy(b)),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", String::from_utf8_lossy(item))?;
                }
                Ok(())
            }
            Value::Dict(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for (i, k) in keys.into_iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{} {}", k, String::from_utf8_lossy(&map[k]))?;
                }
                Ok(())
            }
        }
    }
}

/// Initial contents for a dictionary created with `dset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictSeed {
    /// A complete, pre-built mapping
    Map(HashMap<String, Bytes>),
    /// Alternating sub-key / value tokens: `k1 v1 k2 v2 ...`
    Pairs(Vec<Bytes>),
}

impl DictSeed {
    /// Builds the mapping, validating the pair sequence.
    ///
    /// An odd token count or a sub-key that is not valid UTF-8 is `BadMap`.
    /// Repeated sub-keys overwrite earlier ones.
    pub(crate) fn into_map(self) -> Result<HashMap<String, Bytes>, StorageError> {
        match self {
            DictSeed::Map(map) => Ok(map),
            DictSeed::Pairs(tokens) => {
                if tokens.len() % 2 != 0 {
                    return Err(StorageError::BadMap);
                }
                let mut map = HashMap::with_capacity(tokens.len() / 2);
                let mut iter = tokens.into_iter();
                while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
                    let k = String::from_utf8(k.to_vec()).map_err(|_| StorageError::BadMap)?;
                    map.insert(k, v);
                }
                Ok(map)
            }
        }
    }
}

impl From<HashMap<String, Bytes>> for DictSeed {
    fn from(map: HashMap<String, Bytes>) -> Self {
        DictSeed::Map(map)
    }
}

impl From<Vec<Bytes>> for DictSeed {
    fn from(tokens: Vec<Bytes>) -> Self {
        DictSeed::Pairs(tokens)
    }
}

/// A single stored entry. Owned exclusively by the storage engine.
#[derive(Debug, Clone)]
pub(crate) struct Item {
    key: String,
    value: Value,
    /// Absolute epoch second, or `NO_EXPIRE`
    expire_at: i64,
}

impl Item {
    pub(crate) fn new(key: String, value: Value, expire_at: i64) -> Self {
        Self {
            key,
            value,
            expire_at,
        }
    }

    pub(crate) fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn value(&self) -> &Value {
        &self.value
    }

    pub(crate) fn value_mut(&mut self) -> &mut Value {
        &mut self.value
    }

    pub(crate) fn set_value(&mut self, value: Value) {
        self.value = value;
    }

    /// Returns the expiry second, or `None` for keys that never expire.
    pub(crate) fn expire_at(&self) -> Option<i64> {
        (self.expire_at != NO_EXPIRE).then_some(self.expire_at)
    }

    pub(crate) fn set_expire_at(&mut self, expire_at: i64) {
        self.expire_at = if expire_at < 1 { NO_EXPIRE } else { expire_at };
    }

    /// A key is expired from its expiry second onwards.
    #[inline]
    pub(crate) fn is_expired(&self, now: i64) -> bool {
        self.expire_at().is_some_and(|exp| now >= exp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_stamp() {
        assert_eq!(make_ttl_stamp(1_000, 10), 1_010);
        assert_eq!(make_ttl_stamp(1_000, 0), NO_EXPIRE);
        assert_eq!(make_ttl_stamp(1_000, -5), NO_EXPIRE);
        assert_eq!(make_ttl_stamp(i64::MAX - 1, 10), i64::MAX);
    }

    #[test]
    fn test_item_expiry() {
        let item = Item::new("k".into(), Value::from("v"), 100);
        assert_eq!(item.expire_at(), Some(100));
        assert!(!item.is_expired(99));
        assert!(item.is_expired(100));

        let forever = Item::new("k".into(), Value::from("v"), NO_EXPIRE);
        assert_eq!(forever.expire_at(), None);
        assert!(!forever.is_expired(i64::MAX));
    }

    #[test]
    fn test_dict_seed_pairs() {
        let seed = DictSeed::Pairs(vec![
            Bytes::from("a"),
            Bytes::from("1"),
            Bytes::from("b"),
            Bytes::from("2"),
            Bytes::from("a"),
            Bytes::from("3"),
        ]);
        let map = seed.into_map().unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["a"], Bytes::from("3")); // last wins
        assert_eq!(map["b"], Bytes::from("2"));
    }

    #[test]
    fn test_dict_seed_rejects_bad_pairs() {
        let odd = DictSeed::Pairs(vec![Bytes::from("a"), Bytes::from("1"), Bytes::from("b")]);
        assert_eq!(odd.into_map(), Err(StorageError::BadMap));

        let single = DictSeed::Pairs(vec![Bytes::from("lonely")]);
        assert_eq!(single.into_map(), Err(StorageError::BadMap));

        let not_utf8 = DictSeed::Pairs(vec![Bytes::from_static(&[0xff, 0xfe]), Bytes::from("1")]);
        assert_eq!(not_utf8.into_map(), Err(StorageError::BadMap));
    }

    #[test]
    fn test_type_name() {
        assert_eq!(Value::from("x").type_name(), "scalar");
        assert_eq!(Value::List(vec![]).type_name(), "list");
        assert_eq!(Value::Dict(HashMap::new()).type_name(), "dict");
    }

    #[test]
    fn test_value_display() {
        assert_eq!(Value::from("hello world").to_string(), "hello world");

        let list = Value::List(vec![Bytes::from("a"), Bytes::from("b")]);
        assert_eq!(list.to_string(), "a b");

        let mut map = HashMap::new();
        map.insert("z".to_string(), Bytes::from("26"));
        map.insert("a".to_string(), Bytes::from("1"));
        assert_eq!(Value::Dict(map).to_string(), "a 1 z 26");
    }
}
