//! Typed accessors over the configuration's associative tree.
//!
//! A [`Keys`] value holds the top-level configuration entries: one entry per
//! schema key selecting a provider, one entry per provider name carrying its
//! persisted config, and the reserved `instances` and `versions` subtrees.
//! Values are opaque [`serde_yaml::Value`]s; the accessors below narrow them
//! with a distinguished wrong-type error.
//!
//! Entries are kept in a `BTreeMap`, so emission through the codec is
//! lexicographically ordered and diffs of marshaled configurations are
//! stable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::{ConfigError, ConfigResult};

/// An associative tree of configuration entries.
///
/// # Example
///
/// ```rust,ignore
/// let keys = Keys::new()
///     .with("creds", "awscreds,profile=ci")
///     .with("cluster", "ec2cluster");
/// assert_eq!(keys.string("cluster").unwrap().as_deref(), Some("ec2cluster"));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Keys {
    entries: BTreeMap<String, Value>,
}

impl Keys {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(key, value);
        self
    }

    /// Returns the raw value stored at `key`.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Returns the string value at `key`.
    pub fn string(&self, key: &str) -> ConfigResult<Option<String>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(ConfigError::WrongType),
        }
    }

    /// Returns the integer value at `key`.
    pub fn int(&self, key: &str) -> ConfigResult<Option<i64>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => n.as_i64().map(Some).ok_or(ConfigError::WrongType),
            Some(_) => Err(ConfigError::WrongType),
        }
    }

    /// Returns the nested tree at `key`.
    ///
    /// Fails with the wrong-type error when the value is not a mapping or
    /// when any of the nested keys is not a string.
    pub fn keys(&self, key: &str) -> ConfigResult<Option<Keys>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Value::Mapping(mapping)) => {
                let mut keys = Keys::new();
                for (k, v) in mapping {
                    let Value::String(k) = k else {
                        return Err(ConfigError::WrongType);
                    };
                    keys.entries.insert(k.clone(), v.clone());
                }
                Ok(Some(keys))
            }
            Some(_) => Err(ConfigError::WrongType),
        }
    }

    /// Stores `value` at `key`, replacing any previous entry.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Stores a nested tree at `key`.
    pub fn set_keys(&mut self, key: impl Into<String>, keys: Keys) {
        self.entries.insert(key.into(), keys.into_value());
    }

    /// Removes the entry at `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Whether the tree holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Converts the tree into a mapping value for embedding.
    pub fn into_value(self) -> Value {
        let mut mapping = Mapping::new();
        for (k, v) in self.entries {
            mapping.insert(Value::String(k), v);
        }
        Value::Mapping(mapping)
    }
}
