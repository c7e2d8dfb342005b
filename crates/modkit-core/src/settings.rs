//! Dynamically-typed setting values.
//!
//! Each module declares its own setting schema, so the host cannot know the
//! shape of a settings table at compile time.  [`SettingValue`] is the small
//! value universe every setting lives in: booleans, integers, floats, and
//! text.
//!
//! # Why `#[serde(untagged)]`? (for beginners)
//!
//! The settings file maps module identities to freeform key/value tables:
//!
//! ```json
//! {
//!   "auto_clicker": {
//!     "enabled": false,
//!     "hotkey": "f4",
//!     "interval_ms": 250,
//!     "confidence": 0.9
//!   }
//! }
//! ```
//!
//! With an *untagged* enum, serde picks the first variant whose shape matches
//! the raw JSON value, so the file stays plain JSON with no `{"Integer": 250}`
//! wrapper objects.  Variant order matters: `Bool` is tried before `Integer`
//! and `Integer` before `Float`, so `true` stays a bool and `250` stays an
//! integer rather than collapsing to `250.0`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Synthesized per-module key holding the user-facing toggle state.
///
/// Not part of any declared schema; the host adds it to every non-system
/// module at discovery time, defaulting to `false`.
pub const ENABLED_KEY: &str = "enabled";

/// Conventional key a module declares when it wants a global hotkey.
///
/// The host registers the binding when the module starts, provided the value
/// is a non-empty string and the module exposes a hotkey callback.
pub const HOTKEY_KEY: &str = "hotkey";

/// A single setting value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl SettingValue {
    /// Returns the boolean payload, if this is a `Bool`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an `Integer`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SettingValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the numeric payload as `f64`.
    ///
    /// Integers coerce: a schema may declare `0.9` while a user persists `1`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SettingValue::Float(f) => Some(*f),
            SettingValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the text payload, if this is `Text`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<bool> for SettingValue {
    fn from(v: bool) -> Self {
        SettingValue::Bool(v)
    }
}

impl From<i64> for SettingValue {
    fn from(v: i64) -> Self {
        SettingValue::Integer(v)
    }
}

impl From<f64> for SettingValue {
    fn from(v: f64) -> Self {
        SettingValue::Float(v)
    }
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        SettingValue::Text(v.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(v: String) -> Self {
        SettingValue::Text(v)
    }
}

/// One module's current settings, keyed by setting name.
///
/// A `BTreeMap` keeps serialization output stable, which keeps the persisted
/// settings file diff-friendly.
pub type SettingsMap = BTreeMap<String, SettingValue>;

// ── Tests ─────────────────────────────────────────────────────────────────────
