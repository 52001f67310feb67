//! Configuration entries.
//!
//! A [`ConfigEntry`] is one row of the logical settings table: an opaque
//! namespace key, an arbitrary JSON document, and the time it was last
//! written. Conflicts between writers are resolved by `updated_at`
//! (last-write-wins).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known setting keys used by the admin UI.
pub mod keys {
    /// Login screen layout and branding.
    pub const LOGIN_CUSTOMIZATION: &str = "login_customization";
    /// Sidebar appearance and ordering.
    pub const SIDEBAR_LAYOUT: &str = "sidebar_layout";
    /// Visual theme (colors, fonts).
    pub const THEME: &str = "theme";
    /// Feature toggles.
    pub const FEATURE_FLAGS: &str = "feature_flags";

    /// All well-known keys, in load order.
    pub const ALL: [&str; 4] = [LOGIN_CUSTOMIZATION, SIDEBAR_LAYOUT, THEME, FEATURE_FLAGS];
}

/// A single configuration row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// Unique namespace key.
    pub key: String,
    /// Structured value; its shape is interpreted only by consumers.
    pub value: Value,
    /// Time of the last write.
    pub updated_at: DateTime<Utc>,
}

impl ConfigEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
            updated_at: Utc::now(),
        }
    }

    /// Creates an entry with an explicit timestamp (replay, tests).
    pub fn with_timestamp(key: impl Into<String>, value: Value, updated_at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            value,
            updated_at,
        }
    }

    /// Creates the entry that replaces `previous`, guaranteeing a strictly
    /// newer timestamp even when the wall clock has not advanced.
    pub fn superseding(previous: Option<&ConfigEntry>, key: impl Into<String>, value: Value) -> Self {
        let now = Utc::now();
        let updated_at = match previous {
            Some(prev) if prev.updated_at >= now => prev.updated_at + Duration::milliseconds(1),
            _ => now,
        };
        Self::with_timestamp(key, value, updated_at)
    }

    /// Returns true if this entry wins over `other` under last-write-wins.
    pub fn is_newer_than(&self, other: &ConfigEntry) -> bool {
        self.updated_at > other.updated_at
    }

    /// Converts into the notification form delivered to consumers.
    pub fn to_change(&self) -> ConfigChange {
        ConfigChange {
            key: self.key.clone(),
            value: self.value.clone(),
        }
    }
}

/// "Key X changed to value V", as delivered to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigChange {
    pub key: String,
    pub value: Value,
}

impl ConfigChange {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

impl From<ConfigEntry> for ConfigChange {
    fn from(entry: ConfigEntry) -> Self {
        Self {
            key: entry.key,
            value: entry.value,
        }
    }
}
