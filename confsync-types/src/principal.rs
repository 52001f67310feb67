//! Session principals.

use crate::ids::PrincipalId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a signed-in principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    Guardian,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "admin"),
            Self::Staff => write!(f, "staff"),
            Self::Guardian => write!(f, "guardian"),
        }
    }
}

impl FromStr for Role {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "staff" => Ok(Self::Staff),
            "guardian" => Ok(Self::Guardian),
            other => Err(crate::Error::InvalidRole(other.to_string())),
        }
    }
}

/// The normalized session record handed to callers after sign-in.
///
/// Issued behind an `Arc` and never mutated afterwards; a fresh sign-in
/// always produces a new instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPrincipal {
    pub id: PrincipalId,
    pub display_name: String,
    pub email: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl SessionPrincipal {
    /// Creates an active principal with no phone number.
    pub fn new(
        display_name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            id: PrincipalId::new(),
            display_name: display_name.into(),
            email: email.into(),
            role,
            phone: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    /// Sets the phone number.
    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    /// Sets the active flag.
    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Returns the lower-cased email used as the offline lookup key.
    pub fn normalized_email(&self) -> String {
        normalize_email(&self.email)
    }
}

/// Lower-cases and trims an email address for lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
