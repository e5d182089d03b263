//! API response models for users.

use crate::types::UserId;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt;

// Role enum for platform-wide permissions
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SystemAdmin,
    ProjectAdmin,
    #[default]
    RegularUser,
}

impl Role {
    /// Position in the role hierarchy; higher levels include the privileges of lower ones.
    pub fn level(self) -> u8 {
        match self {
            Role::RegularUser => 0,
            Role::ProjectAdmin => 1,
            Role::SystemAdmin => 2,
        }
    }

    /// True when this role grants at least the privileges of `required`.
    pub fn includes(self, required: Role) -> bool {
        self.level() >= required.level()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::SystemAdmin => "SYSTEM_ADMIN",
            Role::ProjectAdmin => "PROJECT_ADMIN",
            Role::RegularUser => "REGULAR_USER",
        };
        f.write_str(name)
    }
}

/// The identity returned by `GET /api/v1/auth/me`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Accepts RFC 3339 timestamps with an offset, and naive ones (as stored by SQLite) taken as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    raw.parse::<NaiveDateTime>()
        .map(|naive| naive.and_utc())
        .map_err(|e| de::Error::custom(format!("invalid timestamp {raw:?}: {e}")))
}
