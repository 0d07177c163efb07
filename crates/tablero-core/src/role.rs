// Tablero
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! User roles as returned by the backend profile store

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Backend string for the universal-access role
pub const SUPERADMIN: &str = "superadmin";

/// Backend string for the business owner role
pub const OWNER: &str = "Dueño";

/// Privilege tier of an authenticated user.
///
/// Only [`Role::SuperAdmin`] and [`Role::Owner`] are elevated. Any other role
/// string the backend hands out is kept verbatim in [`Role::Other`] so it can be
/// displayed, but it never grants access to protected areas on its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    SuperAdmin,
    Owner,
    Other(String),
}

impl Role {
    /// Parse a backend role string. Blank strings are treated as "no role".
    pub fn parse(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        match trimmed {
            "" => None,
            SUPERADMIN => Some(Role::SuperAdmin),
            OWNER => Some(Role::Owner),
            other => Some(Role::Other(other.to_string())),
        }
    }

    /// The backend string for this role
    pub fn as_str(&self) -> &str {
        match self {
            Role::SuperAdmin => SUPERADMIN,
            Role::Owner => OWNER,
            Role::Other(name) => name,
        }
    }

    /// Whether this role bypasses every module flag
    pub fn is_superadmin(&self) -> bool {
        matches!(self, Role::SuperAdmin)
    }

    /// Whether this role may enter admin, finance and revenue paths
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::SuperAdmin | Role::Owner)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Role {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Deserializes a nullable role column; `null` and blank strings become `None`.
pub fn deserialize_optional_role<'de, D>(deserializer: D) -> Result<Option<Role>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(Role::parse))
}
