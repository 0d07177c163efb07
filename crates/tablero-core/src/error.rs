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

//! Error types for the permission-gating core

use thiserror::Error;

/// Errors raised while loading or interpreting permissions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermissionsError {
    #[error("Unknown module key: {0}")]
    UnknownModule(String),

    #[error("Permissions source unavailable: {message}")]
    SourceUnavailable { message: String },

    #[error("Malformed permissions response: {message}")]
    MalformedResponse { message: String },

    #[error("No authenticated identity")]
    NoIdentity,
}

impl From<serde_json::Error> for PermissionsError {
    fn from(err: serde_json::Error) -> Self {
        PermissionsError::MalformedResponse { message: err.to_string() }
    }
}

/// Result type for permission operations
pub type PermissionsResult<T> = Result<T, PermissionsError>;
