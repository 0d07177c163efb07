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

//! Feature modules gated by per-user flags

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PermissionsError;

/// Closed set of dashboard modules that carry their own permission flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleKey {
    #[serde(rename = "mod_tareas")]
    Tareas,
    #[serde(rename = "mod_calendario")]
    Calendario,
    #[serde(rename = "mod_revenue")]
    Revenue,
    #[serde(rename = "mod_finanzas")]
    Finanzas,
    #[serde(rename = "mod_producto")]
    Producto,
}

impl ModuleKey {
    pub const ALL: [ModuleKey; 5] = [ModuleKey::Tareas, ModuleKey::Calendario, ModuleKey::Revenue, ModuleKey::Finanzas, ModuleKey::Producto];

    /// Flag name as stored by the backend
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKey::Tareas => "mod_tareas",
            ModuleKey::Calendario => "mod_calendario",
            ModuleKey::Revenue => "mod_revenue",
            ModuleKey::Finanzas => "mod_finanzas",
            ModuleKey::Producto => "mod_producto",
        }
    }

    /// Human readable module title
    pub fn title(&self) -> &'static str {
        match self {
            ModuleKey::Tareas => "Tareas",
            ModuleKey::Calendario => "Calendario",
            ModuleKey::Revenue => "Revenue",
            ModuleKey::Finanzas => "Finanzas",
            ModuleKey::Producto => "Producto",
        }
    }

    /// Page path serving this module
    pub fn path(&self) -> &'static str {
        match self {
            ModuleKey::Tareas => "/tareas",
            ModuleKey::Calendario => "/calendario",
            ModuleKey::Revenue => "/revenue",
            ModuleKey::Finanzas => "/finanzas",
            ModuleKey::Producto => "/producto",
        }
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleKey {
    type Err = PermissionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModuleKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| PermissionsError::UnknownModule(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_key_parsing() {
        for key in ModuleKey::ALL {
            assert_eq!(key.as_str().parse::<ModuleKey>().unwrap(), key);
        }

        let err = "mod_marketing".parse::<ModuleKey>().unwrap_err();
        assert!(matches!(err, PermissionsError::UnknownModule(name) if name == "mod_marketing"));
    }

    #[test]
    fn test_module_paths_are_distinct() {
        let mut paths: Vec<_> = ModuleKey::ALL.iter().map(|k| k.path()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), ModuleKey::ALL.len());
    }
}
