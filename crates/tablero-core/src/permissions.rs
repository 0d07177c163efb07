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

//! The `UserPermissions` entity and the RPC row it is built from

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PermissionsResult;
use crate::module::ModuleKey;
use crate::role::{Role, deserialize_optional_role};

/// Name of the backend RPC returning the caller's role and module flags
pub const PERMISSIONS_RPC: &str = "get_user_role_and_permissions";

/// One boolean per feature module
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleFlags {
    pub mod_tareas: bool,
    pub mod_calendario: bool,
    pub mod_revenue: bool,
    pub mod_finanzas: bool,
    pub mod_producto: bool,
}

impl ModuleFlags {
    /// Flag value for a module
    pub fn get(&self, key: ModuleKey) -> bool {
        match key {
            ModuleKey::Tareas => self.mod_tareas,
            ModuleKey::Calendario => self.mod_calendario,
            ModuleKey::Revenue => self.mod_revenue,
            ModuleKey::Finanzas => self.mod_finanzas,
            ModuleKey::Producto => self.mod_producto,
        }
    }

    /// Set a single module flag
    pub fn set(&mut self, key: ModuleKey, value: bool) {
        match key {
            ModuleKey::Tareas => self.mod_tareas = value,
            ModuleKey::Calendario => self.mod_calendario = value,
            ModuleKey::Revenue => self.mod_revenue = value,
            ModuleKey::Finanzas => self.mod_finanzas = value,
            ModuleKey::Producto => self.mod_producto = value,
        }
    }

    /// Modules whose flag is set
    pub fn enabled(&self) -> Vec<ModuleKey> {
        ModuleKey::ALL.into_iter().filter(|key| self.get(*key)).collect()
    }
}

/// Role and module flags of the current user.
///
/// `role == None` means the account exists but has not been provisioned yet;
/// in that state the flags carry no meaning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserPermissions {
    pub role: Option<Role>,
    #[serde(flatten)]
    pub flags: ModuleFlags,
}

impl UserPermissions {
    pub fn new(role: Option<Role>, flags: ModuleFlags) -> Self {
        Self { role, flags }
    }

    /// Whether the user may open a module, honouring the superadmin bypass
    pub fn can_access(&self, key: ModuleKey) -> bool {
        match &self.role {
            None => false,
            Some(role) if role.is_superadmin() => true,
            Some(_) => self.flags.get(key),
        }
    }

    /// Modules the user may open, in display order
    pub fn accessible_modules(&self) -> Vec<ModuleKey> {
        ModuleKey::ALL.into_iter().filter(|key| self.can_access(*key)).collect()
    }
}

/// One row returned by [`PERMISSIONS_RPC`].
///
/// Missing or null booleans decode as `false`. `mod_producto` is kept optional
/// so callers can tell "not returned" apart from "returned false".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PermissionRow {
    #[serde(default, deserialize_with = "deserialize_optional_role")]
    pub role: Option<Role>,
    #[serde(default)]
    pub mod_tareas: Option<bool>,
    #[serde(default)]
    pub mod_calendario: Option<bool>,
    #[serde(default)]
    pub mod_revenue: Option<bool>,
    #[serde(default)]
    pub mod_finanzas: Option<bool>,
    #[serde(default)]
    pub mod_producto: Option<bool>,
}

impl PermissionRow {
    /// Whether the backend sent a value for `mod_producto`
    pub fn has_producto_flag(&self) -> bool {
        self.mod_producto.is_some()
    }
}

impl From<PermissionRow> for UserPermissions {
    fn from(row: PermissionRow) -> Self {
        UserPermissions {
            role: row.role,
            flags: ModuleFlags {
                mod_tareas: row.mod_tareas.unwrap_or(false),
                mod_calendario: row.mod_calendario.unwrap_or(false),
                mod_revenue: row.mod_revenue.unwrap_or(false),
                mod_finanzas: row.mod_finanzas.unwrap_or(false),
                mod_producto: row.mod_producto.unwrap_or(false),
            },
        }
    }
}

/// Decode the JSON body of the permissions RPC into rows
pub fn parse_permission_rows(body: &[u8]) -> PermissionsResult<Vec<PermissionRow>> {
    Ok(serde_json::from_slice(body)?)
}

/// Authenticated identity handed down by the auth layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: Option<String>,
    /// Bearer token the permissions RPC is invoked with
    pub access_token: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            access_token: access_token.into(),
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Remote source of permission rows
#[async_trait]
pub trait PermissionsSource: Send + Sync {
    /// Invoke the permissions RPC on behalf of `identity`
    async fn fetch_permissions(&self, identity: &Identity) -> PermissionsResult<Vec<PermissionRow>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rpc_rows() {
        let body = br#"[
            {"role": "member", "mod_tareas": true, "mod_calendario": false, "mod_revenue": null, "mod_finanzas": true},
            {"role": "superadmin", "mod_tareas": false}
        ]"#;

        let rows = parse_permission_rows(body).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(!rows[0].has_producto_flag());

        let permissions = UserPermissions::from(rows[0].clone());
        assert_eq!(permissions.role, Some(Role::Other("member".to_string())));
        assert!(permissions.flags.mod_tareas);
        assert!(!permissions.flags.mod_revenue);
        assert!(permissions.flags.mod_finanzas);
        assert!(!permissions.flags.mod_producto);
    }

    #[test]
    fn test_parse_null_role() {
        let rows = parse_permission_rows(br#"[{"role": null, "mod_tareas": true}]"#).unwrap();
        let permissions = UserPermissions::from(rows[0].clone());
        assert_eq!(permissions.role, None);
        assert!(!permissions.can_access(ModuleKey::Tareas));
    }

    #[test]
    fn test_parse_malformed_body() {
        assert!(parse_permission_rows(b"{\"error\": \"boom\"}").is_err());
        assert!(parse_permission_rows(b"not json").is_err());
    }

    #[test]
    fn test_superadmin_bypass() {
        let permissions = UserPermissions::new(Some(Role::SuperAdmin), ModuleFlags::default());
        assert_eq!(permissions.accessible_modules(), ModuleKey::ALL.to_vec());
    }

    #[test]
    fn test_flag_accessors() {
        let mut flags = ModuleFlags::default();
        flags.set(ModuleKey::Calendario, true);
        flags.set(ModuleKey::Producto, true);
        assert_eq!(flags.enabled(), vec![ModuleKey::Calendario, ModuleKey::Producto]);

        let permissions = UserPermissions::new(Some(Role::Owner), flags);
        assert!(permissions.can_access(ModuleKey::Calendario));
        assert!(!permissions.can_access(ModuleKey::Finanzas));
    }

    #[test]
    fn test_permissions_serialize_flat() {
        let permissions = UserPermissions::new(Some(Role::Owner), ModuleFlags { mod_tareas: true, ..Default::default() });
        let value = serde_json::to_value(&permissions).unwrap();
        assert_eq!(value["role"], "Dueño");
        assert_eq!(value["mod_tareas"], true);
        assert_eq!(value["mod_producto"], false);
    }
}
