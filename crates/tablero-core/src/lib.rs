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

//! Tablero permission-gating core
//!
//! Pure domain for the dashboard's access control: roles and module keys,
//! the `UserPermissions` entity, route classification and the edge gate's
//! decision table, the session-scoped permissions context and the module guard.

pub mod context;
pub mod error;
pub mod gate;
pub mod guard;
pub mod module;
pub mod permissions;
pub mod role;
pub mod routes;

pub use context::{AuthState, PermissionsContext, PermissionsSnapshot, PermissionsStatus};
pub use error::{PermissionsError, PermissionsResult};
pub use gate::{GateDecision, GateStep, RedirectTarget, RoleLookup};
pub use guard::{GuardDecision, ModuleGuard};
pub use module::ModuleKey;
pub use permissions::{Identity, ModuleFlags, PermissionRow, PermissionsSource, UserPermissions};
pub use role::Role;
pub use routes::{RouteClass, RouteTable};
