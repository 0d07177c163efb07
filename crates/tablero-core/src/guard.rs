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

//! Module guard: decides what a module page may render

use serde::Serialize;

use crate::context::PermissionsSnapshot;
use crate::module::ModuleKey;

/// What a guarded page renders instead of, or as, its content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardDecision {
    Loading,
    /// Signed in but no role has been assigned yet
    PendingApproval,
    AccessDenied,
    Granted,
}

impl GuardDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, GuardDecision::Granted)
    }
}

/// Gate for one module flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleGuard {
    module: ModuleKey,
}

impl ModuleGuard {
    pub fn new(module: ModuleKey) -> Self {
        Self { module }
    }

    pub fn module(&self) -> ModuleKey {
        self.module
    }

    /// Evaluate the guard against a permissions snapshot.
    ///
    /// Order matters: loading, then missing role, then the superadmin bypass,
    /// then the module flag.
    pub fn evaluate(&self, snapshot: &PermissionsSnapshot) -> GuardDecision {
        if snapshot.is_loading() {
            return GuardDecision::Loading;
        }

        match snapshot.role() {
            None => GuardDecision::PendingApproval,
            Some(role) if role.is_superadmin() => GuardDecision::Granted,
            Some(_) if !snapshot.flag(self.module) => GuardDecision::AccessDenied,
            Some(_) => GuardDecision::Granted,
        }
    }
}
