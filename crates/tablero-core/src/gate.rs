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

//! Decision table of the edge request gate
//!
//! The gate resolves the caller's session, classifies the path and, only for
//! protected paths, looks up the caller's role. This module holds the pure
//! part of that flow so the transport layer only performs the I/O.

use crate::role::Role;
use crate::routes::{HOME_PATH, LOGIN_PATH, RouteClass};

/// Where a rejected request is sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectTarget {
    Login,
    Home,
}

impl RedirectTarget {
    pub fn path(&self) -> &'static str {
        match self {
            RedirectTarget::Login => LOGIN_PATH,
            RedirectTarget::Home => HOME_PATH,
        }
    }
}

/// Final outcome for a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    PassThrough,
    Redirect(RedirectTarget),
}

/// Outcome of the first, session-only evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateStep {
    Decided(GateDecision),
    /// Session present on a protected path; the role must be looked up
    NeedsRole,
}

/// Result of the role lookup against the profile store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleLookup {
    Found(Role),
    Missing,
    Failed,
}

/// Evaluate everything that does not need the role lookup
pub fn evaluate(session_present: bool, route: RouteClass) -> GateStep {
    match (session_present, route.is_public, route.is_protected) {
        (false, true, _) => GateStep::Decided(GateDecision::PassThrough),
        (false, false, _) => GateStep::Decided(GateDecision::Redirect(RedirectTarget::Login)),
        (true, _, false) => GateStep::Decided(GateDecision::PassThrough),
        (true, _, true) => GateStep::NeedsRole,
    }
}

/// Finish a protected-path evaluation. Lookup failures and missing rows deny.
pub fn decide_protected(lookup: &RoleLookup) -> GateDecision {
    match lookup {
        RoleLookup::Found(role) if role.is_elevated() => GateDecision::PassThrough,
        _ => GateDecision::Redirect(RedirectTarget::Home),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(is_public: bool, is_protected: bool) -> RouteClass {
        RouteClass { is_public, is_protected }
    }

    #[test]
    fn test_decision_table() {
        assert_eq!(evaluate(false, route(true, false)), GateStep::Decided(GateDecision::PassThrough));
        assert_eq!(evaluate(false, route(false, false)), GateStep::Decided(GateDecision::Redirect(RedirectTarget::Login)));
        assert_eq!(evaluate(false, route(false, true)), GateStep::Decided(GateDecision::Redirect(RedirectTarget::Login)));
        assert_eq!(evaluate(true, route(false, false)), GateStep::Decided(GateDecision::PassThrough));
        assert_eq!(evaluate(true, route(true, false)), GateStep::Decided(GateDecision::PassThrough));
        assert_eq!(evaluate(true, route(false, true)), GateStep::NeedsRole);
    }

    #[test]
    fn test_protected_role_check() {
        assert_eq!(decide_protected(&RoleLookup::Found(Role::SuperAdmin)), GateDecision::PassThrough);
        assert_eq!(decide_protected(&RoleLookup::Found(Role::Owner)), GateDecision::PassThrough);
        assert_eq!(decide_protected(&RoleLookup::Found(Role::Other("member".to_string()))), GateDecision::Redirect(RedirectTarget::Home));
        assert_eq!(decide_protected(&RoleLookup::Missing), GateDecision::Redirect(RedirectTarget::Home));
        assert_eq!(decide_protected(&RoleLookup::Failed), GateDecision::Redirect(RedirectTarget::Home));
    }

    #[test]
    fn test_redirect_paths() {
        assert_eq!(RedirectTarget::Login.path(), "/login");
        assert_eq!(RedirectTarget::Home.path(), "/");
    }
}
