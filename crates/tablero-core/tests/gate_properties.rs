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

//! Property tests for route classification, the gate decision table and the
//! module guard.

use proptest::prelude::*;
use tablero_core::gate::{decide_protected, evaluate};
use tablero_core::routes::{PROTECTED_ROUTES, PUBLIC_ROUTES};
use tablero_core::{
    GateDecision, GateStep, GuardDecision, ModuleFlags, ModuleGuard, ModuleKey, PermissionsSnapshot, PermissionsStatus, RedirectTarget, Role, RoleLookup, RouteTable,
    UserPermissions,
};

fn suffix() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), "/[a-z0-9]{1,12}", "/[a-z0-9]{1,8}/[a-z0-9]{1,8}"]
}

fn plain_role() -> impl Strategy<Value = Role> {
    "[a-z]{3,10}".prop_filter("not a privileged role", |s| s != "superadmin").prop_map(Role::Other)
}

fn flags() -> impl Strategy<Value = ModuleFlags> {
    (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(t, c, r, f, p)| ModuleFlags {
        mod_tareas: t,
        mod_calendario: c,
        mod_revenue: r,
        mod_finanzas: f,
        mod_producto: p,
    })
}

fn module_key() -> impl Strategy<Value = ModuleKey> {
    prop::sample::select(ModuleKey::ALL.to_vec())
}

fn resolved(role: Option<Role>, flags: ModuleFlags) -> PermissionsSnapshot {
    PermissionsSnapshot {
        permissions: UserPermissions::new(role, flags),
        status: PermissionsStatus::Resolved,
        generation: 1,
    }
}

proptest! {
    #[test]
    fn protected_path_with_plain_role_redirects_home(
        prefix in prop::sample::select(PROTECTED_ROUTES.to_vec()),
        rest in suffix(),
        role in plain_role(),
    ) {
        let table = RouteTable::default();
        let path = format!("{prefix}{rest}");
        let class = table.classify(&path);

        prop_assert_eq!(evaluate(true, class), GateStep::NeedsRole);
        prop_assert_eq!(decide_protected(&RoleLookup::Found(role)), GateDecision::Redirect(RedirectTarget::Home));
    }

    #[test]
    fn public_path_without_session_passes(
        prefix in prop::sample::select(PUBLIC_ROUTES.to_vec()),
        rest in suffix(),
    ) {
        let table = RouteTable::default();
        let class = table.classify(&format!("{prefix}{rest}"));
        prop_assert_eq!(evaluate(false, class), GateStep::Decided(GateDecision::PassThrough));
    }

    #[test]
    fn unlisted_path_without_session_redirects_to_login(segment in "[a-z]{1,12}", rest in suffix()) {
        let table = RouteTable::default();
        let path = format!("/x-{segment}{rest}");
        let class = table.classify(&path);

        prop_assert!(!class.is_public && !class.is_protected);
        prop_assert_eq!(evaluate(false, class), GateStep::Decided(GateDecision::Redirect(RedirectTarget::Login)));
    }

    #[test]
    fn missing_role_is_always_pending(flags in flags(), key in module_key()) {
        let decision = ModuleGuard::new(key).evaluate(&resolved(None, flags));
        prop_assert_eq!(decision, GuardDecision::PendingApproval);
    }

    #[test]
    fn superadmin_is_always_granted(flags in flags(), key in module_key()) {
        let decision = ModuleGuard::new(key).evaluate(&resolved(Some(Role::SuperAdmin), flags));
        prop_assert_eq!(decision, GuardDecision::Granted);
    }

    #[test]
    fn plain_role_follows_the_flag(role in plain_role(), flags in flags(), key in module_key()) {
        let decision = ModuleGuard::new(key).evaluate(&resolved(Some(role), flags));
        let expected = if flags.get(key) { GuardDecision::Granted } else { GuardDecision::AccessDenied };
        prop_assert_eq!(decision, expected);
    }
}
