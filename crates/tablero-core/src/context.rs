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

//! Session-scoped permissions context
//!
//! A [`PermissionsContext`] caches the role and module flags of one signed-in
//! user. It follows an upstream [`AuthState`] channel: nothing is fetched while
//! the upstream is loading, a new identity triggers exactly one fetch, and a
//! sign-out resets the cache without touching the network.
//!
//! Every fetch and every sign-out takes a new generation number. A fetch only
//! publishes its result if its generation is still current, so an older
//! request resolving late can never overwrite newer state.

use metrics::counter;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::module::ModuleKey;
use crate::permissions::{Identity, PERMISSIONS_RPC, PermissionsSource, UserPermissions};
use crate::role::Role;

/// State published by the upstream auth layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// The upstream has not resolved the session yet
    Loading,
    SignedIn(Identity),
    SignedOut,
}

/// Lifecycle of the cached permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionsStatus {
    /// Nothing fetched yet
    Loading,
    /// A fetch is in flight
    Fetching,
    /// The last fetch returned at least one row
    Resolved,
    /// The last fetch returned no rows; prior values were kept
    Empty,
    /// The last fetch failed; prior values were kept
    Degraded,
    /// No identity; all flags cleared
    SignedOut,
}

/// Point-in-time view of a context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionsSnapshot {
    pub permissions: UserPermissions,
    pub status: PermissionsStatus,
    pub generation: u64,
}

impl PermissionsSnapshot {
    fn initial() -> Self {
        Self {
            permissions: UserPermissions::default(),
            status: PermissionsStatus::Loading,
            generation: 0,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.status, PermissionsStatus::Loading | PermissionsStatus::Fetching)
    }

    pub fn is_degraded(&self) -> bool {
        self.status == PermissionsStatus::Degraded
    }

    pub fn role(&self) -> Option<&Role> {
        self.permissions.role.as_ref()
    }

    pub fn flag(&self, key: ModuleKey) -> bool {
        self.permissions.flags.get(key)
    }
}

/// In-memory permissions cache for one browser session
pub struct PermissionsContext {
    source: Arc<dyn PermissionsSource>,
    state: watch::Sender<PermissionsSnapshot>,
    identity: Mutex<Option<Identity>>,
    generation: AtomicU64,
    remote_calls: AtomicU64,
}

impl PermissionsContext {
    pub fn new(source: Arc<dyn PermissionsSource>) -> Self {
        let (state, _) = watch::channel(PermissionsSnapshot::initial());
        Self {
            source,
            state,
            identity: Mutex::new(None),
            generation: AtomicU64::new(0),
            remote_calls: AtomicU64::new(0),
        }
    }

    /// Current state
    pub fn snapshot(&self) -> PermissionsSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<PermissionsSnapshot> {
        self.state.subscribe()
    }

    /// Identity the next fetch will use
    pub fn identity(&self) -> Option<Identity> {
        self.identity.lock().clone()
    }

    /// Number of RPC calls issued so far
    pub fn remote_calls(&self) -> u64 {
        self.remote_calls.load(Ordering::SeqCst)
    }

    /// React to a new upstream auth state
    pub async fn apply_auth(&self, auth: &AuthState) {
        match auth {
            AuthState::Loading => {
                debug!("Upstream auth still loading, permissions fetch deferred");
            }
            AuthState::SignedOut => self.sign_out(),
            AuthState::SignedIn(identity) => {
                let changed = {
                    let mut current = self.identity.lock();
                    let changed = current.as_ref() != Some(identity);
                    *current = Some(identity.clone());
                    changed
                };

                let status = self.snapshot().status;
                if changed || matches!(status, PermissionsStatus::Loading | PermissionsStatus::SignedOut) {
                    self.refetch().await;
                } else {
                    debug!(user_id = %identity.user_id, "Identity unchanged, keeping cached permissions");
                }
            }
        }
    }

    /// Replace the stored credentials of the same user without refetching.
    ///
    /// Returns `false` when `identity` belongs to a different user.
    pub fn update_credentials(&self, identity: &Identity) -> bool {
        let mut current = self.identity.lock();
        match current.as_mut() {
            Some(existing) if existing.user_id == identity.user_id => {
                *existing = identity.clone();
                true
            }
            _ => false,
        }
    }

    /// Fetch permissions again for the current identity.
    ///
    /// Performs exactly one RPC call and replaces every field from the first
    /// returned row. Empty results and failures keep the previous values.
    /// Without an identity this is a no-op.
    pub async fn refetch(&self) -> PermissionsSnapshot {
        let Some(identity) = self.identity() else {
            debug!("Permissions refetch requested without an identity");
            return self.snapshot();
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|snapshot| {
            snapshot.status = PermissionsStatus::Fetching;
            snapshot.generation = generation;
        });

        self.remote_calls.fetch_add(1, Ordering::SeqCst);
        debug!(user_id = %identity.user_id, generation, rpc = PERMISSIONS_RPC, "Fetching permissions");
        let result = self.source.fetch_permissions(&identity).await;

        self.state.send_if_modified(|snapshot| {
            if self.generation.load(Ordering::SeqCst) != generation {
                debug!(user_id = %identity.user_id, generation, "Discarding stale permissions fetch");
                return false;
            }

            match result {
                Ok(rows) => match rows.into_iter().next() {
                    Some(row) => {
                        if !row.has_producto_flag() {
                            debug!(user_id = %identity.user_id, "Permissions RPC did not return mod_producto; treating it as false");
                        }
                        snapshot.permissions = UserPermissions::from(row);
                        snapshot.status = PermissionsStatus::Resolved;
                        counter!("tablero_permissions_fetch_total", 1, "outcome" => "resolved");
                        info!(
                            user_id = %identity.user_id,
                            role = ?snapshot.permissions.role.as_ref().map(Role::as_str),
                            "Permissions resolved"
                        );
                    }
                    None => {
                        snapshot.status = PermissionsStatus::Empty;
                        counter!("tablero_permissions_fetch_total", 1, "outcome" => "empty");
                        warn!(user_id = %identity.user_id, "Permissions RPC returned no rows");
                    }
                },
                Err(e) => {
                    snapshot.status = PermissionsStatus::Degraded;
                    counter!("tablero_permissions_fetch_total", 1, "outcome" => "error");
                    warn!(user_id = %identity.user_id, error = %e, "Permissions fetch failed, serving degraded permissions");
                }
            }
            true
        });

        self.snapshot()
    }

    /// Drop the identity and reset to the signed-out defaults
    pub fn sign_out(&self) {
        *self.identity.lock() = None;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|snapshot| {
            *snapshot = PermissionsSnapshot {
                permissions: UserPermissions::default(),
                status: PermissionsStatus::SignedOut,
                generation,
            };
        });
        debug!(generation, "Permissions reset after sign-out");
    }

    /// Wait until no fetch is in flight, giving up after `timeout`
    pub async fn wait_settled(&self, timeout: Duration) -> PermissionsSnapshot {
        let mut rx = self.subscribe();
        if tokio::time::timeout(timeout, rx.wait_for(|snapshot| !snapshot.is_loading())).await.is_err() {
            debug!(?timeout, "Permissions still loading after wait");
        }
        self.snapshot()
    }

    /// Follow an upstream auth channel until it closes
    pub fn drive(self: &Arc<Self>, mut auth: watch::Receiver<AuthState>) -> JoinHandle<()> {
        let context = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let state = auth.borrow_and_update().clone();
                context.apply_auth(&state).await;

                if auth.changed().await.is_err() {
                    debug!("Auth channel closed, permissions driver stopping");
                    break;
                }
            }
        })
    }
}
