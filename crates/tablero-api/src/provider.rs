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

//! Owner of every session's permissions context
//!
//! The registry is built once at the composition root. The edge gate attaches
//! the caller's context to each authenticated request; handlers read it back
//! through [`PermissionsHandle::from_request`].

use dashmap::DashMap;
use hyper::Request;
use metrics::counter;
use parking_lot::Mutex;
use std::ops::Deref;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tablero_core::{AuthState, PermissionsContext, PermissionsSource};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::{ApiError, ApiResult};
use crate::session::Session;

/// Cheap clonable reference to one session's permissions context
#[derive(Clone)]
pub struct PermissionsHandle(Arc<PermissionsContext>);

impl PermissionsHandle {
    pub fn new(context: Arc<PermissionsContext>) -> Self {
        Self(context)
    }

    /// Permissions context attached to a request by the edge gate.
    ///
    /// A missing context means the handler was mounted outside the gate; this
    /// is reported as an internal error rather than as empty permissions.
    pub fn from_request<B>(req: &Request<B>) -> ApiResult<Self> {
        req.extensions().get::<PermissionsHandle>().cloned().ok_or_else(|| {
            error!(path = %req.uri().path(), "Permissions context read outside the edge gate");
            ApiError::ContextMissing {
                message: format!("no permissions context attached to {}", req.uri().path()),
            }
        })
    }
}

impl Deref for PermissionsHandle {
    type Target = PermissionsContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

struct Entry {
    context: Arc<PermissionsContext>,
    auth: watch::Sender<AuthState>,
    last_seen: Mutex<Instant>,
}

impl Entry {
    fn is_idle(&self, ttl: Duration) -> bool {
        self.last_seen.lock().elapsed() > ttl
    }

    /// Sign the context out; dropping the entry afterwards stops its driver
    fn close(self) {
        self.context.sign_out();
        self.auth.send_replace(AuthState::SignedOut);
    }
}

/// Per-user permissions contexts keyed by user id.
///
/// An entry not attached for longer than the idle TTL is signed out and
/// dropped, either when its user comes back or by the periodic sweep.
pub struct PermissionsRegistry {
    source: Arc<dyn PermissionsSource>,
    entries: DashMap<String, Entry>,
    idle_ttl: Duration,
}

impl PermissionsRegistry {
    pub fn new(source: Arc<dyn PermissionsSource>, idle_ttl: Duration) -> Self {
        Self {
            source,
            entries: DashMap::new(),
            idle_ttl,
        }
    }

    /// Context for the session's user, created and signed in on first use.
    ///
    /// Later calls for the same user only refresh the stored credentials.
    pub fn attach(&self, session: &Session) -> PermissionsHandle {
        let identity = session.identity();

        if let Some((_, stale)) = self.entries.remove_if(&identity.user_id, |_, entry| entry.is_idle(self.idle_ttl)) {
            info!(user_id = %identity.user_id, "Idle permissions context replaced");
            counter!("tablero_permissions_contexts_evicted_total", 1, "reason" => "access");
            stale.close();
        }

        let entry = self.entries.entry(identity.user_id.clone()).or_insert_with(|| {
            info!(user_id = %identity.user_id, "Creating permissions context");
            let context = Arc::new(PermissionsContext::new(self.source.clone()));
            let (auth, auth_rx) = watch::channel(AuthState::Loading);
            context.drive(auth_rx);
            Entry {
                context,
                auth,
                last_seen: Mutex::new(Instant::now()),
            }
        });
        *entry.last_seen.lock() = Instant::now();

        if !entry.context.update_credentials(&identity) {
            debug!(user_id = %identity.user_id, "Publishing signed-in identity");
            entry.auth.send_replace(AuthState::SignedIn(identity));
        }

        PermissionsHandle::new(entry.context.clone())
    }

    /// Sign the user out and drop their context. Returns whether one existed.
    pub fn detach(&self, user_id: &str) -> bool {
        match self.entries.remove(user_id) {
            Some((_, entry)) => {
                entry.close();
                info!(user_id = %user_id, "Permissions context discarded");
                true
            }
            None => false,
        }
    }

    /// Sign out and drop every idle context. Returns how many were dropped.
    pub fn evict_idle(&self) -> usize {
        let idle: Vec<String> = self.entries.iter().filter(|entry| entry.is_idle(self.idle_ttl)).map(|entry| entry.key().clone()).collect();

        let mut evicted = 0;
        for user_id in idle {
            // Re-checked under the shard lock; the user may have come back
            if let Some((_, entry)) = self.entries.remove_if(&user_id, |_, entry| entry.is_idle(self.idle_ttl)) {
                entry.close();
                evicted += 1;
            }
        }

        if evicted > 0 {
            counter!("tablero_permissions_contexts_evicted_total", evicted as u64, "reason" => "idle");
            debug!(evicted, remaining = self.entries.len(), "Evicted idle permissions contexts");
        }
        evicted
    }

    /// Start the background sweep of idle contexts
    pub fn start_sweeper(registry: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                registry.evict_idle();
            }
        })
    }

    pub fn get(&self, user_id: &str) -> Option<PermissionsHandle> {
        self.entries.get(user_id).map(|entry| PermissionsHandle::new(entry.context.clone()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{AuthUser, SessionTokens};
    use async_trait::async_trait;
    use std::time::Duration;
    use tablero_core::{Identity, PermissionRow, PermissionsResult, PermissionsStatus, Role};

    struct OwnerSource;

    #[async_trait]
    impl PermissionsSource for OwnerSource {
        async fn fetch_permissions(&self, _identity: &Identity) -> PermissionsResult<Vec<PermissionRow>> {
            Ok(vec![PermissionRow {
                role: Some(Role::Owner),
                mod_revenue: Some(true),
                ..Default::default()
            }])
        }
    }

    fn session(user_id: &str, token: &str) -> Session {
        Session {
            user: AuthUser {
                id: user_id.to_string(),
                email: None,
            },
            tokens: SessionTokens {
                access_token: token.to_string(),
                refresh_token: "refresh".to_string(),
                expires_at: 4_000_000_000,
            },
        }
    }

    #[tokio::test]
    async fn test_attach_fetches_once_per_user() {
        let registry = PermissionsRegistry::new(Arc::new(OwnerSource), Duration::from_secs(600));

        let handle = registry.attach(&session("u-1", "t1"));
        let snapshot = handle.wait_settled(Duration::from_secs(5)).await;
        assert_eq!(snapshot.status, PermissionsStatus::Resolved);
        assert_eq!(snapshot.role(), Some(&Role::Owner));

        // Same user with a refreshed token reuses the context without a fetch
        let again = registry.attach(&session("u-1", "t2"));
        assert_eq!(again.remote_calls(), 1);
        assert_eq!(again.identity().unwrap().access_token, "t2");
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_detach_signs_out() {
        let registry = PermissionsRegistry::new(Arc::new(OwnerSource), Duration::from_secs(600));
        let handle = registry.attach(&session("u-1", "t1"));
        handle.wait_settled(Duration::from_secs(5)).await;

        assert!(registry.detach("u-1"));
        assert!(!registry.detach("u-1"));
        assert!(registry.is_empty());
        assert!(registry.get("u-1").is_none());

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.status, PermissionsStatus::SignedOut);
        assert_eq!(snapshot.role(), None);
    }

    #[tokio::test]
    async fn test_evict_idle_signs_out() {
        let registry = PermissionsRegistry::new(Arc::new(OwnerSource), Duration::from_millis(10));
        let handle = registry.attach(&session("u-1", "t1"));
        handle.wait_settled(Duration::from_secs(5)).await;

        assert_eq!(registry.evict_idle(), 0);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(registry.evict_idle(), 1);
        assert!(registry.is_empty());
        assert_eq!(handle.snapshot().status, PermissionsStatus::SignedOut);
    }

    #[tokio::test]
    async fn test_idle_context_is_replaced_on_access() {
        let registry = PermissionsRegistry::new(Arc::new(OwnerSource), Duration::from_millis(10));
        let old = registry.attach(&session("u-1", "t1"));
        old.wait_settled(Duration::from_secs(5)).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        let fresh = registry.attach(&session("u-1", "t2"));
        let snapshot = fresh.wait_settled(Duration::from_secs(5)).await;

        assert_eq!(old.snapshot().status, PermissionsStatus::SignedOut);
        assert_eq!(snapshot.status, PermissionsStatus::Resolved);
        assert_eq!(fresh.remote_calls(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_sweeper_evicts_in_background() {
        let registry = Arc::new(PermissionsRegistry::new(Arc::new(OwnerSource), Duration::from_millis(10)));
        registry.attach(&session("u-1", "t1")).wait_settled(Duration::from_secs(5)).await;

        let sweeper = PermissionsRegistry::start_sweeper(registry.clone(), Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(100)).await;
        sweeper.abort();

        assert!(registry.is_empty());
    }

    #[test]
    fn test_from_request_without_gate() {
        let req = Request::builder().uri("/tareas").body(()).unwrap();
        let err = PermissionsHandle::from_request(&req).err().unwrap();
        assert!(matches!(err, ApiError::ContextMissing { .. }));
    }
}
