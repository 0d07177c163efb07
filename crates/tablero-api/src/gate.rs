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

//! Edge request gate
//!
//! Runs before routing on every request: resolves the session, applies the
//! public/protected route policy and either redirects or passes the request
//! on with the caller's session and permissions context attached. Cookies
//! produced while resolving the session are forwarded on every response.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{CACHE_CONTROL, HeaderValue, LOCATION, SET_COOKIE};
use hyper::{Request, Response, StatusCode};
use metrics::counter;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tablero_core::gate::{decide_protected, evaluate};
use tablero_core::{GateDecision, GateStep, RoleLookup, RouteTable};
use tower::{Layer, Service};
use tracing::{debug, info, warn};

use crate::backend::AuthBackend;
use crate::provider::PermissionsRegistry;
use crate::session::{Session, SessionResolver};

/// Outcome of running the gate on one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateOutcome {
    pub decision: GateDecision,
    /// `Set-Cookie` values to forward on the response
    pub set_cookies: Vec<String>,
}

/// Request-scoped policy enforcement; holds no state across requests
#[derive(Clone)]
pub struct EdgeGate {
    routes: Arc<RouteTable>,
    sessions: SessionResolver,
    backend: Arc<dyn AuthBackend>,
    registry: Arc<PermissionsRegistry>,
}

impl EdgeGate {
    pub fn new(routes: RouteTable, sessions: SessionResolver, backend: Arc<dyn AuthBackend>, registry: Arc<PermissionsRegistry>) -> Self {
        Self {
            routes: Arc::new(routes),
            sessions,
            backend,
            registry,
        }
    }

    /// Decide what happens to `req`.
    ///
    /// On pass-through with a session, the [`Session`] and the caller's
    /// permissions handle are inserted into the request extensions.
    pub async fn check<B>(&self, req: &mut Request<B>) -> GateOutcome {
        let path = req.uri().path().to_string();

        if self.routes.is_static_asset(&path) {
            return GateOutcome {
                decision: GateDecision::PassThrough,
                set_cookies: Vec::new(),
            };
        }

        let resolution = self.sessions.resolve(req.headers()).await;
        let route = self.routes.classify(&path);

        let decision = match evaluate(resolution.session.is_some(), route) {
            GateStep::Decided(decision) => decision,
            GateStep::NeedsRole => {
                let lookup = match &resolution.session {
                    Some(session) => self.lookup_role(session).await,
                    None => RoleLookup::Failed,
                };
                decide_protected(&lookup)
            }
        };

        match decision {
            GateDecision::PassThrough => {
                counter!("tablero_gate_decisions_total", 1, "decision" => "pass");
                debug!(%path, authenticated = resolution.session.is_some(), "Gate pass-through");
                if let Some(session) = resolution.session {
                    let handle = self.registry.attach(&session);
                    req.extensions_mut().insert(handle);
                    req.extensions_mut().insert(session);
                }
            }
            GateDecision::Redirect(target) => {
                counter!("tablero_gate_decisions_total", 1, "decision" => "redirect");
                info!(%path, location = target.path(), authenticated = resolution.session.is_some(), "Gate redirect");
            }
        }

        GateOutcome {
            decision,
            set_cookies: resolution.set_cookies,
        }
    }

    async fn lookup_role(&self, session: &Session) -> RoleLookup {
        match self.backend.lookup_role(session.user_id(), &session.tokens.access_token).await {
            Ok(Some(role)) => RoleLookup::Found(role),
            Ok(None) => {
                debug!(user_id = %session.user_id(), "No profile role found");
                RoleLookup::Missing
            }
            Err(e) => {
                warn!(user_id = %session.user_id(), error = %e, "Role lookup failed, denying");
                RoleLookup::Failed
            }
        }
    }
}

/// `307` redirect to `location`
pub fn redirect_response(location: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::TEMPORARY_REDIRECT;
    response.headers_mut().insert(LOCATION, HeaderValue::from_static(location));
    response.headers_mut().insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// Append gate cookies to a response.
///
/// A cookie the handler already set under the same name wins over the gate's.
pub fn append_set_cookies<B>(response: &mut Response<B>, set_cookies: &[String]) {
    for cookie in set_cookies {
        let name = cookie.split('=').next().unwrap_or_default();
        let already_set = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .any(|existing| existing.split('=').next() == Some(name));
        if already_set {
            continue;
        }

        match HeaderValue::from_str(cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => warn!(error = %e, "Dropping unrepresentable session cookie"),
        }
    }
}

/// Edge gate middleware
#[derive(Clone)]
pub struct EdgeGateMiddleware<S> {
    inner: S,
    gate: EdgeGate,
}

impl<S> EdgeGateMiddleware<S> {
    pub fn new(inner: S, gate: EdgeGate) -> Self {
        Self { inner, gate }
    }
}

impl<S, ReqBody> Service<Request<ReqBody>> for EdgeGateMiddleware<S>
where
    S: Service<Request<ReqBody>, Response = Response<Full<Bytes>>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ReqBody: Send + 'static,
{
    type Response = Response<Full<Bytes>>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let gate = self.gate.clone();
        // Take the service that was driven to readiness and leave a clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let outcome = gate.check(&mut req).await;

            let mut response = match outcome.decision {
                GateDecision::PassThrough => inner.call(req).await?,
                GateDecision::Redirect(target) => redirect_response(target.path()),
            };

            append_set_cookies(&mut response, &outcome.set_cookies);
            Ok(response)
        })
    }
}

/// Edge gate layer
#[derive(Clone)]
pub struct EdgeGateLayer {
    gate: EdgeGate,
}

impl EdgeGateLayer {
    pub fn new(gate: EdgeGate) -> Self {
        Self { gate }
    }
}

impl<S> Layer<S> for EdgeGateLayer {
    type Service = EdgeGateMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        EdgeGateMiddleware::new(inner, self.gate.clone())
    }
}
