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

//! HTTP routing for the dashboard
//!
//! Policy is enforced by the edge gate before a request reaches the router;
//! the router only maps paths to handlers.

use crate::backend::AuthBackend;
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{auth, health, modules, permissions};
use crate::provider::PermissionsRegistry;
use crate::session::SessionCookies;
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::{Method, Request, Response};
use std::fmt::Display;
use std::sync::Arc;
use tablero_core::ModuleKey;
use tracing::{debug, warn};

/// Shared state the handlers need
pub struct AppState {
    pub config: Config,
    pub backend: Arc<dyn AuthBackend>,
    pub registry: Arc<PermissionsRegistry>,
    pub cookies: SessionCookies,
}

/// HTTP router for the dashboard
#[derive(Clone)]
pub struct Router {
    state: Arc<AppState>,
}

impl Router {
    pub fn new(state: AppState) -> Self {
        Self { state: Arc::new(state) }
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Route a request and render any error as a problem response
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Display,
    {
        let instance = req.uri().path().to_string();
        match self.route(req).await {
            Ok(response) => response,
            Err(e) => e.into_response(&instance),
        }
    }

    /// Route a request to the appropriate handler
    pub async fn route<B>(&self, req: Request<B>) -> ApiResult<Response<Full<Bytes>>>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Display,
    {
        let raw_path = req.uri().path();
        let path = match raw_path.trim_end_matches('/') {
            "" => "/".to_string(),
            trimmed => trimmed.to_string(),
        };
        let method = req.method().clone();
        let wait = self.state.config.permissions_wait();

        debug!("Routing request: {} {}", method, path);

        match (&method, path.as_str()) {
            // Health
            (&Method::GET, "/api/v1/health") => health::health_check(req, &self.state.registry).await,

            // Auth pages
            (&Method::GET, "/login") => auth::login_page(req).await,
            (&Method::POST, "/login") => auth::login(req, &self.state).await,
            (&Method::POST, "/logout") => auth::logout(req, &self.state).await,
            (&Method::GET, "/register") => auth::register_page(req).await,
            (&Method::GET, "/auth/callback") => auth::auth_callback(req).await,

            // Dashboard
            (&Method::GET, "/") => modules::index(req, wait).await,
            (&Method::GET, "/admin") => modules::admin_page(req).await,
            (&Method::GET, "/tareas") => modules::module_page(req, ModuleKey::Tareas, wait).await,
            (&Method::GET, "/calendario") => modules::module_page(req, ModuleKey::Calendario, wait).await,
            (&Method::GET, "/revenue") => modules::module_page(req, ModuleKey::Revenue, wait).await,
            (&Method::GET, "/finanzas") => modules::module_page(req, ModuleKey::Finanzas, wait).await,
            (&Method::GET, "/producto") => modules::module_page(req, ModuleKey::Producto, wait).await,

            // Permissions
            (&Method::GET, "/api/v1/permissions") => permissions::get_permissions(req).await,
            (&Method::POST, "/api/v1/permissions/refetch") => permissions::refetch_permissions(req).await,

            _ => self.handle_dynamic_routes(req, &method, &path).await,
        }
    }

    /// Handle routes with path parameters
    async fn handle_dynamic_routes<B>(&self, req: Request<B>, method: &Method, path: &str) -> ApiResult<Response<Full<Bytes>>> {
        let path_segments: Vec<&str> = path.split('/').collect();

        match (method, path_segments.as_slice()) {
            (&Method::GET, ["", "invite", token]) => auth::invite_page(req, token).await,
            (_, ["", "invite", _]) => Err(method_not_allowed(method, path, "GET")),

            _ => {
                if let Some(allow) = allowed_methods(path) {
                    return Err(method_not_allowed(method, path, allow));
                }
                warn!("Route not found: {} {}", method, path);
                Err(ApiError::NotFound {
                    message: format!("Route not found: {} {}", method, path),
                })
            }
        }
    }
}

/// Methods served on a fixed path, if the path is known
fn allowed_methods(path: &str) -> Option<&'static str> {
    match path {
        "/login" => Some("GET, POST"),
        "/logout" | "/api/v1/permissions/refetch" => Some("POST"),
        "/api/v1/health" | "/register" | "/auth/callback" | "/" | "/admin" | "/tareas" | "/calendario" | "/revenue" | "/finanzas" | "/producto" | "/api/v1/permissions" => {
            Some("GET")
        }
        _ => None,
    }
}

fn method_not_allowed(method: &Method, path: &str, allow: &'static str) -> ApiError {
    ApiError::MethodNotAllowed {
        method: method.to_string(),
        path: path.to_string(),
        allow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_methods() {
        assert_eq!(allowed_methods("/logout"), Some("POST"));
        assert_eq!(allowed_methods("/login"), Some("GET, POST"));
        assert_eq!(allowed_methods("/tareas"), Some("GET"));
        assert_eq!(allowed_methods("/nope"), None);
    }
}
