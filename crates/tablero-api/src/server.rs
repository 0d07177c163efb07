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

//! HTTP server implementation using Hyper

use crate::backend::{AuthBackend, BackendClient};
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::gate::{EdgeGate, EdgeGateLayer};
use crate::provider::PermissionsRegistry;
use crate::router::{AppState, Router};
use crate::session::{SessionCookies, SessionResolver};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::Request;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tablero_core::{PermissionsSource, RouteTable};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tracing::{error, info};

/// Dashboard server using Hyper
pub struct ApiServer {
    bind_address: SocketAddr,
    router: Router,
    gate: EdgeGate,
    sweep_interval: Duration,
}

impl ApiServer {
    /// Create a server talking to the configured backend
    pub fn new(config: Config) -> ApiResult<Self> {
        let client = Arc::new(BackendClient::new(&config)?);
        info!(backend = %config.backend_url, "Backend client created");
        Self::with_backend(config, client.clone(), client)
    }

    /// Create a server over explicit auth and permissions backends
    pub fn with_backend(config: Config, backend: Arc<dyn AuthBackend>, source: Arc<dyn PermissionsSource>) -> ApiResult<Self> {
        let bind_address: SocketAddr = config.bind_address.parse().map_err(|e| ApiError::BadRequest {
            message: format!("Invalid bind address: {}", e),
        })?;

        let sweep_interval = config.sweep_interval();
        let cookies = SessionCookies::from_config(&config);
        let registry = Arc::new(PermissionsRegistry::new(source, config.session_idle()));
        let sessions = SessionResolver::new(backend.clone(), cookies.clone(), config.refresh_margin_secs);
        let gate = EdgeGate::new(RouteTable::default(), sessions, backend.clone(), registry.clone());

        let router = Router::new(AppState {
            config,
            backend,
            registry,
            cookies,
        });

        Ok(Self {
            bind_address,
            router,
            gate,
            sweep_interval,
        })
    }

    /// Get the bind address
    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn gate(&self) -> &EdgeGate {
        &self.gate
    }

    /// Start the server; returns on Ctrl-C
    pub async fn run(self) -> ApiResult<()> {
        let listener = TcpListener::bind(self.bind_address).await.map_err(ApiError::IoError)?;

        info!("Tablero listening on http://{}", self.bind_address);

        let sweeper = PermissionsRegistry::start_sweeper(self.router.state().registry.clone(), self.sweep_interval);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            let (stream, remote_addr) = tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping listener");
                    sweeper.abort();
                    return Ok(());
                }
            };

            let io = TokioIo::new(stream);
            let router = self.router.clone();
            let gate = self.gate.clone();

            tokio::task::spawn(async move {
                let service = ServiceBuilder::new().layer(EdgeGateLayer::new(gate)).service(tower::service_fn(move |req: Request<Incoming>| {
                    let router = router.clone();
                    async move { Ok::<_, Infallible>(router.handle(req).await) }
                }));

                if let Err(err) = http1::Builder::new().serve_connection(io, TowerToHyperService::new(service)).await {
                    error!("Error serving connection from {}: {}", remote_addr, err);
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_bind_address() {
        let config = Config {
            bind_address: "not an address".to_string(),
            ..Config::default()
        };
        assert!(matches!(ApiServer::new(config), Err(ApiError::BadRequest { .. })));
    }
}
