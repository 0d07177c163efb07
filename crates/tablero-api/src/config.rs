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

//! Configuration management for the dashboard gate

use std::env;
use std::time::Duration;

/// Configuration for the dashboard gate server
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind the HTTP server to
    pub bind_address: String,

    /// Base URL of the hosted backend (auth, REST and RPC endpoints)
    pub backend_url: String,

    /// Public API key sent with every backend call
    pub backend_anon_key: String,

    /// Name of the cookie carrying the session tokens
    pub session_cookie_name: String,

    /// Mark session cookies `Secure`
    pub cookie_secure: bool,

    /// Refresh tokens expiring within this many seconds
    pub refresh_margin_secs: i64,

    /// How long a module page waits for an in-flight permissions fetch
    pub permissions_wait_ms: u64,

    /// Request timeout for backend calls in seconds
    pub backend_timeout_secs: u64,

    /// Drop a user's permissions context after this many seconds without a request
    pub session_idle_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            backend_url: "http://127.0.0.1:54321".to_string(),
            backend_anon_key: String::new(),
            session_cookie_name: "tablero-auth-token".to_string(),
            cookie_secure: true,
            refresh_margin_secs: 60,
            permissions_wait_ms: 1500,
            backend_timeout_secs: 10,
            session_idle_secs: 1800,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            bind_address: env::var("TABLERO_BIND_ADDRESS").unwrap_or(defaults.bind_address),

            backend_url: env::var("TABLERO_BACKEND_URL").map(|v| v.trim_end_matches('/').to_string()).unwrap_or(defaults.backend_url),

            backend_anon_key: env::var("TABLERO_BACKEND_ANON_KEY").unwrap_or(defaults.backend_anon_key),

            session_cookie_name: env::var("TABLERO_SESSION_COOKIE").unwrap_or(defaults.session_cookie_name),

            cookie_secure: env::var("TABLERO_COOKIE_SECURE").map(|v| v.parse().unwrap_or(true)).unwrap_or(defaults.cookie_secure),

            refresh_margin_secs: env::var("TABLERO_REFRESH_MARGIN_SECS").map(|v| v.parse().unwrap_or(60)).unwrap_or(defaults.refresh_margin_secs),

            permissions_wait_ms: env::var("TABLERO_PERMISSIONS_WAIT_MS").map(|v| v.parse().unwrap_or(1500)).unwrap_or(defaults.permissions_wait_ms),

            backend_timeout_secs: env::var("TABLERO_BACKEND_TIMEOUT_SECS").map(|v| v.parse().unwrap_or(10)).unwrap_or(defaults.backend_timeout_secs),

            session_idle_secs: env::var("TABLERO_SESSION_IDLE_SECS").map(|v| v.parse().unwrap_or(1800)).unwrap_or(defaults.session_idle_secs),
        }
    }

    pub fn permissions_wait(&self) -> Duration {
        Duration::from_millis(self.permissions_wait_ms)
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    /// How often idle contexts are swept; a quarter of the idle TTL, at least a second
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs((self.session_idle_secs / 4).max(1))
    }
}
