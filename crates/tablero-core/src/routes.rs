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

//! Static route classification used by the edge gate

use regex::Regex;
use std::sync::LazyLock;

/// Paths reachable without a session
pub const PUBLIC_ROUTES: &[&str] = &["/login", "/register", "/invite", "/auth/callback", "/api/v1/health"];

/// Paths that additionally require an elevated role
pub const PROTECTED_ROUTES: &[&str] = &["/admin", "/finanzas", "/revenue"];

/// Where unauthenticated callers are sent
pub const LOGIN_PATH: &str = "/login";

/// Where callers without an elevated role are sent
pub const HOME_PATH: &str = "/";

/// Framework asset prefixes and root-level files with an asset extension
static STATIC_ASSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/(?:_next/static/|_next/image|static/|favicon\.ico$|[^/]+\.(?:svg|png|jpg|jpeg|gif|webp|ico|css|js)$)")
        .unwrap_or_else(|e| panic!("static asset pattern is invalid: {e}"))
});

/// How a request path relates to the two route sets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteClass {
    pub is_public: bool,
    pub is_protected: bool,
}

/// Public and protected prefix sets
#[derive(Debug, Clone)]
pub struct RouteTable {
    public: Vec<String>,
    protected: Vec<String>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(PUBLIC_ROUTES.iter().copied(), PROTECTED_ROUTES.iter().copied())
    }
}

impl RouteTable {
    pub fn new<'a>(public: impl IntoIterator<Item = &'a str>, protected: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            public: public.into_iter().map(str::to_string).collect(),
            protected: protected.into_iter().map(str::to_string).collect(),
        }
    }

    /// Classify a request path against both prefix sets
    pub fn classify(&self, path: &str) -> RouteClass {
        RouteClass {
            is_public: self.public.iter().any(|prefix| matches_prefix(path, prefix)),
            is_protected: self.protected.iter().any(|prefix| matches_prefix(path, prefix)),
        }
    }

    /// Whether a path is served as a static asset and never reaches the gate
    pub fn is_static_asset(&self, path: &str) -> bool {
        STATIC_ASSET.is_match(path)
    }
}

/// A prefix matches the path itself or any path below it
fn matches_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}
