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

//! Session resolution from request cookies
//!
//! The session cookie stores the auth service tokens as base64url-encoded
//! JSON. Resolving a session validates the access token with the auth
//! service, refreshing it first when it is about to expire. Any cookie the
//! resolution produces, refreshed or cleared, is returned to the caller so it
//! can be forwarded on the outgoing response.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hyper::HeaderMap;
use hyper::header::COOKIE;
use std::sync::Arc;
use tablero_core::Identity;
use tracing::{debug, info, warn};

use crate::backend::{AuthBackend, AuthUser, SessionTokens};
use crate::config::Config;
use crate::error::ApiResult;

/// Lifetime of the session cookie; the refresh token outlives the access token
const SESSION_COOKIE_MAX_AGE_SECS: i64 = 400 * 24 * 60 * 60;

/// A validated session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: AuthUser,
    pub tokens: SessionTokens,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }

    /// Identity handed to the permissions context
    pub fn identity(&self) -> Identity {
        let identity = Identity::new(self.user.id.clone(), self.tokens.access_token.clone());
        match &self.user.email {
            Some(email) => identity.with_email(email.clone()),
            None => identity,
        }
    }
}

/// Reads and writes the session cookie
#[derive(Debug, Clone)]
pub struct SessionCookies {
    name: String,
    secure: bool,
}

impl SessionCookies {
    pub fn new(name: impl Into<String>, secure: bool) -> Self {
        Self { name: name.into(), secure }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.session_cookie_name.clone(), config.cookie_secure)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw value of the session cookie, if the request carries one
    pub fn read<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.name)
            .map(|(_, value)| value)
    }

    pub fn encode(tokens: &SessionTokens) -> ApiResult<String> {
        let json = serde_json::to_vec(tokens)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    pub fn decode(value: &str) -> Option<SessionTokens> {
        let bytes = URL_SAFE_NO_PAD.decode(value.trim()).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// `Set-Cookie` value storing `tokens`
    pub fn set_cookie(&self, tokens: &SessionTokens) -> ApiResult<String> {
        Ok(self.cookie_line(&Self::encode(tokens)?, SESSION_COOKIE_MAX_AGE_SECS))
    }

    /// `Set-Cookie` value removing the session cookie
    pub fn clear_cookie(&self) -> String {
        self.cookie_line("", 0)
    }

    fn cookie_line(&self, value: &str, max_age: i64) -> String {
        let mut line = format!("{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}", self.name, value, max_age);
        if self.secure {
            line.push_str("; Secure");
        }
        line
    }
}

/// Outcome of resolving a request's session
#[derive(Debug, Clone, Default)]
pub struct SessionResolution {
    pub session: Option<Session>,
    /// `Set-Cookie` values to forward on the response
    pub set_cookies: Vec<String>,
}

impl SessionResolution {
    fn anonymous() -> Self {
        Self::default()
    }

    fn cleared(cookies: &SessionCookies) -> Self {
        Self {
            session: None,
            set_cookies: vec![cookies.clear_cookie()],
        }
    }
}

/// Validates session cookies against the auth service
#[derive(Clone)]
pub struct SessionResolver {
    backend: Arc<dyn AuthBackend>,
    cookies: SessionCookies,
    refresh_margin_secs: i64,
}

impl SessionResolver {
    pub fn new(backend: Arc<dyn AuthBackend>, cookies: SessionCookies, refresh_margin_secs: i64) -> Self {
        Self {
            backend,
            cookies,
            refresh_margin_secs,
        }
    }

    pub fn cookies(&self) -> &SessionCookies {
        &self.cookies
    }

    /// Resolve the session carried by `headers`.
    ///
    /// Never fails: undecodable cookies, failed refreshes and rejected tokens
    /// all resolve to "no session", clearing the cookie where it is known to be
    /// bad. Transport errors also resolve to "no session" but keep the cookie.
    pub async fn resolve(&self, headers: &HeaderMap) -> SessionResolution {
        let Some(raw) = self.cookies.read(headers) else {
            return SessionResolution::anonymous();
        };

        let Some(mut tokens) = SessionCookies::decode(raw) else {
            warn!(cookie = %self.cookies.name(), "Discarding undecodable session cookie");
            return SessionResolution::cleared(&self.cookies);
        };

        let mut set_cookies = Vec::new();
        if tokens.expires_within(self.refresh_margin_secs, Utc::now()) {
            match self.backend.refresh_session(&tokens.refresh_token).await {
                Ok(refreshed) => {
                    debug!("Session tokens refreshed");
                    match self.cookies.set_cookie(&refreshed) {
                        Ok(line) => set_cookies.push(line),
                        // The refreshed tokens still serve this request
                        Err(e) => warn!(error = %e, "Failed to encode refreshed session cookie"),
                    }
                    tokens = refreshed;
                }
                Err(e) => {
                    info!(error = %e, "Session refresh failed, clearing cookie");
                    return SessionResolution::cleared(&self.cookies);
                }
            }
        }

        match self.backend.get_user(&tokens.access_token).await {
            Ok(Some(user)) => SessionResolution {
                session: Some(Session { user, tokens }),
                set_cookies,
            },
            Ok(None) => {
                debug!("Access token rejected, clearing cookie");
                SessionResolution::cleared(&self.cookies)
            }
            Err(e) => {
                warn!(error = %e, "Session validation failed");
                SessionResolution { session: None, set_cookies }
            }
        }
    }
}
