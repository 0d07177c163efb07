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

//! Client for the hosted auth, profile and RPC backend

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tablero_core::permissions::{PERMISSIONS_RPC, parse_permission_rows};
use tablero_core::role::deserialize_optional_role;
use tablero_core::{Identity, PermissionRow, PermissionsError, PermissionsResult, PermissionsSource, Role};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ApiError, ApiResult};

/// Tokens of an authenticated session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp at which the access token expires
    pub expires_at: i64,
}

impl SessionTokens {
    /// Whether the access token expires within `margin_secs` of `now`
    pub fn expires_within(&self, margin_secs: i64, now: DateTime<Utc>) -> bool {
        self.expires_at <= now.timestamp().saturating_add(margin_secs)
    }
}

/// User record returned by the auth service
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Result of a successful password sign-in
#[derive(Debug, Clone)]
pub struct SignIn {
    pub tokens: SessionTokens,
    pub user: AuthUser,
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<AuthUser>,
}

impl TokenResponse {
    fn into_tokens(self, now: DateTime<Utc>) -> (SessionTokens, Option<AuthUser>) {
        let expires_at = self.expires_at.unwrap_or_else(|| now.timestamp() + self.expires_in.unwrap_or(3600));
        (
            SessionTokens {
                access_token: self.access_token,
                refresh_token: self.refresh_token,
                expires_at,
            },
            self.user,
        )
    }
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    #[serde(default, deserialize_with = "deserialize_optional_role")]
    role: Option<Role>,
}

/// Calls the gate and the login flow make against the auth service
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Validate an access token. `Ok(None)` means the token was rejected.
    async fn get_user(&self, access_token: &str) -> ApiResult<Option<AuthUser>>;

    /// Exchange a refresh token for a new session
    async fn refresh_session(&self, refresh_token: &str) -> ApiResult<SessionTokens>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> ApiResult<SignIn>;

    async fn sign_out(&self, access_token: &str) -> ApiResult<()>;

    /// Role column of the caller's profile row, `Ok(None)` when there is no row
    async fn lookup_role(&self, user_id: &str, access_token: &str) -> ApiResult<Option<Role>>;
}

/// HTTP implementation of [`AuthBackend`] and [`PermissionsSource`]
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl BackendClient {
    pub fn new(config: &Config) -> ApiResult<Self> {
        let http = reqwest::Client::builder().timeout(config.backend_timeout()).build()?;

        Ok(Self {
            http,
            base_url: config.backend_url.trim_end_matches('/').to_string(),
            anon_key: config.backend_anon_key.clone(),
        })
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.base_url, path)
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1{}", self.base_url, path)
    }

    /// Builds a request carrying the API key and, when given, the caller's token
    fn request(&self, method: Method, url: String, access_token: Option<&str>) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token.unwrap_or(self.anon_key.as_str()))
    }

    async fn token_grant(&self, grant_type: &str, body: serde_json::Value) -> ApiResult<(SessionTokens, Option<AuthUser>)> {
        let response = self
            .request(Method::POST, self.auth_url("/token"), None)
            .query(&[("grant_type", grant_type)])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized {
                message: format!("Token grant '{}' rejected", grant_type),
            });
        }
        if !status.is_success() {
            return Err(ApiError::Backend {
                message: format!("Token endpoint returned {}", status),
            });
        }

        let tokens: TokenResponse = response.json().await?;
        Ok(tokens.into_tokens(Utc::now()))
    }
}

#[async_trait]
impl AuthBackend for BackendClient {
    async fn get_user(&self, access_token: &str) -> ApiResult<Option<AuthUser>> {
        let response = self.request(Method::GET, self.auth_url("/user"), Some(access_token)).send().await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!("Auth service rejected access token");
                Ok(None)
            }
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => Err(ApiError::Backend {
                message: format!("User endpoint returned {}", status),
            }),
        }
    }

    async fn refresh_session(&self, refresh_token: &str) -> ApiResult<SessionTokens> {
        let (tokens, _) = self.token_grant("refresh_token", serde_json::json!({ "refresh_token": refresh_token })).await?;
        Ok(tokens)
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> ApiResult<SignIn> {
        let (tokens, user) = self.token_grant("password", serde_json::json!({ "email": email, "password": password })).await?;

        let user = match user {
            Some(user) => user,
            None => self.get_user(&tokens.access_token).await?.ok_or_else(|| ApiError::Unauthorized {
                message: "Session issued without a user".to_string(),
            })?,
        };

        Ok(SignIn { tokens, user })
    }

    async fn sign_out(&self, access_token: &str) -> ApiResult<()> {
        let response = self.request(Method::POST, self.auth_url("/logout"), Some(access_token)).send().await?;
        let status = response.status();

        // An already revoked token is as good as a successful sign-out
        if status.is_success() || status == StatusCode::UNAUTHORIZED {
            Ok(())
        } else {
            Err(ApiError::Backend {
                message: format!("Logout endpoint returned {}", status),
            })
        }
    }

    async fn lookup_role(&self, user_id: &str, access_token: &str) -> ApiResult<Option<Role>> {
        let response = self
            .request(Method::GET, self.rest_url("/profiles"), Some(access_token))
            .query(&[("select", "role".to_string()), ("id", format!("eq.{}", user_id))])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Backend {
                message: format!("Profile lookup returned {}", status),
            });
        }

        let rows: Vec<ProfileRow> = response.json().await?;
        Ok(rows.into_iter().next().and_then(|row| row.role))
    }
}

#[async_trait]
impl PermissionsSource for BackendClient {
    async fn fetch_permissions(&self, identity: &Identity) -> PermissionsResult<Vec<PermissionRow>> {
        let unavailable = |message: String| PermissionsError::SourceUnavailable { message };

        let response = self
            .request(Method::POST, self.rest_url(&format!("/rpc/{}", PERMISSIONS_RPC)), Some(&identity.access_token))
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(user_id = %identity.user_id, %status, "Permissions RPC returned an error status");
            return Err(unavailable(format!("{} returned {}", PERMISSIONS_RPC, status)));
        }

        let body = response.bytes().await.map_err(|e| unavailable(e.to_string()))?;
        parse_permission_rows(&body)
    }
}
