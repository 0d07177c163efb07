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

//! Permissions JSON endpoints

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{CACHE_CONTROL, CONTENT_TYPE, HeaderValue};
use hyper::{Request, Response};
use serde::Serialize;
use tablero_core::{ModuleFlags, ModuleKey, PermissionsSnapshot, PermissionsStatus, Role};
use tracing::info;

use crate::error::ApiResult;
use crate::provider::PermissionsHandle;

/// Permissions as exposed to the browser
#[derive(Debug, Serialize)]
pub struct PermissionsResponse {
    pub role: Option<Role>,
    #[serde(flatten)]
    pub flags: ModuleFlags,
    pub is_loading: bool,
    pub status: PermissionsStatus,
    /// Modules the user may open after the superadmin bypass
    pub modules: Vec<ModuleKey>,
}

impl From<PermissionsSnapshot> for PermissionsResponse {
    fn from(snapshot: PermissionsSnapshot) -> Self {
        Self {
            is_loading: snapshot.is_loading(),
            status: snapshot.status,
            modules: snapshot.permissions.accessible_modules(),
            role: snapshot.permissions.role,
            flags: snapshot.permissions.flags,
        }
    }
}

fn json_response(body: &PermissionsResponse) -> ApiResult<Response<Full<Bytes>>> {
    let json = serde_json::to_string(body)?;
    let mut response = Response::new(Full::new(Bytes::from(json)));
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response.headers_mut().insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}

/// Current permissions
/// GET /api/v1/permissions
pub async fn get_permissions<B>(req: Request<B>) -> ApiResult<Response<Full<Bytes>>> {
    let permissions = PermissionsHandle::from_request(&req)?;
    json_response(&PermissionsResponse::from(permissions.snapshot()))
}

/// Refetch permissions from the backend
/// POST /api/v1/permissions/refetch
pub async fn refetch_permissions<B>(req: Request<B>) -> ApiResult<Response<Full<Bytes>>> {
    let permissions = PermissionsHandle::from_request(&req)?;
    let snapshot = permissions.refetch().await;
    info!(status = ?snapshot.status, "Permissions refetched on request");
    json_response(&PermissionsResponse::from(snapshot))
}
