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

//! Dashboard pages behind the module guard

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Request, Response, StatusCode};
use std::time::Duration;
use tablero_core::{ModuleGuard, ModuleKey};
use tracing::debug;

use crate::error::ApiResult;
use crate::pages;
use crate::provider::PermissionsHandle;
use crate::session::Session;

/// Module page
/// GET /tareas, /calendario, /revenue, /finanzas, /producto
pub async fn module_page<B>(req: Request<B>, module: ModuleKey, wait: Duration) -> ApiResult<Response<Full<Bytes>>> {
    let permissions = PermissionsHandle::from_request(&req)?;
    let snapshot = permissions.wait_settled(wait).await;
    let decision = ModuleGuard::new(module).evaluate(&snapshot);

    debug!(module = %module, ?decision, status = ?snapshot.status, "Module guard evaluated");
    Ok(pages::guarded_page(module, decision))
}

/// Admin page; access is enforced by the edge gate's role check
/// GET /admin
pub async fn admin_page<B>(_req: Request<B>) -> ApiResult<Response<Full<Bytes>>> {
    Ok(pages::html_response(StatusCode::OK, pages::admin_page()))
}

/// Dashboard index
/// GET /
pub async fn index<B>(req: Request<B>, wait: Duration) -> ApiResult<Response<Full<Bytes>>> {
    let permissions = PermissionsHandle::from_request(&req)?;
    let email = req.extensions().get::<Session>().and_then(|session| session.user.email.clone());

    let snapshot = permissions.wait_settled(wait).await;
    let html = pages::index_page(email.as_deref(), &snapshot.permissions, snapshot.is_loading());
    Ok(pages::html_response(StatusCode::OK, html))
}
