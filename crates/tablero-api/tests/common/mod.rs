#![allow(dead_code)]

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{COOKIE, HeaderValue};
use hyper::{Request, Response};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tablero_api::backend::{AuthBackend, AuthUser, SessionTokens, SignIn};
use tablero_api::config::Config;
use tablero_api::error::{ApiError, ApiResult};
use tablero_api::gate::EdgeGateLayer;
use tablero_api::server::ApiServer;
use tablero_api::session::SessionCookies;
use tablero_core::{Identity, PermissionRow, PermissionsError, PermissionsResult, PermissionsSource, Role};
use tower::{ServiceBuilder, ServiceExt};

pub const COOKIE_NAME: &str = "tablero-auth-token";
pub const FAR_FUTURE: i64 = 4_000_000_000;

#[derive(Clone)]
struct FakeUser {
    id: String,
    email: String,
    password: String,
    role: Option<Role>,
    row: Option<PermissionRow>,
}

/// In-memory auth, profile and permissions backend
#[derive(Default)]
pub struct FakeBackend {
    users: Mutex<Vec<FakeUser>>,
    /// access token -> user id
    access_tokens: Mutex<HashMap<String, String>>,
    /// refresh token -> user id
    refresh_tokens: Mutex<HashMap<String, String>>,
    pub fail_role_lookup: AtomicBool,
    pub fail_permissions: AtomicBool,
    pub permission_fetches: AtomicUsize,
    pub sign_outs: AtomicUsize,
    issued: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_user(&self, id: &str, password: &str, role: Option<Role>, row: Option<PermissionRow>) {
        self.users.lock().push(FakeUser {
            id: id.to_string(),
            email: format!("{}@example.com", id),
            password: password.to_string(),
            role,
            row,
        });
    }

    pub fn set_row(&self, id: &str, row: Option<PermissionRow>) {
        if let Some(user) = self.users.lock().iter_mut().find(|user| user.id == id) {
            user.row = row;
        }
    }

    /// Issue tokens for `id` expiring at `expires_at`
    pub fn issue(&self, id: &str, expires_at: i64) -> SessionTokens {
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        let tokens = SessionTokens {
            access_token: format!("access-{}-{}", id, n),
            refresh_token: format!("refresh-{}-{}", id, n),
            expires_at,
        };
        self.access_tokens.lock().insert(tokens.access_token.clone(), id.to_string());
        self.refresh_tokens.lock().insert(tokens.refresh_token.clone(), id.to_string());
        tokens
    }

    pub fn revoke(&self, access_token: &str) {
        self.access_tokens.lock().remove(access_token);
    }

    fn user(&self, id: &str) -> Option<FakeUser> {
        self.users.lock().iter().find(|user| user.id == id).cloned()
    }

    fn auth_user(user: &FakeUser) -> AuthUser {
        AuthUser {
            id: user.id.clone(),
            email: Some(user.email.clone()),
        }
    }
}

#[async_trait]
impl AuthBackend for FakeBackend {
    async fn get_user(&self, access_token: &str) -> ApiResult<Option<AuthUser>> {
        let id = self.access_tokens.lock().get(access_token).cloned();
        Ok(id.and_then(|id| self.user(&id)).map(|user| Self::auth_user(&user)))
    }

    async fn refresh_session(&self, refresh_token: &str) -> ApiResult<SessionTokens> {
        let id = self.refresh_tokens.lock().remove(refresh_token);
        match id {
            Some(id) => Ok(self.issue(&id, FAR_FUTURE)),
            None => Err(ApiError::Unauthorized {
                message: "unknown refresh token".to_string(),
            }),
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> ApiResult<SignIn> {
        let user = self.users.lock().iter().find(|user| user.email == email && user.password == password).cloned();
        match user {
            Some(user) => Ok(SignIn {
                tokens: self.issue(&user.id, FAR_FUTURE),
                user: Self::auth_user(&user),
            }),
            None => Err(ApiError::Unauthorized {
                message: "invalid credentials".to_string(),
            }),
        }
    }

    async fn sign_out(&self, access_token: &str) -> ApiResult<()> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        self.revoke(access_token);
        Ok(())
    }

    async fn lookup_role(&self, user_id: &str, _access_token: &str) -> ApiResult<Option<Role>> {
        if self.fail_role_lookup.load(Ordering::SeqCst) {
            return Err(ApiError::Backend {
                message: "profile store unavailable".to_string(),
            });
        }
        Ok(self.user(user_id).and_then(|user| user.role))
    }
}

#[async_trait]
impl PermissionsSource for FakeBackend {
    async fn fetch_permissions(&self, identity: &Identity) -> PermissionsResult<Vec<PermissionRow>> {
        self.permission_fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_permissions.load(Ordering::SeqCst) {
            return Err(PermissionsError::SourceUnavailable {
                message: "rpc unavailable".to_string(),
            });
        }
        Ok(self.user(&identity.user_id).and_then(|user| user.row).into_iter().collect())
    }
}

pub fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".to_string(),
        cookie_secure: false,
        permissions_wait_ms: 1000,
        ..Config::default()
    }
}

/// Full gate + router stack over `backend`
pub struct TestApp {
    pub server: ApiServer,
    pub backend: Arc<FakeBackend>,
}

impl TestApp {
    pub fn new(backend: Arc<FakeBackend>) -> Self {
        let server = ApiServer::with_backend(test_config(), backend.clone(), backend.clone()).expect("server");
        Self { server, backend }
    }

    pub async fn send(&self, req: Request<Full<Bytes>>) -> Response<Full<Bytes>> {
        let router = self.server.router().clone();
        let service = ServiceBuilder::new()
            .layer(EdgeGateLayer::new(self.server.gate().clone()))
            .service(tower::service_fn(move |req: Request<Full<Bytes>>| {
                let router = router.clone();
                async move { Ok::<_, Infallible>(router.handle(req).await) }
            }));
        service.oneshot(req).await.expect("infallible")
    }

    pub async fn get(&self, path: &str, tokens: Option<&SessionTokens>) -> Response<Full<Bytes>> {
        self.send(request("GET", path, tokens, Bytes::new())).await
    }
}

pub fn cookie_header(tokens: &SessionTokens) -> HeaderValue {
    HeaderValue::from_str(&format!("{}={}", COOKIE_NAME, SessionCookies::encode(tokens).expect("encode"))).expect("cookie header")
}

pub fn request(method: &str, path: &str, tokens: Option<&SessionTokens>, body: Bytes) -> Request<Full<Bytes>> {
    let mut builder = Request::builder().method(method).uri(path);
    if let Some(tokens) = tokens {
        builder = builder.header(COOKIE, cookie_header(tokens));
    }
    builder.body(Full::new(body)).expect("request")
}

pub fn row(role: &str, flags: [bool; 5]) -> PermissionRow {
    PermissionRow {
        role: Role::parse(role),
        mod_tareas: Some(flags[0]),
        mod_calendario: Some(flags[1]),
        mod_revenue: Some(flags[2]),
        mod_finanzas: Some(flags[3]),
        mod_producto: Some(flags[4]),
    }
}

pub fn location(response: &Response<Full<Bytes>>) -> Option<&str> {
    response.headers().get(hyper::header::LOCATION).and_then(|v| v.to_str().ok())
}

pub fn set_cookies(response: &Response<Full<Bytes>>) -> Vec<String> {
    response
        .headers()
        .get_all(hyper::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

pub async fn read_text(response: Response<Full<Bytes>>) -> String {
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf8")
}

pub async fn read_json(response: Response<Full<Bytes>>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    serde_json::from_slice(&bytes).expect("json")
}
