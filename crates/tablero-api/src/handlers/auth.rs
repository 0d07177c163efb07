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

//! Sign-in, sign-out and the other public auth pages

use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::header::{CACHE_CONTROL, HeaderValue, LOCATION, SET_COOKIE};
use hyper::{Request, Response, StatusCode};
use metrics::counter;
use std::fmt::Display;
use tablero_core::routes::{HOME_PATH, LOGIN_PATH};
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::pages;
use crate::router::AppState;
use crate::session::Session;

/// Credentials posted by the login form
#[derive(Debug, Default)]
struct LoginForm {
    email: String,
    password: String,
}

impl LoginForm {
    fn parse(body: &[u8]) -> ApiResult<Self> {
        let mut form = LoginForm::default();
        for (key, value) in url::form_urlencoded::parse(body) {
            match key.as_ref() {
                "email" => form.email = value.trim().to_string(),
                "password" => form.password = value.into_owned(),
                _ => {}
            }
        }

        if form.email.is_empty() || form.password.is_empty() {
            return Err(ApiError::BadRequest {
                message: "Email and password are required".to_string(),
            });
        }
        Ok(form)
    }
}

/// `303` so that a form POST is followed by a GET
fn see_other(location: &'static str, cookie: &str) -> ApiResult<Response<Full<Bytes>>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::SEE_OTHER;
    response.headers_mut().insert(LOCATION, HeaderValue::from_static(location));
    response.headers_mut().insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    let cookie = HeaderValue::from_str(cookie).map_err(|e| ApiError::HttpError(e.to_string()))?;
    response.headers_mut().append(SET_COOKIE, cookie);
    Ok(response)
}

/// Login form
/// GET /login
pub async fn login_page<B>(_req: Request<B>) -> ApiResult<Response<Full<Bytes>>> {
    Ok(pages::html_response(StatusCode::OK, pages::login_page(None)))
}

/// Password sign-in
/// POST /login
pub async fn login<B>(req: Request<B>, state: &AppState) -> ApiResult<Response<Full<Bytes>>>
where
    B: Body,
    B::Error: Display,
{
    let body = req
        .into_body()
        .collect()
        .await
        .map_err(|e| ApiError::BadRequest {
            message: format!("Failed to read login form: {}", e),
        })?
        .to_bytes();

    let form = match LoginForm::parse(&body) {
        Ok(form) => form,
        Err(ApiError::BadRequest { message }) => {
            return Ok(pages::html_response(StatusCode::BAD_REQUEST, pages::login_page(Some(&message))));
        }
        Err(e) => return Err(e),
    };

    match state.backend.sign_in_with_password(&form.email, &form.password).await {
        Ok(sign_in) => {
            counter!("tablero_logins_total", 1, "outcome" => "success");
            info!(user_id = %sign_in.user.id, "User signed in");
            // A new session starts from a fresh permissions fetch
            state.registry.detach(&sign_in.user.id);
            see_other(HOME_PATH, &state.cookies.set_cookie(&sign_in.tokens)?)
        }
        Err(ApiError::Unauthorized { .. }) => {
            counter!("tablero_logins_total", 1, "outcome" => "rejected");
            info!("Sign-in rejected");
            Ok(pages::html_response(
                StatusCode::UNAUTHORIZED,
                pages::login_page(Some("Correo o contraseña incorrectos")),
            ))
        }
        Err(e) => {
            counter!("tablero_logins_total", 1, "outcome" => "error");
            Err(e)
        }
    }
}

/// Sign-out; always clears the session cookie
/// POST /logout
pub async fn logout<B>(req: Request<B>, state: &AppState) -> ApiResult<Response<Full<Bytes>>> {
    if let Some(session) = req.extensions().get::<Session>() {
        if let Err(e) = state.backend.sign_out(&session.tokens.access_token).await {
            warn!(user_id = %session.user_id(), error = %e, "Backend sign-out failed");
        }
        state.registry.detach(session.user_id());
        info!(user_id = %session.user_id(), "User signed out");
    }

    see_other(LOGIN_PATH, &state.cookies.clear_cookie())
}

/// Registration notice
/// GET /register
pub async fn register_page<B>(_req: Request<B>) -> ApiResult<Response<Full<Bytes>>> {
    Ok(pages::html_response(StatusCode::OK, pages::register_page()))
}

/// Invitation landing page
/// GET /invite/{token}
pub async fn invite_page<B>(_req: Request<B>, token: &str) -> ApiResult<Response<Full<Bytes>>> {
    if token.is_empty() {
        return Err(ApiError::NotFound {
            message: "Invitation not found".to_string(),
        });
    }
    Ok(pages::html_response(StatusCode::OK, pages::invite_page(token)))
}

/// Return point of the hosted auth flow
/// GET /auth/callback
pub async fn auth_callback<B>(_req: Request<B>) -> ApiResult<Response<Full<Bytes>>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::TEMPORARY_REDIRECT;
    response.headers_mut().insert(LOCATION, HeaderValue::from_static(HOME_PATH));
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_login_form() {
        let form = LoginForm::parse(b"email=ana%40example.com+&password=s3cr%26t").unwrap();
        assert_eq!(form.email, "ana@example.com");
        assert_eq!(form.password, "s3cr&t");
    }

    #[test]
    fn test_parse_login_form_missing_password() {
        assert!(matches!(LoginForm::parse(b"email=ana%40example.com"), Err(ApiError::BadRequest { .. })));
    }

    #[test]
    fn test_see_other_sets_cookie() {
        let response = see_other(HOME_PATH, "tablero-auth-token=abc; Path=/").unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[LOCATION], "/");
        assert_eq!(response.headers()[SET_COOKIE], "tablero-auth-token=abc; Path=/");
    }
}
