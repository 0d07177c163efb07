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

//! Errors of the dashboard service, rendered as RFC 7807 problem documents

use http_body_util::Full;
use hyper::header::{ALLOW, CACHE_CONTROL, CONTENT_TYPE, HeaderValue};
use hyper::{Response, StatusCode, body::Bytes};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{error, warn};

const PROBLEM_BASE: &str = "https://tablero.synerthink.com/problems";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// Credentials rejected by the auth service
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Known path, wrong method; `allow` lists the accepted methods
    #[error("Method {method} not allowed on {path}")]
    MethodNotAllowed { method: String, path: String, allow: &'static str },

    /// A handler ran without the permissions context the edge gate attaches
    #[error("Permissions context missing: {message}")]
    ContextMissing { message: String },

    /// The backend answered with an unexpected status
    #[error("Backend error: {message}")]
    Backend { message: String },

    #[error("Backend transport error: {0}")]
    BackendTransport(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } | ApiError::SerdeJsonError(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::Backend { .. } | ApiError::BackendTransport(_) => StatusCode::BAD_GATEWAY,
            ApiError::ContextMissing { .. } | ApiError::IoError(_) | ApiError::HttpError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Last segment of the problem `type` URI
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::BadRequest { .. } => "bad_request",
            ApiError::Unauthorized { .. } => "unauthorized",
            ApiError::NotFound { .. } => "not_found",
            ApiError::MethodNotAllowed { .. } => "method_not_allowed",
            ApiError::ContextMissing { .. } => "context_missing",
            ApiError::Backend { .. } => "backend_error",
            ApiError::BackendTransport(_) => "backend_transport_error",
            ApiError::SerdeJsonError(_) => "json_error",
            ApiError::IoError(_) => "io_error",
            ApiError::HttpError(_) => "http_error",
        }
    }

    /// Problem response for a failed request to `instance`
    pub fn into_response(self, instance: &str) -> Response<Full<Bytes>> {
        let status = self.status_code();
        if status.is_server_error() {
            error!(%instance, "{} - {}", status, self);
        } else {
            warn!(%instance, "{} - {}", status, self);
        }

        let mut problem = ProblemDetails::new(&self, instance);
        if let ApiError::MethodNotAllowed { allow, .. } = &self {
            problem = problem.with_extension("allow", serde_json::json!(allow.split(", ").collect::<Vec<_>>()));
        }

        let json = serde_json::to_string(&problem).unwrap_or_else(|e| {
            error!("Failed to serialize problem details: {}", e);
            format!(r#"{{"type":"{}/{}","status":{}}}"#, PROBLEM_BASE, self.error_type(), status.as_u16())
        });

        let mut response = Response::new(Full::new(Bytes::from(json)));
        *response.status_mut() = status;
        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/problem+json"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        if let ApiError::MethodNotAllowed { allow, .. } = &self {
            headers.insert(ALLOW, HeaderValue::from_static(*allow));
        }
        response
    }
}

/// RFC 7807 problem document
#[derive(Debug, Serialize, Deserialize)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    /// Request path the problem occurred on
    pub instance: String,
    #[serde(flatten)]
    pub extensions: HashMap<String, serde_json::Value>,
}

impl ProblemDetails {
    pub fn new(error: &ApiError, instance: &str) -> Self {
        let status = error.status_code();
        Self {
            problem_type: format!("{}/{}", PROBLEM_BASE, error.error_type()),
            title: status.canonical_reason().unwrap_or("Error").to_string(),
            status: status.as_u16(),
            detail: error.to_string(),
            instance: instance.to_string(),
            extensions: HashMap::new(),
        }
    }

    pub fn with_extension(mut self, key: &str, value: serde_json::Value) -> Self {
        self.extensions.insert(key.to_string(), value);
        self
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<hyper::http::Error> for ApiError {
    fn from(err: hyper::http::Error) -> Self {
        ApiError::HttpError(err.to_string())
    }
}
