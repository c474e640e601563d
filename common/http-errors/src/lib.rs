use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized Access";
/// Message returned when the caller's stored role does not match the route's role.
pub const FORBIDDEN_ROLE_MESSAGE: &str = "forbidden message";
/// Message returned when a route's `email` parameter is not the caller's own.
pub const FORBIDDEN_IDENTITY_MESSAGE: &str = "Forbidden Access";

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub error: bool,
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Forbidden { code: &'static str, message: &'static str },
    BadRequest { code: &'static str, message: Option<String> },
    NotFound { code: &'static str, message: Option<String> },
    Conflict { code: &'static str, message: Option<String> },
    Unavailable { message: Option<String> },
    Upstream { code: &'static str, message: Option<String> },
    Internal { message: Option<String> },
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(e: E) -> Self { Self::Internal { message: Some(e.to_string()) } }
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self { Self::BadRequest { code, message: Some(message.into()) } }
    pub fn not_found(code: &'static str) -> Self { Self::NotFound { code, message: None } }
    pub fn forbidden_role() -> Self { Self::Forbidden { code: "forbidden_role", message: FORBIDDEN_ROLE_MESSAGE } }
    pub fn forbidden_identity() -> Self { Self::Forbidden { code: "forbidden_identity", message: FORBIDDEN_IDENTITY_MESSAGE } }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message): (&'static str, String) = match self {
            ApiError::Unauthorized => ("unauthorized", UNAUTHORIZED_MESSAGE.into()),
            ApiError::Forbidden { code, message } => (code, message.into()),
            ApiError::BadRequest { code, message } => (code, message.unwrap_or_else(|| "Bad request".into())),
            ApiError::NotFound { code, message } => (code, message.unwrap_or_else(|| "Not found".into())),
            ApiError::Conflict { code, message } => (code, message.unwrap_or_else(|| "Conflict".into())),
            ApiError::Unavailable { message } => (
                "store_unavailable",
                message.unwrap_or_else(|| "Storage temporarily unavailable".into()),
            ),
            ApiError::Upstream { code, message } => (code, message.unwrap_or_else(|| "Upstream service failed".into())),
            ApiError::Internal { message } => ("internal_error", message.unwrap_or_else(|| "Internal server error".into())),
        };
        let body = ErrorBody { error: true, code: code.into(), message };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        resp
    }
}

// Extractor rejections keep the uniform error body instead of axum's plain text.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request("invalid_body", rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::bad_request("invalid_path", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::bad_request("invalid_query", rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
