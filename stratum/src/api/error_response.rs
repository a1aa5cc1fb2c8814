//! Maps `StratumError` onto the HTTP status table in spec §7: `VALIDATION`
//! -> 400, `NOT_FOUND` -> 404, `CONFLICT` -> 409, `PERMISSION` -> 403,
//! everything else -> 500, body `{code, kind, message}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use stratum_shared::{ErrorKind, StratumError};

/// Newtype around `StratumError` so the orphan rule allows an
/// `IntoResponse` impl here rather than in `stratum-shared`, which has no
/// `axum` dependency and shouldn't gain one just for this one adapter.
pub struct ApiError(pub StratumError);

impl From<StratumError> for ApiError {
    fn from(err: StratumError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: u16,
    kind: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Permission => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            code: status.as_u16(),
            kind: self.0.kind().as_tag(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
