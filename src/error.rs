use axum::{
    Json,
    response::{IntoResponse, Response},
};
use compact_str::CompactString;
use http::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Failures surfaced to callers. Ingestion-level parse problems are never
/// represented here; they are recovered by skipping the offending row.
#[derive(Debug, Error)]
pub enum Error {
    #[error("time must be >0 and <= 15 minutes, got {0}")]
    BadTime(i64),
    #[error("send points or byCategory or byName")]
    NoInputs,
    #[error("no start nodes found on the road network")]
    NoStartNodes,
    #[error("road graph is not initialized")]
    NotInitialized,
    #[error("unsupported attraction category: {0}")]
    BadCategory(CompactString),
    #[error("MultiPolygon isochrones are not supported")]
    MultiPolygonUnsupported,
    #[error("calculate score by name is not supported yet")]
    ScoreByNameUnsupported,
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::BadTime(_)
            | Error::NoInputs
            | Error::BadCategory(_)
            | Error::ScoreByNameUnsupported => StatusCode::BAD_REQUEST,
            Error::NoStartNodes => StatusCode::NOT_FOUND,
            Error::NotInitialized | Error::MultiPolygonUnsupported | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    status: &'static str,
    detail: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status: "error",
            detail: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
