//! Mapping of guard errors onto HTTP responses.
//!
//! | Error | Status |
//! |---|---|
//! | `BreakerOpen` | 503 + `Retry-After` |
//! | `InvalidInput` | 400 |
//! | timeouts | 504 |
//! | other dependency failures | 502 |
//! | `Configuration` | 500 |

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::Error;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    breaker: Option<String>,
}

/// Handler error wrapper.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::BreakerOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            e if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (breaker, retry_after) = match &self.0 {
            Error::BreakerOpen { name, retry_after } => {
                (Some(name.clone()), Some(retry_after.as_secs_f64().ceil() as u64))
            }
            _ => (None, None),
        };

        let body = ErrorBody {
            error: self.0.to_string(),
            breaker,
        };
        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}
