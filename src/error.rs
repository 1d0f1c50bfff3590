use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again later.";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimited,

    #[error("Request timeout")]
    Timeout,

    #[error("Radio Browser API returned {status}: {body}")]
    UpstreamStatus { status: StatusCode, body: String },

    #[error("Radio Browser API error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Map a reqwest transport error, keeping timeouts distinguishable.
    #[must_use]
    pub fn from_request(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Upstream(format!("Request failed: {e}"))
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::UpstreamStatus { status, .. } => *status,
            Self::Upstream(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Upstream answered 502, 503 or 504.
    #[must_use]
    pub fn is_overloaded(&self) -> bool {
        matches!(
            self,
            Self::UpstreamStatus { status, .. }
                if matches!(
                    *status,
                    StatusCode::BAD_GATEWAY
                        | StatusCode::SERVICE_UNAVAILABLE
                        | StatusCode::GATEWAY_TIMEOUT
                )
        )
    }

    /// Attach the handler-specific context used in the JSON error body.
    #[must_use]
    pub fn context(self, context: &'static str) -> ApiError {
        ApiError {
            context,
            source: self,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.context("An error occurred while processing your request")
            .into_response()
    }
}

/// Handler error: the failure plus what the handler was doing.
#[derive(Debug, thiserror::Error)]
#[error("{context}: {source}")]
pub struct ApiError {
    pub context: &'static str,
    #[source]
    pub source: AppError,
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.source.status()
    }

    /// Human-readable message, specific where the failure class is known.
    #[must_use]
    pub fn message(&self) -> String {
        match &self.source {
            AppError::BadRequest(msg) => msg.clone(),
            AppError::RateLimited => RATE_LIMIT_MESSAGE.to_string(),
            AppError::Timeout => "Request timed out".to_string(),
            AppError::UpstreamStatus { status, .. } => {
                format!("Radio Browser API returned {}", status.as_u16())
            }
            _ => self.context.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if let AppError::BadRequest(msg) = &self.source {
            tracing::warn!(context = self.context, message = %msg, "Rejected request");
            return (status, Json(json!({ "message": msg }))).into_response();
        }

        tracing::error!(
            context = self.context,
            status = status.as_u16(),
            error = %self.source,
            "Request failed"
        );

        let body = Json(json!({
            "message": self.message(),
            "context": self.context,
            "details": self.source.to_string(),
            "error": true,
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
