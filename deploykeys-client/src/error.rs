//! Error taxonomy for deploy key operations.

use chrono::{DateTime, Utc};
use deploykeys_shared::{
    ValidationError,
    error::{ApiErrorBody, FieldError},
};
use reqwest::StatusCode;
use thiserror::Error;

use crate::connection::ApiResponse;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Local input check failed; no request was issued.
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {message}")]
    NotFound { message: String },

    /// 422, e.g. the key is already registered elsewhere.
    #[error("Unprocessable entity: {message}{}", format_field_errors(.errors))]
    UnprocessableEntity {
        message: String,
        errors: Vec<FieldError>,
    },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Rate limit exceeded{}", format_reset(.reset_at))]
    RateLimitExceeded { reset_at: Option<DateTime<Utc>> },

    #[error("API error ({status}): {message}")]
    Api { status: StatusCode, message: String },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// Classify a non-success response.
    pub fn from_response(response: &ApiResponse) -> Self {
        let status = response.status;
        if is_rate_limited(response) {
            return ApiError::RateLimitExceeded {
                reset_at: rate_limit_reset(response),
            };
        }

        let body: ApiErrorBody = serde_json::from_str(&response.body).unwrap_or_default();
        let message = if body.message.is_empty() {
            let raw = response.body.trim();
            if raw.is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            } else {
                raw.to_string()
            }
        } else {
            body.message
        };

        match status {
            StatusCode::NOT_FOUND => ApiError::NotFound { message },
            StatusCode::UNPROCESSABLE_ENTITY => ApiError::UnprocessableEntity {
                message,
                errors: body.errors,
            },
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized { message },
            StatusCode::FORBIDDEN => ApiError::Forbidden { message },
            _ => ApiError::Api { status, message },
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ApiError::Validation(_))
    }
}

fn is_rate_limited(response: &ApiResponse) -> bool {
    if response.status != StatusCode::FORBIDDEN && response.status != StatusCode::TOO_MANY_REQUESTS {
        return false;
    }
    response
        .header("x-ratelimit-remaining")
        .and_then(|v| v.parse::<u64>().ok())
        == Some(0)
}

fn rate_limit_reset(response: &ApiResponse) -> Option<DateTime<Utc>> {
    response
        .header("x-ratelimit-reset")
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

fn format_field_errors(errors: &[FieldError]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let joined: Vec<String> = errors.iter().map(ToString::to_string).collect();
    format!(" ({})", joined.join("; "))
}

fn format_reset(reset_at: &Option<DateTime<Utc>>) -> String {
    match reset_at {
        Some(at) => format!(", resets at {}", at.to_rfc3339()),
        None => String::new(),
    }
}
