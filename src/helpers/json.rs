use crate::health::HealthError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, HttpResponseBuilder, ResponseError};
use serde::Serialize;
use serde_json::json;
use std::fmt;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Serializes `body` with the JSON content type used by every route.
pub fn json_response<T: Serialize>(mut builder: HttpResponseBuilder, body: &T, pretty: bool) -> HttpResponse {
    let encoded = if pretty {
        serde_json::to_string_pretty(body)
    } else {
        serde_json::to_string(body)
    };
    match encoded {
        Ok(encoded) => builder.content_type(JSON_CONTENT_TYPE).body(encoded),
        Err(err) => JsonError::internal(format!("could not encode response: {}", err)).error_response(),
    }
}

/// Handler failure rendered as `{"error": "<message>"}`.
#[derive(Debug)]
pub struct JsonError {
    status: StatusCode,
    message: String,
}

impl JsonError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for JsonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl ResponseError for JsonError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status)
            .content_type(JSON_CONTENT_TYPE)
            .body(json!({ "error": self.message }).to_string())
    }
}

impl From<HealthError> for JsonError {
    fn from(err: HealthError) -> Self {
        match err {
            HealthError::UnknownUnit(_) => Self::not_found(err.to_string()),
            err => {
                tracing::error!("health request failed: {}", err);
                Self::internal(err.to_string())
            }
        }
    }
}
