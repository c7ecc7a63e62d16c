use crate::error::ValidationError;
use crate::Error;
use actix_web::error::{JsonPayloadError, QueryPayloadError};
use actix_web::{http::StatusCode, web::Json, HttpRequest, HttpResponse, ResponseError};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use tracing::error;

pub type RestResult<T, E = RestApiError> = std::result::Result<Json<T>, E>;

#[derive(Debug)]
pub struct RestApiError {
    pub code: RestApiErrorCode,
    pub message: String,
    pub fields: Option<BTreeMap<String, Vec<String>>>,
}

impl RestApiError {
    pub fn new(code: RestApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            fields: None,
        }
    }

    pub fn not_found() -> Self {
        Self::new(
            RestApiErrorCode::NotFound,
            "Entity with requested ID doesn't exist.",
        )
    }

    pub fn validation(err: ValidationError) -> Self {
        Self {
            code: RestApiErrorCode::Validation,
            message: "One or more fields are invalid.".into(),
            fields: Some(err.fields().clone()),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(RestApiErrorCode::InvalidInput, message)
    }

    pub fn database() -> Self {
        Self::new(
            RestApiErrorCode::Database,
            "Database query failed. Contact the maintainers to resolve.",
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestApiErrorCode {
    NotFound,
    Validation,
    InvalidInput,
    Database,
}

impl fmt::Display for RestApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::fmt::Display for RestApiErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestApiErrorCode::NotFound => write!(f, "not_found"),
            RestApiErrorCode::Validation => write!(f, "validation"),
            RestApiErrorCode::InvalidInput => write!(f, "invalid_input"),
            RestApiErrorCode::Database => write!(f, "database"),
        }
    }
}

impl RestApiErrorCode {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Validation => StatusCode::BAD_REQUEST,
            Self::InvalidInput => StatusCode::BAD_REQUEST,
            Self::Database => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ResponseError for RestApiError {
    fn error_response(&self) -> HttpResponse {
        let mut body = json!({
            "code": self.code.to_string(),
            "message": self.message,
        });
        if let Some(fields) = &self.fields {
            body["fields"] = json!(fields);
        }
        HttpResponse::build(self.status_code())
            .content_type("application/json")
            .json(body)
    }

    fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }
}

impl From<Error> for RestApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::NotFound(_) => RestApiError::not_found(),
            Error::Validation(err) => RestApiError::validation(err),
            Error::InvalidInput(message) => RestApiError::invalid_input(message),
            err => {
                error!(%err, "Request failed");
                RestApiError::database()
            }
        }
    }
}

pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    RestApiError::invalid_input(format!("Invalid arguments: {err}")).into()
}

pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    RestApiError::invalid_input(format!("Invalid request body: {err}")).into()
}
