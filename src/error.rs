/// Error Handling Module
///
/// One error system for the whole service:
/// 1. Domain-specific error types (validation, storage, config, auth)
/// 2. A unified `AppError` used for control flow
/// 3. HTTP response mapping to the `{result, errors}` envelope
/// 4. Structured error logging with request context
///
/// Callers only ever see generic messages. Which check failed is written
/// to the log, never to the response body.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};

use crate::routes::AuthResult;

/// ============================================================================
/// 1. DOMAIN-SPECIFIC ERROR TYPES
/// ============================================================================

/// Validation errors for request payloads
#[derive(Debug, Clone, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is empty")]
    EmptyField(&'static str),
    #[error("{0} is too short (minimum {1} characters)")]
    TooShort(&'static str, usize),
    #[error("{0} is too long (maximum {1} characters)")]
    TooLong(&'static str, usize),
    #[error("{0} has invalid format")]
    InvalidFormat(&'static str),
    #[error("{0} contains suspicious content")]
    SuspiciousContent(&'static str),
    #[error("password must contain at least one digit, one lowercase letter, and one uppercase letter")]
    WeakPassword,
    #[error("Email already exists!")]
    EmailAlreadyExists,
    #[error("Invalid payload")]
    InvalidPayload,
}

/// Persistence errors raised by the refresh token store and identity provider
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// A unique column collided (e.g. a refresh token value). Recoverable by
    /// regenerating the value.
    #[error("Duplicate entry: {0}")]
    UniqueConstraintViolation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    /// Transient infrastructure failure. Callers retry the whole request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Query error: {0}")]
    QueryExecution(String),
    #[error("Database error: {0}")]
    UnexpectedError(String),
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required config: {0}")]
    MissingRequired(String),
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
    #[error("Config parse error: {0}")]
    ParseError(String),
}

/// Authentication and token errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// Token could not be decoded at all
    #[error("Malformed token")]
    MalformedToken,
    /// Signature, algorithm or issuer did not verify
    #[error("Token signature verification failed")]
    InvalidSignature,
    /// Refresh token unknown, used, revoked, or not paired with the access token
    #[error("Invalid token")]
    TokenInvalid,
    #[error("Token has expired")]
    TokenExpired,
    #[error("Missing authentication token")]
    MissingToken,
}

/// ============================================================================
/// 2. UNIFIED APPLICATION ERROR TYPE
/// ============================================================================

/// Central error type that all application errors map to
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True for the transient store failure class; the refresh token was not
    /// necessarily consumed.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, AppError::Database(DatabaseError::Unavailable(_)))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            AppError::Database(DatabaseError::UniqueConstraintViolation(_))
        )
    }
}

// ============================================================================
// FROM IMPLEMENTATIONS
// ============================================================================

const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                    let constraint = db_err.constraint().unwrap_or("unique").to_string();
                    AppError::Database(DatabaseError::UniqueConstraintViolation(constraint))
                } else {
                    AppError::Database(DatabaseError::QueryExecution(db_err.to_string()))
                }
            }
            sqlx::Error::RowNotFound => {
                AppError::Database(DatabaseError::NotFound("Record not found".to_string()))
            }
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => AppError::Database(DatabaseError::Unavailable(err.to_string())),
            other => AppError::Database(DatabaseError::UnexpectedError(other.to_string())),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(ConfigError::ParseError(err.to_string()))
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Internal(msg)
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

const INVALID_TOKENS: &str = "Invalid tokens";
const EXPIRED_TOKENS: &str = "Expired tokens";
const SERVER_ERROR: &str = "Server Error";

/// Trait for converting errors to HTTP responses with proper logging
pub trait ErrorHandler {
    fn to_envelope(&self) -> (StatusCode, AuthResult);
    fn log_error(&self, request_id: &str);
}

impl AppError {
    fn client_message(&self) -> String {
        match self {
            AppError::Validation(e) => e.to_string(),
            AppError::Auth(e) => match e {
                AuthError::InvalidCredentials => "Invalid credentials".to_string(),
                AuthError::TokenExpired => EXPIRED_TOKENS.to_string(),
                AuthError::MissingToken => "Missing authentication token".to_string(),
                AuthError::MalformedToken
                | AuthError::InvalidSignature
                | AuthError::TokenInvalid => INVALID_TOKENS.to_string(),
            },
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                SERVER_ERROR.to_string()
            }
        }
    }
}

impl ErrorHandler for AppError {
    fn to_envelope(&self) -> (StatusCode, AuthResult) {
        (
            ResponseError::status_code(self),
            AuthResult::failure(vec![self.client_message()]),
        )
    }

    fn log_error(&self, request_id: &str) {
        match self {
            AppError::Validation(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Validation error");
            }
            AppError::Database(e @ DatabaseError::UniqueConstraintViolation(_)) => {
                tracing::warn!(request_id = request_id, error = %e, "Duplicate entry");
            }
            AppError::Database(e @ DatabaseError::Unavailable(_)) => {
                tracing::error!(request_id = request_id, error = %e, "Store unavailable");
            }
            AppError::Database(e) => {
                tracing::error!(request_id = request_id, error = %e, "Database error");
            }
            AppError::Auth(AuthError::InvalidCredentials) => {
                tracing::warn!(request_id = request_id, "Invalid credentials attempt");
            }
            AppError::Auth(e) => {
                tracing::warn!(request_id = request_id, error = %e, "Authentication error");
            }
            AppError::Config(e) => {
                tracing::error!(request_id = request_id, error = %e, "Configuration error");
            }
            AppError::Internal(msg) => {
                tracing::error!(request_id = request_id, error = %msg, "Internal error");
            }
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let (status, body) = self.to_envelope();

        HttpResponse::build(status)
            .insert_header(("x-request-id", request_id))
            .json(body)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(AuthError::MissingToken) => StatusCode::UNAUTHORIZED,
            AppError::Auth(_) => StatusCode::BAD_REQUEST,
            AppError::Database(DatabaseError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Per-request context used to correlate a handler's own log lines.
/// Failures are logged once, by `ResponseError::error_response`.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub operation: &'static str,
}

impl ErrorContext {
    pub fn new(operation: &'static str) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            operation,
        }
    }
}
