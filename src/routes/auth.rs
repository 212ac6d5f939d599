/// Authentication Routes
///
/// Registration, login, token rotation and current-user lookup under
/// `/api/auth`. Every response uses the `AuthResult` envelope.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::auth::{Claims, TokenManager, TokenPair};
use crate::error::{AppError, AuthError, ErrorContext, ValidationError};
use crate::identity::IdentityProvider;
use crate::validators::{is_valid_email, is_valid_name, is_valid_password};

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Access token (possibly expired) plus its paired refresh token
#[derive(Deserialize)]
pub struct TokenRequest {
    pub token: String,
    pub refresh_token: String,
}

/// Response envelope shared by every auth endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    pub result: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl AuthResult {
    pub fn success(pair: TokenPair) -> Self {
        Self {
            result: true,
            token: Some(pair.access_token),
            refresh_token: Some(pair.refresh_token),
            errors: None,
        }
    }

    pub fn failure(errors: Vec<String>) -> Self {
        Self {
            result: false,
            token: None,
            refresh_token: None,
            errors: Some(errors),
        }
    }
}

#[derive(Serialize)]
pub struct CurrentUserResponse {
    pub id: String,
    pub email: String,
}

/// POST /api/auth/register
///
/// The account is created before the first pair is issued. If issuing fails
/// the account still exists; the client should log in rather than register
/// again.
///
/// # Errors
/// - 400: invalid name/email/password, or email already registered
/// - 503: token store unavailable
pub async fn register(
    form: web::Json<RegisterRequest>,
    identities: web::Data<dyn IdentityProvider>,
    manager: web::Data<TokenManager>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_registration");

    let name = is_valid_name(&form.name)?;
    let email = is_valid_email(&form.email)?;
    is_valid_password(&form.password)?;

    let identity = identities.create_identity(&name, &email, &form.password).await?;
    let pair = manager.issue(&identity).await.map_err(|e| {
        tracing::warn!(
            request_id = %context.request_id,
            operation = context.operation,
            user_id = %identity.id,
            "Account created but no token pair issued; client must log in"
        );
        e
    })?;

    tracing::info!(
        request_id = %context.request_id,
        operation = context.operation,
        user_id = %identity.id,
        "User registered successfully"
    );

    Ok(HttpResponse::Ok().json(AuthResult::success(pair)))
}

/// POST /api/auth/login
///
/// An unknown email and a wrong password produce the same response and both
/// pay for one bcrypt verification; only the log tells them apart.
pub async fn login(
    form: web::Json<LoginRequest>,
    identities: web::Data<dyn IdentityProvider>,
    manager: web::Data<TokenManager>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let email = is_valid_email(&form.email).map_err(|e| {
        tracing::warn!(request_id = %context.request_id, error = %e, "Login payload rejected");
        ValidationError::InvalidPayload
    })?;
    if form.password.is_empty() {
        tracing::warn!(request_id = %context.request_id, "Login payload rejected: empty password");
        return Err(ValidationError::InvalidPayload.into());
    }

    let identity = match identities.find_identity_by_email(&email).await? {
        Some(identity) => identity,
        None => {
            identities.verify_decoy_password(&form.password).await?;
            tracing::warn!(
                request_id = %context.request_id,
                operation = context.operation,
                reason = "unknown_email",
                "Login failed"
            );
            return Err(AuthError::InvalidCredentials.into());
        }
    };

    if !identities.verify_password(&identity, &form.password).await? {
        tracing::warn!(
            request_id = %context.request_id,
            operation = context.operation,
            user_id = %identity.id,
            reason = "wrong_password",
            "Login failed"
        );
        return Err(AuthError::InvalidCredentials.into());
    }

    let pair = manager.issue(&identity).await?;

    tracing::info!(
        request_id = %context.request_id,
        operation = context.operation,
        user_id = %identity.id,
        "User logged in successfully"
    );

    Ok(HttpResponse::Ok().json(AuthResult::success(pair)))
}

/// POST /api/auth/refresh-token
///
/// # Errors
/// - 400 "Invalid tokens": bad signature, unknown/used/revoked refresh token,
///   or the two tokens were not issued together
/// - 400 "Expired tokens": refresh token past its expiry
/// - 503 "Server Error": store unavailable, retry the request
pub async fn refresh_token(
    form: web::Json<TokenRequest>,
    manager: web::Data<TokenManager>,
) -> Result<HttpResponse, AppError> {
    if form.token.is_empty() || form.refresh_token.is_empty() {
        return Err(AuthError::TokenInvalid.into());
    }

    let pair = manager.rotate(&form.token, &form.refresh_token).await?;

    Ok(HttpResponse::Ok().json(AuthResult::success(pair)))
}

/// GET /api/auth/me
///
/// Requires `Authorization: Bearer <access_token>`; claims are injected by
/// `JwtMiddleware`.
pub async fn get_current_user(claims: web::ReqData<Claims>) -> Result<HttpResponse, AppError> {
    let user_id = claims.user_id()?;

    Ok(HttpResponse::Ok().json(CurrentUserResponse {
        id: user_id.to_string(),
        email: claims.email.clone(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::InMemoryRefreshTokenStore;
    use crate::configuration::JwtSettings;
    use crate::identity::InMemoryIdentityProvider;
    use actix_web::{http::StatusCode, ResponseError};
    use std::sync::{Arc, Mutex};
    use tracing::field::{Field, Visit};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Collects the message of every event emitted while installed
    #[derive(Clone, Default)]
    struct CapturedMessages(Arc<Mutex<Vec<String>>>);

    struct MessageVisitor(String);

    impl Visit for MessageVisitor {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{:?}", value);
            }
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for CapturedMessages {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = MessageVisitor(String::new());
            event.record(&mut visitor);
            self.0.lock().unwrap().push(visitor.0);
        }
    }

    #[test]
    fn test_success_envelope() {
        let body = serde_json::to_value(AuthResult::success(TokenPair {
            access_token: "access".to_string(),
            refresh_token: "refresh".to_string(),
        }))
        .unwrap();

        assert_eq!(
            body,
            serde_json::json!({"result": true, "token": "access", "refresh_token": "refresh"})
        );
    }

    #[test]
    fn test_failure_envelope() {
        let body = serde_json::to_value(AuthResult::failure(vec!["Invalid tokens".to_string()]))
            .unwrap();

        assert_eq!(
            body,
            serde_json::json!({"result": false, "errors": ["Invalid tokens"]})
        );
    }

    #[tokio::test]
    async fn test_rejected_refresh_is_logged_once() {
        let captured = CapturedMessages::default();
        let _guard =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(captured.clone()));

        let settings = JwtSettings {
            secret: "test-secret-key-at-least-32-characters-long".to_string(),
            access_token_expiry: 1800,
            refresh_token_expiry: 604800,
            issuer: "test".to_string(),
            store_timeout_ms: 1000,
        };
        let manager = TokenManager::new(
            &settings,
            Arc::new(InMemoryRefreshTokenStore::new()),
            Arc::new(InMemoryIdentityProvider::with_cost(4)),
        )
        .unwrap();

        let err = refresh_token(
            web::Json(TokenRequest {
                token: "garbage".to_string(),
                refresh_token: "unknown".to_string(),
            }),
            web::Data::new(manager),
        )
        .await
        .unwrap_err();
        let response = err.error_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let messages = captured.0.lock().unwrap().clone();
        let failure_logs = messages
            .iter()
            .filter(|m| m.as_str() == "Authentication error" || m.as_str() == "Request rejected")
            .count();
        assert_eq!(failure_logs, 1, "logged: {:?}", messages);
    }
}
