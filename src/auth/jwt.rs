/// Access Token Codec
///
/// Encodes and decodes signed access tokens. Verification is split in two:
/// `verify_structure_and_signature` ignores expiry (the refresh flow expects
/// expired tokens), `authenticate` enforces it for protected routes.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Header, Validation};

use crate::auth::claims::Claims;
use crate::auth::signing_key::SigningKey;
use crate::error::{AppError, AuthError};
use crate::identity::Identity;

/// A freshly signed access token and the claims it carries
#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    pub token: String,
    pub claims: Claims,
}

#[derive(Debug, Clone)]
pub struct AccessTokenCodec {
    key: SigningKey,
    issuer: String,
}

impl AccessTokenCodec {
    pub fn new(key: SigningKey, issuer: impl Into<String>) -> Self {
        Self {
            key,
            issuer: issuer.into(),
        }
    }

    /// Sign a new access token for `identity`, valid for `ttl_seconds`
    ///
    /// # Errors
    /// Returns an internal error if signing fails
    pub fn issue(&self, identity: &Identity, ttl_seconds: i64) -> Result<IssuedAccessToken, AppError> {
        let claims = Claims::new(identity, ttl_seconds, self.issuer.clone());

        let token = encode(
            &Header::new(self.key.algorithm()),
            &claims,
            self.key.encoding_key(),
        )
        .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))?;

        Ok(IssuedAccessToken { token, claims })
    }

    /// Verify signature, algorithm and issuer without looking at `exp`
    ///
    /// # Errors
    /// - `MalformedToken` if the input is not a decodable token
    /// - `InvalidSignature` if the signature, algorithm or issuer is wrong
    pub fn verify_structure_and_signature(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = self.validation();
        validation.validate_exp = false;
        self.decode(token, &validation)
    }

    /// Full verification including expiry, for bearer authentication
    pub fn authenticate(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = self.validation();
        validation.leeway = 0;
        self.decode(token, &validation)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.key.algorithm());
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);
        validation
    }

    fn decode(&self, token: &str, validation: &Validation) -> Result<Claims, AuthError> {
        decode::<Claims>(token, self.key.decoding_key(), validation)
            .map(|data| data.claims)
            .map_err(|e| {
                let error = classify(e.kind());
                tracing::warn!(reason = %e, error = %error, "Access token rejected");
                error
            })
    }
}

fn classify(kind: &ErrorKind) -> AuthError {
    match kind {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        // header algorithm differs from the configured one
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::InvalidIssuer => AuthError::InvalidSignature,
        ErrorKind::InvalidToken
        | ErrorKind::Base64(_)
        | ErrorKind::Json(_)
        | ErrorKind::Utf8(_)
        | ErrorKind::MissingRequiredClaim(_) => AuthError::MalformedToken,
        _ => AuthError::TokenInvalid,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{Algorithm, EncodingKey};
    use uuid::Uuid;

    const SECRET: &[u8] = b"test-secret-key-at-least-32-characters-long";

    fn codec() -> AccessTokenCodec {
        AccessTokenCodec::new(SigningKey::hs256(SECRET).expect("key"), "test")
    }

    fn identity() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
        }
    }

    #[test]
    fn test_issue_and_verify_token() {
        let codec = codec();
        let identity = identity();

        let issued = codec.issue(&identity, 3600).expect("Failed to issue token");
        let claims = codec
            .verify_structure_and_signature(&issued.token)
            .expect("Failed to verify token");

        assert_eq!(claims, issued.claims);
        assert_eq!(claims.sub, identity.id.to_string());
        assert_eq!(claims.email, identity.email);
        assert_eq!(claims.iss, "test");
    }

    #[test]
    fn test_expired_token_still_verifies_structure() {
        let codec = codec();
        let issued = codec.issue(&identity(), -3600).expect("Failed to issue token");

        let claims = codec
            .verify_structure_and_signature(&issued.token)
            .expect("Expired token should pass structural verification");
        assert!(claims.is_expired());
    }

    #[test]
    fn test_authenticate_rejects_expired_token() {
        let codec = codec();
        let issued = codec.issue(&identity(), -3600).expect("Failed to issue token");

        assert_eq!(codec.authenticate(&issued.token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn test_authenticate_accepts_live_token() {
        let codec = codec();
        let issued = codec.issue(&identity(), 3600).expect("Failed to issue token");

        assert!(codec.authenticate(&issued.token).is_ok());
    }

    #[test]
    fn test_malformed_token() {
        let codec = codec();

        assert_eq!(
            codec.verify_structure_and_signature("not-a-token"),
            Err(AuthError::MalformedToken)
        );
        assert_eq!(
            codec.verify_structure_and_signature("invalid.token.here"),
            Err(AuthError::MalformedToken)
        );
    }

    #[test]
    fn test_token_signed_with_other_key() {
        let other = AccessTokenCodec::new(
            SigningKey::hs256(b"another-secret-key-also-32-characters-long").expect("key"),
            "test",
        );
        let issued = other.issue(&identity(), 3600).expect("Failed to issue token");

        assert_eq!(
            codec().verify_structure_and_signature(&issued.token),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn test_algorithm_substitution_rejected() {
        let claims = Claims::new(&identity(), 3600, "test".to_string());
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .expect("Failed to encode");

        assert_eq!(
            codec().verify_structure_and_signature(&token),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn test_wrong_issuer() {
        let issued = codec().issue(&identity(), 3600).expect("Failed to issue token");
        let other = AccessTokenCodec::new(SigningKey::hs256(SECRET).expect("key"), "wrong-issuer");

        assert_eq!(
            other.verify_structure_and_signature(&issued.token),
            Err(AuthError::InvalidSignature)
        );
    }
}
