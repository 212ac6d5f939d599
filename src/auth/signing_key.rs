/// Signing Key Provider
///
/// Supplies the symmetric secret and the single algorithm used to sign and
/// verify access tokens.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};

use crate::configuration::JwtSettings;
use crate::error::{AppError, ConfigError};

const MIN_SECRET_LENGTH: usize = 32;

#[derive(Clone)]
pub struct SigningKey {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKey {
    /// HMAC-SHA256 key from a raw secret
    ///
    /// # Errors
    /// Returns a config error if the secret is shorter than 32 bytes
    pub fn hs256(secret: &[u8]) -> Result<Self, AppError> {
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(AppError::Config(ConfigError::InvalidValue(format!(
                "jwt.secret must be at least {} bytes",
                MIN_SECRET_LENGTH
            ))));
        }

        Ok(Self {
            algorithm: Algorithm::HS256,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        })
    }

    pub fn from_settings(settings: &JwtSettings) -> Result<Self, AppError> {
        Self::hs256(settings.secret.as_bytes())
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}
