/// Password Hashing and Verification
///
/// bcrypt hashes for the identity collaborators. Strength rules live in
/// `validators::is_valid_password` and run before anything is hashed.

use bcrypt::{hash, verify};
use tokio::sync::OnceCell;

use crate::error::AppError;

pub use bcrypt::DEFAULT_COST;

const DECOY_PASSWORD: &str = "decoy-password-for-unknown-accounts";

/// Hash a password with bcrypt at `cost`
///
/// # Errors
/// Returns an internal error if bcrypt fails (e.g. cost out of range)
pub fn hash_password(password: &str, cost: u32) -> Result<String, AppError> {
    hash(password, cost).map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its hash
///
/// # Errors
/// Returns an internal error if the stored hash is unreadable
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    verify(password, hash)
        .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
}

/// `hash_password` on the blocking pool
pub async fn hash_password_blocking(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
}

/// `verify_password` on the blocking pool
pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
}

/// A hash nobody knows the password to, built on first use at the
/// provider's cost. Logins for unknown emails verify against it so they
/// cost the same as a wrong password.
pub struct DecoyHash {
    cost: u32,
    hash: OnceCell<String>,
}

impl DecoyHash {
    pub fn new(cost: u32) -> Self {
        Self {
            cost,
            hash: OnceCell::new(),
        }
    }

    pub async fn verify(&self, plaintext: &str) -> Result<(), AppError> {
        let hash = self
            .hash
            .get_or_try_init(|| hash_password_blocking(DECOY_PASSWORD.to_string(), self.cost))
            .await?;

        verify_password_blocking(plaintext.to_string(), hash.clone()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // bcrypt's minimum cost keeps the tests fast
    const TEST_COST: u32 = 4;

    #[test]
    fn test_hash_password() {
        let password = "ValidPassword123";
        let hash = hash_password(password, TEST_COST).expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(hash.starts_with("$2"));
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("ValidPassword123", TEST_COST).expect("Failed to hash password");

        assert!(verify_password("ValidPassword123", &hash).expect("Failed to verify password"));
        assert!(!verify_password("WrongPassword123", &hash).expect("Failed to verify password"));
    }

    #[test]
    fn test_corrupt_hash() {
        assert!(verify_password("ValidPassword123", "not-a-bcrypt-hash").is_err());
    }

    #[test]
    fn test_invalid_cost() {
        assert!(hash_password("ValidPassword123", 2).is_err());
    }

    #[tokio::test]
    async fn test_blocking_variants() {
        let hash = hash_password_blocking("ValidPassword123".to_string(), TEST_COST)
            .await
            .expect("Failed to hash password");

        assert!(verify_password_blocking("ValidPassword123".to_string(), hash.clone())
            .await
            .unwrap());
        assert!(!verify_password_blocking("WrongPassword123".to_string(), hash)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_decoy_hash_is_built_once_at_cost() {
        let decoy = DecoyHash::new(TEST_COST);
        assert!(decoy.hash.get().is_none());

        decoy.verify("anything").await.expect("decoy verify failed");
        let first = decoy.hash.get().cloned().expect("hash built");
        assert!(first.starts_with("$2b$04$"));

        decoy.verify("something else").await.expect("decoy verify failed");
        assert_eq!(decoy.hash.get(), Some(&first));
    }
}
