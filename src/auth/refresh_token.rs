/// Refresh Token Records
///
/// A refresh token is an opaque random value persisted together with the
/// `jti` of the access token it was issued alongside. Records are never
/// mutated in place: state changes go through `redeem` / `revoke`, which
/// return the next record and refuse transitions out of a terminal state.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// A record that has not been persisted yet (no surrogate id)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRefreshToken {
    pub jwt_id: String,
    pub token_value: String,
    pub user_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NewRefreshToken {
    pub fn new(jwt_id: String, token_value: String, user_id: Uuid, ttl_seconds: i64) -> Self {
        let issued_at = Utc::now();
        Self {
            jwt_id,
            token_value,
            user_id,
            issued_at,
            expires_at: issued_at + Duration::seconds(ttl_seconds),
        }
    }

    pub fn into_record(self, id: i64) -> RefreshTokenRecord {
        RefreshTokenRecord {
            id,
            jwt_id: self.jwt_id,
            token_value: self.token_value,
            user_id: self.user_id,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            is_used: false,
            is_revoked: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub jwt_id: String,
    pub token_value: String,
    pub user_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub is_revoked: bool,
}

/// Lifecycle state of a refresh token. Everything but `Active` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTokenState {
    Active,
    Redeemed,
    Revoked,
    Expired,
}

impl RefreshTokenState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshTokenState::Active => "active",
            RefreshTokenState::Redeemed => "redeemed",
            RefreshTokenState::Revoked => "revoked",
            RefreshTokenState::Expired => "expired",
        }
    }
}

/// Attempted transition out of a state that does not allow it
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("refresh token cannot leave state {}", .0.as_str())]
pub struct TransitionError(pub RefreshTokenState);

impl RefreshTokenRecord {
    /// Revocation wins over redemption, and both over expiry
    pub fn state_at(&self, now: DateTime<Utc>) -> RefreshTokenState {
        if self.is_revoked {
            RefreshTokenState::Revoked
        } else if self.is_used {
            RefreshTokenState::Redeemed
        } else if self.expires_at < now {
            RefreshTokenState::Expired
        } else {
            RefreshTokenState::Active
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Flip `is_used`. Expiry is the caller's check; this only guards the flags.
    pub fn redeem(&self) -> Result<Self, TransitionError> {
        if self.is_revoked {
            return Err(TransitionError(RefreshTokenState::Revoked));
        }
        if self.is_used {
            return Err(TransitionError(RefreshTokenState::Redeemed));
        }
        Ok(Self {
            is_used: true,
            ..self.clone()
        })
    }

    /// Revoking is allowed from any state and is idempotent
    pub fn revoke(&self) -> Self {
        Self {
            is_revoked: true,
            ..self.clone()
        }
    }

    /// First characters of the value, safe to put in logs
    pub fn value_hint(&self) -> &str {
        value_hint(&self.token_value)
    }
}

pub fn value_hint(value: &str) -> &str {
    let end = value
        .char_indices()
        .nth(4)
        .map(|(i, _)| i)
        .unwrap_or(value.len());
    &value[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ttl_seconds: i64) -> RefreshTokenRecord {
        NewRefreshToken::new(
            "jti-1".to_string(),
            "AbCdEfGhIjKlMnOpQrStUvW".to_string(),
            Uuid::new_v4(),
            ttl_seconds,
        )
        .into_record(1)
    }

    #[test]
    fn test_new_record_is_active() {
        let record = record(3600);

        assert!(!record.is_used);
        assert!(!record.is_revoked);
        assert_eq!(record.expires_at - record.issued_at, Duration::seconds(3600));
        assert_eq!(record.state_at(Utc::now()), RefreshTokenState::Active);
    }

    #[test]
    fn test_expiry_detected_lazily() {
        let record = record(3600);
        let later = record.expires_at + Duration::seconds(1);

        assert_eq!(record.state_at(later), RefreshTokenState::Expired);
        assert!(record.is_expired_at(later));
        assert!(!record.is_expired_at(record.expires_at));
    }

    #[test]
    fn test_redeem_once() {
        let record = record(3600);
        let redeemed = record.redeem().expect("active token should redeem");

        assert!(redeemed.is_used);
        assert!(!record.is_used, "original record is left untouched");
        assert_eq!(redeemed.state_at(Utc::now()), RefreshTokenState::Redeemed);
        assert_eq!(
            redeemed.redeem(),
            Err(TransitionError(RefreshTokenState::Redeemed))
        );
    }

    #[test]
    fn test_revoked_cannot_be_redeemed() {
        let revoked = record(3600).revoke();

        assert_eq!(revoked.state_at(Utc::now()), RefreshTokenState::Revoked);
        assert_eq!(revoked.redeem(), Err(TransitionError(RefreshTokenState::Revoked)));
    }

    #[test]
    fn test_revoke_is_monotonic() {
        let redeemed = record(3600).redeem().unwrap();
        let revoked = redeemed.revoke().revoke();

        assert!(revoked.is_revoked);
        assert!(revoked.is_used);
    }

    #[test]
    fn test_value_hint() {
        assert_eq!(value_hint("AbCdEfGh"), "AbCd");
        assert_eq!(value_hint("ab"), "ab");
    }
}
