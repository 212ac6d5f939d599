/// Authentication module
///
/// Access token signing and verification, refresh token records and their
/// store, and the lifecycle manager that issues and rotates token pairs.

mod claims;
mod jwt;
mod manager;
mod refresh_token;
mod signing_key;
mod store;
mod token_generator;

pub use claims::Claims;
pub use jwt::{AccessTokenCodec, IssuedAccessToken};
pub use manager::{TokenManager, TokenPair};
pub use refresh_token::{NewRefreshToken, RefreshTokenRecord, RefreshTokenState, TransitionError};
pub use signing_key::SigningKey;
pub use store::{InMemoryRefreshTokenStore, PgRefreshTokenStore, RefreshTokenStore};
pub use token_generator::{
    generate_refresh_token, OsRngTokenGenerator, RefreshTokenGenerator, ALPHABET,
    REFRESH_TOKEN_LENGTH,
};
