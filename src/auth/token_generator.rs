/// Random Token Generator
///
/// Refresh token values are 23 characters drawn uniformly from a fixed
/// 62-symbol alphabet using the operating system CSPRNG. The store's unique
/// constraint backstops the (negligible) chance of a collision.

use rand::rngs::OsRng;
use rand::Rng;

pub const REFRESH_TOKEN_LENGTH: usize = 23;
pub const ALPHABET: &[u8; 62] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789abcdefghijklmnopqrstuvwxyz";

pub trait RefreshTokenGenerator: Send + Sync {
    fn generate(&self) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct OsRngTokenGenerator;

impl RefreshTokenGenerator for OsRngTokenGenerator {
    fn generate(&self) -> String {
        generate_refresh_token()
    }
}

pub fn generate_refresh_token() -> String {
    let mut rng = OsRng;
    (0..REFRESH_TOKEN_LENGTH)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}
