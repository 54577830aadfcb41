//! Share token generation.

use rand::Rng;

/// Length of generated share tokens.
const TOKEN_LENGTH: usize = 32;

/// A fresh URL-safe alphanumeric token. Uniqueness is enforced by the
/// store; callers retry on the (vanishingly rare) collision.
pub fn generate_token() -> String {
    rand::rng()
        .sample_iter(rand::distr::Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}
