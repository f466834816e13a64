//! Anti-forgery state for the OAuth handshake
//!
//! The state value travels twice: once in an HTTP-only cookie set when the
//! login starts, and once through the provider as the `state` query
//! parameter. The callback only proceeds when both copies agree.

use axum_extra::extract::cookie::{Cookie, SameSite};
use rand::{Rng, distributions::Alphanumeric};

/// Name of the cookie holding the pending OAuth state
pub const STATE_COOKIE_NAME: &str = "oauth_state";

/// Length of a generated state value
pub const STATE_LENGTH: usize = 20;

/// Lifetime of the state cookie in seconds
pub const STATE_COOKIE_MAX_AGE: i64 = 300;

/// Generate a fresh state value from the thread-local CSPRNG.
pub fn generate_state() -> String {
    generate_state_with(&mut rand::thread_rng())
}

/// Generate a state value from `rng`.
///
/// Draws [`STATE_LENGTH`] characters uniformly from `[a-zA-Z0-9]`.
pub fn generate_state_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(STATE_LENGTH)
        .map(char::from)
        .collect()
}

/// Build the state cookie.
///
/// `SameSite=Lax` is required: the browser must send the cookie on the
/// top-level redirect back from the provider.
pub fn state_cookie(state: String) -> Cookie<'static> {
    Cookie::build((STATE_COOKIE_NAME, state))
        .path("/")
        .max_age(time::Duration::seconds(STATE_COOKIE_MAX_AGE))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Lax)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    fn generated_state_is_twenty_alphanumerics() {
        for _ in 0..200 {
            let state = generate_state();
            assert_eq!(state.len(), STATE_LENGTH);
            assert!(state.chars().all(|c| c.is_ascii_alphanumeric()), "{state}");
        }
    }

    #[test]
    fn generated_states_differ() {
        assert_ne!(generate_state(), generate_state());
    }

    #[test]
    fn seeded_generation_is_reproducible() {
        let first = generate_state_with(&mut StdRng::seed_from_u64(7));
        let second = generate_state_with(&mut StdRng::seed_from_u64(7));
        assert_eq!(first, second);
    }

    #[test]
    fn state_cookie_carries_required_attributes() {
        let cookie = state_cookie("abc".to_string());
        assert_eq!(cookie.name(), STATE_COOKIE_NAME);
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(300)));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    }
}
