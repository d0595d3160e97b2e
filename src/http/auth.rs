//! The token gate (C8): every `/api/*` route except `/api/config` compares
//! a query-string `token` against the configured `apiToken` as opaque
//! text. An empty configured token denies every gated route.

use crate::app::AppState;
use crate::core::error::{BridgeError, Result};
use crate::http::query::RawQuery;

/// Constant-time byte comparison. Plain equality is sufficient for the
/// stated threat model (spec §9); this is the "defensible hardening"
/// the design notes call out, at no extra dependency cost.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub async fn require_token(state: &AppState, query: &RawQuery) -> Result<()> {
    let config = state.store.config().await;
    if config.api_token.is_empty() {
        return Err(BridgeError::Unauthorised);
    }
    let provided = query.get("token").map(String::as_str).unwrap_or("");
    if constant_time_eq(provided, &config.api_token) {
        Ok(())
    } else {
        Err(BridgeError::Unauthorised)
    }
}

#[cfg(test)]
mod tests {
    use super::constant_time_eq;

    #[test]
    fn equal_strings_match() {
        assert!(constant_time_eq("secret", "secret"));
    }

    #[test]
    fn different_lengths_or_content_do_not_match() {
        assert!(!constant_time_eq("secret", "secre"));
        assert!(!constant_time_eq("secret", "SECRET"));
        assert!(!constant_time_eq("", "x"));
    }
}
