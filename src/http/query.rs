//! Small helpers for pulling typed values out of the loosely-typed query
//! string every `/api/cmd/*` route accepts (`HashMap<String, String>` lets
//! a handler decide for itself which parameters are required).

use std::collections::HashMap;

use crate::core::error::{BridgeError, Result};

pub type RawQuery = HashMap<String, String>;

fn get<'a>(query: &'a RawQuery, key: &str) -> Option<&'a str> {
    query.get(key).map(String::as_str).filter(|s| !s.is_empty())
}

/// A present-but-possibly-empty string parameter (used for `id`, where an
/// empty value must be treated as absent by the entity resolver, not as a
/// parse failure here).
pub fn opt_str<'a>(query: &'a RawQuery, key: &str) -> Option<&'a str> {
    query.get(key).map(String::as_str)
}

pub fn require_str<'a>(query: &'a RawQuery, key: &str) -> Result<&'a str> {
    get(query, key).ok_or_else(|| BridgeError::bad_request(format!("missing parameter: {key}")))
}

pub fn opt_u8(query: &RawQuery, key: &str) -> Result<Option<u8>> {
    match get(query, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u16>()
            .ok()
            .filter(|n| *n <= 254)
            .map(|n| Some(n as u8))
            .ok_or_else(|| BridgeError::bad_request(format!("invalid {key}: {raw}"))),
    }
}

pub fn require_u8(query: &RawQuery, key: &str) -> Result<u8> {
    opt_u8(query, key)?.ok_or_else(|| BridgeError::bad_request(format!("missing parameter: {key}")))
}

pub fn opt_u8_small(query: &RawQuery, key: &str, max: u8) -> Result<Option<u8>> {
    match get(query, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u16>()
            .ok()
            .filter(|n| *n >= 1 && *n <= max as u16)
            .map(|n| Some(n as u8))
            .ok_or_else(|| BridgeError::bad_request(format!("invalid {key}: {raw}"))),
    }
}

pub fn require_f64(query: &RawQuery, key: &str) -> Result<f64> {
    let raw = require_str(query, key)?;
    let value: f64 = raw
        .parse()
        .map_err(|_| BridgeError::bad_request(format!("invalid {key}: {raw}")))?;
    if !value.is_finite() {
        return Err(BridgeError::bad_request(format!("{key} must be finite")));
    }
    Ok(value)
}

pub fn flag(query: &RawQuery, key: &str) -> bool {
    matches!(get(query, key), Some("1") | Some("true"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(pairs: &[(&str, &str)]) -> RawQuery {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn require_u8_rejects_out_of_range() {
        let query = q(&[("address", "255")]);
        assert!(require_u8(&query, "address").is_err());
        let query = q(&[("address", "254")]);
        assert_eq!(require_u8(&query, "address").unwrap(), 254);
    }

    #[test]
    fn require_f64_rejects_non_finite() {
        let query = q(&[("set", "nan")]);
        assert!(require_f64(&query, "set").is_err());
        let query = q(&[("set", "21.5")]);
        assert_eq!(require_f64(&query, "set").unwrap(), 21.5);
    }

    #[test]
    fn flag_recognises_1_and_true() {
        assert!(flag(&q(&[("refresh", "1")]), "refresh"));
        assert!(flag(&q(&[("refresh", "true")]), "refresh"));
        assert!(!flag(&q(&[("refresh", "0")]), "refresh"));
        assert!(!flag(&q(&[]), "refresh"));
    }
}
