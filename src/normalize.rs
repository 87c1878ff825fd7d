//! Body normalization
//!
//! Trims insignificant whitespace out of JSON bodies before they are cached.

use axum::body::Bytes;
use serde_json::Value;

use crate::error::NormalizeError;

/// Re-serializes a JSON document in its compact form.
///
/// Object keys come out in sorted order, so the result is canonical as well
/// as minified. Fails if `body` is not a single well-formed JSON value.
pub fn normalize(body: &[u8]) -> Result<Bytes, NormalizeError> {
    let value: Value = serde_json::from_slice(body)?;
    Ok(Bytes::from(serde_json::to_vec(&value)?))
}

/// Normalizes `body`, falling back to the raw bytes when it is not JSON.
pub fn normalize_or_raw(body: Bytes) -> Bytes {
    match normalize(&body) {
        Ok(normalized) => normalized,
        Err(err) => {
            tracing::debug!("caching raw body: {}", err);
            body
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minifies_object() {
        let out = normalize(br#"{"a": 1,   "b":2}"#).unwrap();
        assert_eq!(&out[..], br#"{"a":1,"b":2}"#);
    }

    #[test]
    fn test_minifies_nested_and_arrays() {
        let out = normalize(b"[ 1, {\n  \"x\" : [ true, null ] } ]").unwrap();
        assert_eq!(&out[..], br#"[1,{"x":[true,null]}]"#);
    }

    #[test]
    fn test_sorts_object_keys() {
        let out = normalize(br#"{"b":1,"a":2}"#).unwrap();
        assert_eq!(&out[..], br#"{"a":2,"b":1}"#);
    }

    #[test]
    fn test_rejects_non_json() {
        assert!(normalize(b"hello").is_err());
        assert!(normalize(b"").is_err());
        assert!(normalize(br#"{"a":1"#).is_err());
    }

    #[test]
    fn test_fallback_keeps_raw_bytes() {
        let raw = Bytes::from_static(b"hello");
        assert_eq!(normalize_or_raw(raw.clone()), raw);
    }

    #[test]
    fn test_idempotent() {
        let once = normalize(b"{ \"k\" : [1, 2, 3] }").unwrap();
        let twice = normalize(&once).unwrap();
        assert_eq!(once, twice);
    }
}
