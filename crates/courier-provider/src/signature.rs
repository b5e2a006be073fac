//! Twilio callback signature verification.
//!
//! Twilio signs status callbacks with HMAC-SHA1 over a canonical string:
//! the exact public callback URL followed by every form key and value,
//! keys sorted lexicographically. The signature travels base64-encoded in
//! the `X-Twilio-Signature` header.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

type HmacSha1 = Hmac<Sha1>;

/// Compute the expected signature for a callback.
///
/// `params` is a sorted map because the canonical string concatenates keys
/// in lexicographic order; Twilio uses the first value for each key.
#[must_use]
pub fn compute_signature(
    auth_token: &str,
    url: &str,
    params: &BTreeMap<String, String>,
) -> String {
    let mut canonical = String::from(url);
    for (key, value) in params {
        canonical.push_str(key);
        canonical.push_str(value);
    }

    let mut mac =
        <HmacSha1 as Mac>::new_from_slice(auth_token.as_bytes()).expect("HMAC accepts any key size");
    mac.update(canonical.as_bytes());

    BASE64.encode(mac.finalize().into_bytes())
}

/// Verify a provided `X-Twilio-Signature` value in constant time.
#[must_use]
pub fn verify_signature(
    auth_token: &str,
    url: &str,
    provided: &str,
    params: &BTreeMap<String, String>,
) -> bool {
    let expected = compute_signature(auth_token, url, params);
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    const URL: &str = "https://hooks.example.com/v1/webhooks/twilio/status";

    #[test]
    fn test_round_trip_verifies() {
        let form = params(&[
            ("MessageSid", "SM123"),
            ("MessageStatus", "delivered"),
        ]);
        let sig = compute_signature("token", URL, &form);
        assert!(verify_signature("token", URL, &sig, &form));
    }

    #[test]
    fn test_wrong_token_rejected() {
        let form = params(&[("MessageSid", "SM123")]);
        let sig = compute_signature("token", URL, &form);
        assert!(!verify_signature("other-token", URL, &sig, &form));
    }

    #[test]
    fn test_tampered_params_rejected() {
        let form = params(&[("MessageSid", "SM123"), ("MessageStatus", "delivered")]);
        let sig = compute_signature("token", URL, &form);

        let tampered = params(&[("MessageSid", "SM123"), ("MessageStatus", "failed")]);
        assert!(!verify_signature("token", URL, &sig, &tampered));
    }

    #[test]
    fn test_url_is_part_of_the_canonical_string() {
        let form = params(&[("MessageSid", "SM123")]);
        let sig = compute_signature("token", URL, &form);
        assert!(!verify_signature(
            "token",
            "https://other.example.com/hook",
            &sig,
            &form
        ));
    }

    #[test]
    fn test_canonical_string_sorts_keys() {
        // Same params inserted in different orders produce the same
        // signature because BTreeMap iterates sorted.
        let a = params(&[("B", "2"), ("A", "1"), ("C", "3")]);
        let b = params(&[("C", "3"), ("A", "1"), ("B", "2")]);
        assert_eq!(
            compute_signature("token", URL, &a),
            compute_signature("token", URL, &b)
        );
    }

    #[test]
    fn test_empty_signature_rejected() {
        let form = params(&[("MessageSid", "SM123")]);
        assert!(!verify_signature("token", URL, "", &form));
    }
}
