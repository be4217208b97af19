//! Webhook signature verification (`X-Hub-Signature-256`).

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const PREFIX: &str = "sha256=";

/// Compute the `sha256=<hex>` header value GitHub would send for `body`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    format!("{}{}", PREFIX, hex::encode(digest(secret, body)))
}

/// Check `header` against the HMAC-SHA256 of `body` under `secret`.
///
/// Never errors: absent, malformed, or mismatched signatures all yield `false`.
pub fn verify(secret: &str, body: &[u8], header: Option<&str>) -> bool {
    let Some(header) = header else {
        tracing::debug!("webhook signature header absent");
        return false;
    };

    let Some(hex_sig) = header.trim().strip_prefix(PREFIX) else {
        tracing::debug!("webhook signature has unexpected format");
        return false;
    };

    let provided = match hex::decode(hex_sig) {
        Ok(bytes) => bytes,
        Err(_) => {
            tracing::debug!("webhook signature is not valid hex");
            return false;
        }
    };

    let expected = digest(secret, body);
    // ct_eq on slices of different length returns false without panicking
    let ok: bool = expected.as_slice().ct_eq(provided.as_slice()).into();
    if !ok {
        tracing::warn!("webhook signature mismatch");
    }
    ok
}

fn digest(secret: &str, body: &[u8]) -> Vec<u8> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(body);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "It's a Secret to Everybody";

    #[test]
    fn test_known_github_vector() {
        // Example from GitHub's webhook validation docs.
        let sig = sign(SECRET, b"Hello, World!");
        assert_eq!(
            sig,
            "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17"
        );
    }

    #[test]
    fn test_valid_signature_accepted() {
        let body = br#"{"action":"opened"}"#;
        let header = sign(SECRET, body);
        assert!(verify(SECRET, body, Some(&header)));
    }

    #[test]
    fn test_signature_for_other_body_rejected() {
        let header = sign(SECRET, b"original");
        assert!(!verify(SECRET, b"tampered", Some(&header)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let header = sign("another-secret", b"payload");
        assert!(!verify(SECRET, b"payload", Some(&header)));
    }

    #[test]
    fn test_missing_header_rejected() {
        assert!(!verify(SECRET, b"payload", None));
    }

    #[test]
    fn test_malformed_headers_rejected() {
        let body = b"payload";
        let good = sign(SECRET, body);
        let bare_hex = good.trim_start_matches("sha256=").to_string();

        assert!(!verify(SECRET, body, Some(&bare_hex)));
        assert!(!verify(SECRET, body, Some("sha1=abcdef")));
        assert!(!verify(SECRET, body, Some("sha256=not-hex-at-all")));
        assert!(!verify(SECRET, body, Some("sha256=abcd")));
        assert!(!verify(SECRET, body, Some("")));
    }

    #[test]
    fn test_uppercase_hex_accepted() {
        let body = b"payload";
        let upper = format!("sha256={}", sign(SECRET, body)[7..].to_uppercase());
        assert!(verify(SECRET, body, Some(&upper)));
    }
}
