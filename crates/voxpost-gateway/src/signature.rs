// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HMAC-SHA256 webhook signatures.
//!
//! The `X-Signature` header carries the hex digest of the raw body, with
//! an optional `sha256=` prefix.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-signature";

/// Hex signature of `body` under `secret`.
pub fn sign(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of `header` against the body's signature.
pub fn verify(secret: &str, body: &[u8], header: Option<&str>) -> bool {
    let Some(header) = header else {
        return false;
    };
    let header = header.trim();
    let digest = header.strip_prefix("sha256=").unwrap_or(header);
    let Ok(expected) = hex::decode(digest) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_body_verifies() {
        let body = br#"{"event":"payment.succeeded"}"#;
        let sig = sign("s3cret", body);
        assert_eq!(sig.len(), 64);
        assert!(verify("s3cret", body, Some(&sig)));
        assert!(verify("s3cret", body, Some(&format!("sha256={sig}"))));
    }

    #[test]
    fn tampering_is_detected() {
        let sig = sign("s3cret", b"original");
        assert!(!verify("s3cret", b"tampered", Some(&sig)));
        assert!(!verify("other", b"original", Some(&sig)));
        assert!(!verify("s3cret", b"original", Some("not-hex")));
        assert!(!verify("s3cret", b"original", None));
    }
}
