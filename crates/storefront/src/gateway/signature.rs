//! Callback signature verification.
//!
//! Callbacks are signed with HMAC-SHA256 (hex) using the gateway key secret.
//! Captured payments sign `"{transaction_id}|{payment_id}"`, which is the
//! gateway's standard checkout signature. Failed payments sign
//! `"{transaction_id}|{payment_id}|failed"` so a capture signature can never
//! be replayed as a failure.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::GatewayError;

/// Outcome reported by a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackStatus {
    Captured,
    Failed,
}

/// The exact string that is signed for a callback.
#[must_use]
pub fn signing_payload(transaction_id: &str, payment_id: &str, status: CallbackStatus) -> String {
    match status {
        CallbackStatus::Captured => format!("{transaction_id}|{payment_id}"),
        CallbackStatus::Failed => format!("{transaction_id}|{payment_id}|failed"),
    }
}

/// Compute the hex HMAC-SHA256 of `payload` under `secret`.
///
/// # Errors
///
/// Returns [`GatewayError::Signature`] if the MAC cannot be keyed.
pub fn sign(secret: &str, payload: &str) -> Result<String, GatewayError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| GatewayError::Signature(e.to_string()))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verifies callback signatures with the gateway key secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: SecretString,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl SignatureVerifier {
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Whether `signature` is valid for the callback fields.
    #[must_use]
    pub fn verify(
        &self,
        transaction_id: &str,
        payment_id: &str,
        status: CallbackStatus,
        signature: &str,
    ) -> bool {
        let payload = signing_payload(transaction_id, payment_id, status);
        sign(self.secret.expose_secret(), &payload)
            .is_ok_and(|expected| constant_time_compare(&expected, &signature.to_ascii_lowercase()))
    }
}

/// Compare two strings without short-circuiting on the first difference.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result: u8 = 0;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_7fQ2mZ9xLp";

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(SecretString::from(SECRET.to_owned()))
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc", "abc"));
        assert!(!constant_time_compare("abc", "abd"));
        assert!(!constant_time_compare("abc", "abcd"));
    }

    #[test]
    fn test_known_hmac_vector() {
        // RFC 4231 test case 2
        let sig = sign("Jefe", "what do ya want for nothing?").unwrap();
        assert_eq!(
            sig,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_verify_captured() {
        let sig = sign(SECRET, "order_123|pay_456").unwrap();
        assert!(verifier().verify("order_123", "pay_456", CallbackStatus::Captured, &sig));
        assert!(!verifier().verify("order_123", "pay_999", CallbackStatus::Captured, &sig));
    }

    #[test]
    fn test_capture_signature_cannot_mark_failed() {
        let sig = sign(SECRET, "order_123|pay_456").unwrap();
        assert!(!verifier().verify("order_123", "pay_456", CallbackStatus::Failed, &sig));

        let failed = sign(SECRET, &signing_payload("order_123", "pay_456", CallbackStatus::Failed))
            .unwrap();
        assert!(verifier().verify("order_123", "pay_456", CallbackStatus::Failed, &failed));
    }

    #[test]
    fn test_verify_accepts_uppercase_hex() {
        let sig = sign(SECRET, "order_1|pay_1").unwrap().to_uppercase();
        assert!(verifier().verify("order_1", "pay_1", CallbackStatus::Captured, &sig));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", verifier());
        assert!(!debug.contains(SECRET));
    }
}
