//! Request credential verification.
//!
//! Callers present a credential header binding the request to the sender of
//! its payment. The orchestrator issues these credentials during discovery as
//! an HMAC-SHA256 auth token over the sender, an auth session id and an
//! expiry, so verification needs nothing but the shared secret.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::CoreError;
use crate::payment::Sender;

/// Request header carrying the encoded credentials.
pub const CREDENTIALS_HEADER: &str = "Livepeer-Segment";

type HmacSha256 = Hmac<Sha256>;

/// Verifies that a request's credentials belong to the paying sender.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Check the raw credential header value against `sender`.
    ///
    /// Any failure is reported as [`CoreError::Unauthorized`].
    async fn verify(&self, header: Option<&str>, sender: &Sender) -> Result<(), CoreError>;
}

/// Decoded contents of the credential header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentCredentials {
    pub sender: String,
    pub session_id: String,
    pub expiration_unix: i64,
    /// Hex HMAC-SHA256 over `"{sender}|{session_id}|{expiration_unix}"`.
    pub token: String,
}

/// [`CredentialVerifier`] backed by a shared HMAC secret.
pub struct HmacCredentialVerifier {
    secret: Vec<u8>,
}

impl HmacCredentialVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Mint a credential header for `sender`, valid for `ttl_secs` seconds.
    pub fn issue(&self, sender: &Sender, session_id: &str, ttl_secs: i64) -> String {
        let expiration_unix = chrono::Utc::now().timestamp() + ttl_secs;
        let token = hex::encode(self.sign(sender.as_str(), session_id, expiration_unix));
        let creds = SegmentCredentials {
            sender: sender.as_str().to_string(),
            session_id: session_id.to_string(),
            expiration_unix,
            token,
        };
        STANDARD.encode(serde_json::to_vec(&creds).unwrap_or_default())
    }

    fn mac(&self, sender: &str, session_id: &str, expiration_unix: i64) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(format!("{sender}|{session_id}|{expiration_unix}").as_bytes());
        mac
    }

    fn sign(&self, sender: &str, session_id: &str, expiration_unix: i64) -> Vec<u8> {
        self.mac(sender, session_id, expiration_unix)
            .finalize()
            .into_bytes()
            .to_vec()
    }

    fn decode(header: Option<&str>) -> Result<SegmentCredentials, CoreError> {
        let header = header
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| CoreError::Unauthorized("missing credentials".into()))?;
        let bytes = STANDARD
            .decode(header)
            .map_err(|_| CoreError::Unauthorized("invalid credentials encoding".into()))?;
        serde_json::from_slice(&bytes)
            .map_err(|_| CoreError::Unauthorized("invalid credentials".into()))
    }
}

#[async_trait]
impl CredentialVerifier for HmacCredentialVerifier {
    async fn verify(&self, header: Option<&str>, sender: &Sender) -> Result<(), CoreError> {
        let creds = Self::decode(header)?;

        let claimed = Sender::parse(&creds.sender)
            .map_err(|_| CoreError::Unauthorized("invalid credential sender".into()))?;
        if &claimed != sender {
            return Err(CoreError::Unauthorized(
                "credentials do not match payment sender".into(),
            ));
        }

        if creds.expiration_unix < chrono::Utc::now().timestamp() {
            return Err(CoreError::Unauthorized("expired auth token".into()));
        }

        let token = hex::decode(&creds.token)
            .ok_or_else(|| CoreError::Unauthorized("invalid auth token".into()))?;
        self.mac(claimed.as_str(), &creds.session_id, creds.expiration_unix)
            .verify_slice(&token)
            .map_err(|_| CoreError::Unauthorized("invalid auth token".into()))
    }
}

// ---------------------------------------------------------------------------
// hex helpers (no extra dep)
// ---------------------------------------------------------------------------

mod hex {
    /// Encode bytes as a lowercase hex string.
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Decode a hex string; `None` on odd length or a non-hex digit.
    pub fn decode(s: &str) -> Option<Vec<u8>> {
        if s.len() % 2 != 0 {
            return None;
        }
        (0..s.len())
            .step_by(2)
            .map(|i| s.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn sender() -> Sender {
        Sender::parse("0x00000000000000000000000000000000000000aa").unwrap()
    }

    #[tokio::test]
    async fn issued_credentials_verify() {
        let verifier = HmacCredentialVerifier::new("secret");
        let header = verifier.issue(&sender(), "auth-session", 60);
        assert!(verifier.verify(Some(&header), &sender()).await.is_ok());
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let verifier = HmacCredentialVerifier::new("secret");
        assert_matches!(
            verifier.verify(None, &sender()).await,
            Err(CoreError::Unauthorized(_))
        );
    }

    #[tokio::test]
    async fn other_sender_is_unauthorized() {
        let verifier = HmacCredentialVerifier::new("secret");
        let header = verifier.issue(&sender(), "auth-session", 60);
        let other = Sender::parse("0x00000000000000000000000000000000000000bb").unwrap();
        assert_matches!(
            verifier.verify(Some(&header), &other).await,
            Err(CoreError::Unauthorized(_))
        );
    }

    #[tokio::test]
    async fn expired_token_is_unauthorized() {
        let verifier = HmacCredentialVerifier::new("secret");
        let header = verifier.issue(&sender(), "auth-session", -10);
        assert_matches!(
            verifier.verify(Some(&header), &sender()).await,
            Err(CoreError::Unauthorized(_))
        );
    }

    #[tokio::test]
    async fn token_signed_with_other_secret_is_unauthorized() {
        let issuer = HmacCredentialVerifier::new("other-secret");
        let header = issuer.issue(&sender(), "auth-session", 60);
        let verifier = HmacCredentialVerifier::new("secret");
        assert_matches!(
            verifier.verify(Some(&header), &sender()).await,
            Err(CoreError::Unauthorized(_))
        );
    }

    #[test]
    fn hex_decode_rejects_bad_input() {
        assert_eq!(hex::decode("0a0B"), Some(vec![0x0a, 0x0b]));
        assert_eq!(hex::decode("abc"), None);
        assert_eq!(hex::decode("zz"), None);
    }
}
