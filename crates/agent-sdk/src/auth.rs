//! Handshake signing.
//!
//! Every connection attempt presents four headers: the access key, a fresh
//! millisecond timestamp, the HMAC-SHA256 of that timestamp keyed by the
//! secret key (standard base64), and the agent ID.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_ACCESS_KEY: &str = "x-access-key";
pub const HEADER_SIGN: &str = "x-sign";
pub const HEADER_TIMESTAMP: &str = "x-ts";
pub const HEADER_AGENT_ID: &str = "x-agent-id";

/// Access key, timestamp and signature as presented on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub timestamp: String,
    pub signature: String,
}

#[derive(Clone)]
pub struct Signer {
    access_key: String,
    secret_key: String,
    agent_id: String,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("agent_id", &self.agent_id)
            .finish()
    }
}

impl Signer {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            agent_id: agent_id.into(),
        }
    }

    /// Signature for a millisecond timestamp.
    pub fn sign(&self, timestamp_ms: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(timestamp_ms.as_bytes());
        STANDARD.encode(mac.finalize().into_bytes())
    }

    /// Fresh credentials stamped with the current time.
    pub fn credentials(&self) -> Credentials {
        let timestamp = Utc::now().timestamp_millis().to_string();
        let signature = self.sign(&timestamp);
        Credentials {
            access_key: self.access_key.clone(),
            timestamp,
            signature,
        }
    }

    /// Handshake headers.  Never cached: each call signs a new timestamp.
    pub fn headers(&self) -> [(&'static str, String); 4] {
        let creds = self.credentials();
        [
            (HEADER_ACCESS_KEY, creds.access_key),
            (HEADER_SIGN, creds.signature),
            (HEADER_TIMESTAMP, creds.timestamp),
            (HEADER_AGENT_ID, self.agent_id.clone()),
        ]
    }

    /// Recompute the signature for `creds.timestamp` and compare in
    /// constant time.
    pub fn verify(&self, creds: &Credentials) -> bool {
        if creds.access_key != self.access_key {
            return false;
        }
        let expected = self.sign(&creds.timestamp);
        expected.as_bytes().ct_eq(creds.signature.as_bytes()).unwrap_u8() == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> Signer {
        Signer::new("ak", "sk", "agent-1")
    }

    #[test]
    fn known_vector() {
        // HMAC-SHA256("key", "The quick brown fox jumps over the lazy dog")
        let s = Signer::new("ak", "key", "a");
        assert_eq!(
            s.sign("The quick brown fox jumps over the lazy dog"),
            "97yD9DBThCSxMpjmqm+xQ+9NWaFJRhdZl0edvC0aPNg="
        );
    }

    #[test]
    fn signature_depends_on_timestamp_and_secret() {
        let s = signer();
        assert_eq!(s.sign("1700000000000"), s.sign("1700000000000"));
        assert_ne!(s.sign("1700000000000"), s.sign("1700000000001"));
        assert_ne!(
            s.sign("1700000000000"),
            Signer::new("ak", "other", "agent-1").sign("1700000000000")
        );
    }

    #[test]
    fn headers_carry_identity_and_verify() {
        let s = signer();
        let headers = s.headers();
        let get = |name: &str| {
            headers
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(get(HEADER_ACCESS_KEY), "ak");
        assert_eq!(get(HEADER_AGENT_ID), "agent-1");
        assert!(get(HEADER_TIMESTAMP).parse::<i64>().unwrap() > 0);

        let creds = Credentials {
            access_key: get(HEADER_ACCESS_KEY),
            timestamp: get(HEADER_TIMESTAMP),
            signature: get(HEADER_SIGN),
        };
        assert!(s.verify(&creds));
    }

    #[test]
    fn verify_rejects_tampering() {
        let s = signer();
        let mut creds = s.credentials();
        creds.timestamp.push('0');
        assert!(!s.verify(&creds));

        let mut creds = s.credentials();
        creds.access_key = "someone-else".into();
        assert!(!s.verify(&creds));
    }

    #[test]
    fn debug_redacts_secret() {
        let dbg = format!("{:?}", signer());
        assert!(!dbg.contains("\"sk\""));
        assert!(dbg.contains("<redacted>"));
    }
}
