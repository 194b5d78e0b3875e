//! Service-account authentication for Google APIs.
//!
//! Assertion format: `base64url(header).base64url(claims)` signed with
//! RSASSA-PKCS1-v1_5 over SHA-256 (`RS256`), exchanged at `token_uri` for a
//! short-lived bearer token.

use std::path::Path;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::sha2::Sha256;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use serde::Deserialize;
use serde_json::json;

use common::Error;

/// Read-only access is all the ledger needs.
pub const SHEETS_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets.readonly";

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// The subset of a service-account JSON key file that signing needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// Holds the service-account identity and the parsed RSA private key.
#[derive(Clone)]
pub struct ServiceAccountAuth {
    pub client_email: String,
    pub token_uri: String,
    signing_key: SigningKey<Sha256>,
}

impl std::fmt::Debug for ServiceAccountAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountAuth")
            .field("client_email", &self.client_email)
            .field("token_uri", &self.token_uri)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

impl ServiceAccountAuth {
    /// Build from a parsed key file.
    ///
    /// The PEM string may contain literal `\n` (two chars) instead of real
    /// newlines; both forms are accepted.
    pub fn new(key: ServiceAccountKey) -> Result<Self, Error> {
        let pem = key.private_key.replace("\\n", "\n");
        let pem = pem.trim();

        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| Error::Auth(format!("Failed to parse service-account key: {e}")))?;

        if key.client_email.trim().is_empty() {
            return Err(Error::Auth("service-account key has no client_email".into()));
        }

        Ok(Self {
            client_email: key.client_email.trim().to_string(),
            token_uri: key.token_uri,
            signing_key: SigningKey::<Sha256>::new(private_key),
        })
    }

    /// Load a service-account JSON key file from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Auth(format!("Failed to read {}: {e}", path.display()))
        })?;
        let key: ServiceAccountKey = serde_json::from_str(&raw)?;
        Self::new(key)
    }

    /// Build a signed JWT assertion for `scope`, issued at `now`.
    pub fn assertion(&self, scope: &str, now: DateTime<Utc>) -> String {
        let header = json!({"alg": "RS256", "typ": "JWT"});
        let iat = now.timestamp();
        let claims = json!({
            "iss": self.client_email,
            "scope": scope,
            "aud": self.token_uri,
            "iat": iat,
            "exp": iat + ASSERTION_LIFETIME_SECS,
        });

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        );
        let signature = self.signing_key.sign(signing_input.as_bytes());

        format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        )
    }
}
