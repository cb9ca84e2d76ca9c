//! crates/review_core/src/token.rs
//!
//! The access token codec. A token is a pure function of an email address, so
//! it can be recomputed on every access instead of being stored. Knowing the
//! `(request id, token)` pair from an emailed link is the proof of identity.
//!
//! The legacy scheme is `hex(sha256(email))`: anyone who knows an email can
//! derive its token. Deployments may opt into `hex(hmac_sha256(secret, email))`
//! by configuring a server secret, which invalidates previously issued links.

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// An opaque, lowercase hex access token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token secret must not be empty")]
    EmptySecret,
    #[error("token secret rejected: {0}")]
    InvalidSecret(String),
}

#[derive(Clone)]
enum Scheme {
    Sha256,
    Keyed(HmacSha256),
}

/// Issues and verifies email-derived access tokens.
#[derive(Clone)]
pub struct TokenCodec {
    scheme: Scheme,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = match self.scheme {
            Scheme::Sha256 => "sha256",
            Scheme::Keyed(_) => "hmac-sha256",
        };
        f.debug_struct("TokenCodec").field("scheme", &scheme).finish()
    }
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self::legacy()
    }
}

impl TokenCodec {
    /// The unkeyed `sha256(email)` scheme, compatible with existing links.
    pub fn legacy() -> Self {
        Self {
            scheme: Scheme::Sha256,
        }
    }

    /// A keyed scheme mixing a server-side secret into every token.
    pub fn with_secret(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| TokenError::InvalidSecret(e.to_string()))?;
        Ok(Self {
            scheme: Scheme::Keyed(mac),
        })
    }

    pub fn is_keyed(&self) -> bool {
        matches!(self.scheme, Scheme::Keyed(_))
    }

    /// Derives the token for `email`. The same email always yields the same token.
    pub fn issue(&self, email: &str) -> AccessToken {
        let digest = match &self.scheme {
            Scheme::Sha256 => hex::encode(Sha256::digest(email.as_bytes())),
            Scheme::Keyed(mac) => {
                hex::encode(mac.clone().chain_update(email.as_bytes()).finalize().into_bytes())
            }
        };
        AccessToken(digest)
    }

    /// True iff `token` is exactly `issue(email)`.
    pub fn verify(&self, email: &str, token: &str) -> bool {
        let expected = self.issue(email);
        // Slices of unequal length compare unequal without inspecting content.
        expected.as_str().as_bytes().ct_eq(token.as_bytes()).into()
    }
}
