//! HMAC-SHA256 signatures for time-limited object read URLs.
//!
//! A signed URL has the form
//! `{base}/objects/{key}?expires={unix_seconds}&signature={sig}` where `sig`
//! is the URL-safe base64 MAC of `GET\n{key}\n{expires}`.

use crate::errors::{StoreError, StoreResult};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// Outcome of checking a presented signature.
#[derive(Debug, PartialEq, Eq)]
pub enum Verification {
    Valid,
    Expired,
    BadSignature,
}

#[derive(Clone)]
pub struct UrlSigner {
    secret: Arc<[u8]>,
    base_url: String,
}

impl UrlSigner {
    pub fn new(secret: impl AsRef<[u8]>, base_url: impl Into<String>) -> Self {
        Self {
            secret: Arc::from(secret.as_ref()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn mac(&self, key: &str, expires: i64) -> StoreResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| StoreError::Signing(e.to_string()))?;
        mac.update(format!("GET\n{}\n{}", key, expires).as_bytes());
        Ok(mac)
    }

    /// Signature for reading `key` until `expires` (unix seconds).
    pub fn signature(&self, key: &str, expires: i64) -> StoreResult<String> {
        let tag = self.mac(key, expires)?.finalize().into_bytes();
        Ok(URL_SAFE_NO_PAD.encode(tag))
    }

    /// Build a full read URL for `key` valid until `expires_at`.
    pub fn sign_url(&self, key: &str, expires_at: DateTime<Utc>) -> StoreResult<String> {
        let expires = expires_at.timestamp();
        let signature = self.signature(key, expires)?;
        Ok(format!(
            "{}/objects/{}?expires={}&signature={}",
            self.base_url, key, expires, signature
        ))
    }

    /// Check a presented signature in constant time, then its expiry.
    pub fn verify(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Verification {
        let Ok(presented) = URL_SAFE_NO_PAD.decode(signature) else {
            return Verification::BadSignature;
        };
        let Ok(mac) = self.mac(key, expires) else {
            return Verification::BadSignature;
        };
        if mac.verify_slice(&presented).is_err() {
            return Verification::BadSignature;
        }
        if now.timestamp() > expires {
            return Verification::Expired;
        }
        Verification::Valid
    }
}
