//! Cache key derivation.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default bucketing window: requests submitted within the same 30 seconds share a key.
pub const DEFAULT_WINDOW_MS: u64 = 30_000;

/// Identifies one (fingerprint, time bucket) pair.
///
/// Rendered as `<fingerprint>-<bucket>`. Keys received from callers (e.g. when
/// polling for an async result) are opaque and kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn bucketed(fingerprint: &str, bucket: u64) -> Self {
        Self(format!("{}-{}", fingerprint, bucket))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Fixed-width flooring of millisecond timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    millis: u64,
}

impl TimeWindow {
    /// A zero width is clamped to one millisecond.
    pub fn from_millis(millis: u64) -> Self {
        Self {
            millis: millis.max(1),
        }
    }

    pub fn from_duration(window: Duration) -> Self {
        Self::from_millis(window.as_millis() as u64)
    }

    pub fn as_millis(&self) -> u64 {
        self.millis
    }

    pub fn bucket(&self, timestamp_ms: u64) -> u64 {
        timestamp_ms / self.millis
    }

    pub fn key_for(&self, fingerprint: &str, now_ms: u64) -> CacheKey {
        CacheKey::bucketed(fingerprint, self.bucket(now_ms))
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::from_millis(DEFAULT_WINDOW_MS)
    }
}

/// Canonical digest over named parts; part order does not matter.
pub struct FingerprintBuilder {
    prefix: String,
    parts: BTreeMap<String, String>,
    digest_bytes: usize,
}

impl FingerprintBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            parts: BTreeMap::new(),
            digest_bytes: 8,
        }
    }

    pub fn part(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.parts.insert(name.into(), value.to_string());
        self
    }

    pub fn with_digest_bytes(mut self, n: usize) -> Self {
        self.digest_bytes = n.clamp(1, 32);
        self
    }

    /// Length-framed so no two distinct part sets share an input.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (name, value) in &self.parts {
            for field in [name, value] {
                hasher.update((field.len() as u64).to_be_bytes());
                hasher.update(field.as_bytes());
            }
        }
        hasher.finalize()[..self.digest_bytes]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    /// `<prefix>-<digest>`, or the bare digest when the prefix is empty.
    pub fn finish(&self) -> String {
        if self.prefix.is_empty() {
            self.digest()
        } else {
            format!("{}-{}", self.prefix, self.digest())
        }
    }
}
