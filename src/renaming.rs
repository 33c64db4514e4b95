//! xid name obfuscation.
//!
//! Synthetic attribute keys are emitted as `xid('<key>')` calls. This module is
//! the implementation those calls resolve to: an explicit renaming table wins,
//! otherwise the configured fallback applies.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum XidFallback {
    /// Keys without an entry render unchanged.
    #[default]
    Identity,
    /// Keys without an entry render as a short id derived from a SHA-256 of the key.
    Hashed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdRenamingMap {
    #[serde(default)]
    pub renamings: HashMap<String, String>,
    #[serde(default)]
    pub fallback: XidFallback,
}

impl IdRenamingMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hashed() -> Self {
        Self {
            renamings: HashMap::new(),
            fallback: XidFallback::Hashed,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_renaming(mut self, key: &str, renamed: &str) -> Self {
        self.renamings.insert(key.to_string(), renamed.to_string());
        self
    }

    pub fn xid(&self, key: &str) -> String {
        if let Some(renamed) = self.renamings.get(key) {
            return renamed.clone();
        }
        match self.fallback {
            XidFallback::Identity => key.to_string(),
            XidFallback::Hashed => hashed_xid(key),
        }
    }
}

/// Stable short identifier for `key`: `x` followed by base-36 of the first
/// five digest bytes.
pub fn hashed_xid(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    let digest = hasher.finalize();

    let mut n: u64 = 0;
    for byte in digest.iter().take(5) {
        n = (n << 8) | u64::from(*byte);
    }
    format!("x{}", to_base36(n))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
