use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use tracing::debug;

/// Hex encoded SHA-256 digest of some content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Computes the fingerprint of `content`.
    pub fn of(content: &[u8]) -> Self {
        let digest = Sha256::digest(content);
        let fingerprint = Fingerprint(format!("{:x}", digest));
        debug!("SHA-256 of {} bytes is {}", content.len(), fingerprint);
        fingerprint
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short identifier for rendered content that has not been written yet.
///
/// Shown by `status` and accepted by `update --fingerprint`. This is currently
/// a Base64-encoded SHA-256 but it could change in the future.
pub fn pending_fingerprint(content: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(Sha256::digest(content))
}
