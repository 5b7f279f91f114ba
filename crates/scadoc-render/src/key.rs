//! Render cache key computation.
//!
//! Provides [`CacheKey`] for computing content-based hashes used to name
//! cached artifacts.

use std::fmt;
use std::path::Path;

use sha2::{Digest, Sha256};

/// Content hash identifying one model in one include context.
///
/// Two requests with the same context directory and source text produce the
/// same key, wherever and whenever the build runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Compute the key for a model source authored in `context_dir`.
    ///
    /// # Hash Format
    ///
    /// SHA-256 of `context_dir ‖ 0x00 ‖ content`, hex encoded. The NUL
    /// separator keeps different splits of the same bytes apart.
    #[must_use]
    pub fn new(context_dir: &Path, content: &str) -> Self {
        let mut hasher = Sha256::new();
        // Includes may resolve differently per directory
        hasher.update(context_dir.as_os_str().as_encoded_bytes());
        hasher.update(b"\0");
        hasher.update(content.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
