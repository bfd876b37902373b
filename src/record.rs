//! The persisted fingerprint of the last generated content.
//!
//! Each fragment directory holds one `.fingerprint` TOML file describing the
//! content most recently written to its target. Being dot-prefixed, it is
//! never picked up as a fragment. The file goes through the execution context
//! like every other file, so remote and elevated targets keep their record
//! next to their fragments.

use crate::context::{ContextError, ExecutionContext};
use crate::fingerprint::Fingerprint;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const RECORD_FILENAME: &str = ".fingerprint";

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("{0}")]
    Context(#[from] ContextError),
    #[error("Fingerprint record is not valid UTF-8: {0}")]
    NotUtf8(PathBuf),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Unsupported fingerprint record version: {0}")]
    UnsupportedVersion(u32),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Metadata {
    version: u32,
}

/// Helper struct to extract only the metadata section from a TOML file,
/// ignoring all other content. Used to check version before parsing the full file.
#[derive(Debug, Deserialize)]
struct MetadataOnly {
    metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Generation {
    /// Absolute path of the generated file. Records are keyed by it.
    pub target: PathBuf,
    pub sha256: Fingerprint,
    pub size: u64,
    /// RFC 3339 timestamp of the write.
    pub generated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FingerprintRecord {
    metadata: Metadata,
    pub generation: Generation,
}

impl FingerprintRecord {
    const SUPPORTED_VERSION: u32 = 1;

    /// Describes `content` as just written to `target`.
    pub fn new(target: &Path, content: &[u8]) -> Self {
        FingerprintRecord {
            metadata: Metadata {
                version: Self::SUPPORTED_VERSION,
            },
            generation: Generation {
                target: target.to_path_buf(),
                sha256: Fingerprint::of(content),
                size: content.len() as u64,
                generated_at: chrono::Utc::now()
                    .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            },
        }
    }

    pub fn path_for(directory: &Path) -> PathBuf {
        directory.join(RECORD_FILENAME)
    }

    pub fn from_toml(content: &str) -> Result<Self, RecordError> {
        // Check the version first so a record written by a newer release gets
        // a sensible error instead of a confusing parse failure.
        let metadata_only: MetadataOnly = toml::from_str(content)?;

        if metadata_only.metadata.version != Self::SUPPORTED_VERSION {
            return Err(RecordError::UnsupportedVersion(
                metadata_only.metadata.version,
            ));
        }

        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, RecordError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load(ctx: &dyn ExecutionContext, path: &Path) -> Result<Self, RecordError> {
        let bytes = ctx.read_file(path)?;
        let content =
            String::from_utf8(bytes).map_err(|_| RecordError::NotUtf8(path.to_path_buf()))?;
        Self::from_toml(&content)
    }

    /// Saves the record atomically through the execution context.
    pub fn save(&self, ctx: &dyn ExecutionContext, path: &Path) -> Result<(), RecordError> {
        let content = self.to_toml()?;
        ctx.write_file(path, content.as_bytes())?;
        Ok(())
    }
}
