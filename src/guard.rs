use crate::context::{ContextError, ExecutionContext};
use crate::fingerprint::Fingerprint;
use crate::record::{FingerprintRecord, Generation, RecordError};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Whether the target still holds what was last generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardState {
    /// Nothing on record; the first write is always allowed.
    NoPriorGeneration,
    Unmodified,
    /// The target differs from the recorded content. `observed` is `None` if
    /// the target no longer exists.
    LocallyModified {
        expected: Fingerprint,
        observed: Option<Fingerprint>,
    },
}

impl GuardState {
    pub fn is_modified(&self) -> bool {
        matches!(self, GuardState::LocallyModified { .. })
    }

    pub fn describe(&self) -> &'static str {
        match self {
            GuardState::NoPriorGeneration => "no prior generation",
            GuardState::Unmodified => "unmodified",
            GuardState::LocallyModified { observed: None, .. } => "deleted since last generation",
            GuardState::LocallyModified { .. } => "locally modified",
        }
    }
}

/// Detects edits made to a generated file behind our back.
///
/// Only the bytes of the target itself are compared against the recorded
/// fingerprint; fragments never enter the comparison.
#[derive(Debug)]
pub struct ChangeGuard<'a> {
    ctx: &'a dyn ExecutionContext,
    target: PathBuf,
    record_path: PathBuf,
}

impl<'a> ChangeGuard<'a> {
    /// `target` must be absolute; records are keyed by it.
    pub fn new(ctx: &'a dyn ExecutionContext, target: &Path, directory: &Path) -> Self {
        ChangeGuard {
            ctx,
            target: target.to_path_buf(),
            record_path: FingerprintRecord::path_for(directory),
        }
    }

    pub fn record_path(&self) -> &Path {
        &self.record_path
    }

    /// Loads the recorded generation for this target.
    ///
    /// A missing, corrupt or foreign record counts as no record at all. Only
    /// failures to reach the record (permissions, transport) are errors.
    pub fn recorded(&self) -> Result<Option<Generation>, ContextError> {
        if !self.ctx.is_file(&self.record_path)? {
            debug!("No fingerprint record at {}", self.record_path.display());
            return Ok(None);
        }

        match FingerprintRecord::load(self.ctx, &self.record_path) {
            Ok(record) if record.generation.target == self.target => Ok(Some(record.generation)),
            Ok(record) => {
                warn!(
                    "Ignoring fingerprint record {}: it belongs to {}",
                    self.record_path.display(),
                    record.generation.target.display()
                );
                Ok(None)
            }
            Err(RecordError::Context(e)) => Err(e),
            Err(e) => {
                warn!(
                    "Ignoring unreadable fingerprint record {}: {}",
                    self.record_path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    /// Compares the target's current bytes with `recorded`.
    pub fn check(&self, recorded: Option<&Generation>) -> Result<GuardState, ContextError> {
        let Some(recorded) = recorded else {
            return Ok(GuardState::NoPriorGeneration);
        };

        info!("Checking for local changes to {}", self.target.display());

        if !self.ctx.is_file(&self.target)? {
            return Ok(GuardState::LocallyModified {
                expected: recorded.sha256.clone(),
                observed: None,
            });
        }

        let observed = Fingerprint::of(&self.ctx.read_file(&self.target)?);
        if observed == recorded.sha256 {
            Ok(GuardState::Unmodified)
        } else {
            debug!(
                "{} has fingerprint {}, expected {}",
                self.target.display(),
                observed,
                recorded.sha256
            );
            Ok(GuardState::LocallyModified {
                expected: recorded.sha256.clone(),
                observed: Some(observed),
            })
        }
    }

    /// Records `content` as the freshly written state of the target,
    /// replacing any previous record.
    pub fn remember(&self, content: &[u8]) -> Result<Generation, RecordError> {
        let record = FingerprintRecord::new(&self.target, content);
        record.save(self.ctx, &self.record_path)?;
        debug!(
            "Recorded fingerprint {} in {}",
            record.generation.sha256,
            self.record_path.display()
        );
        Ok(record.generation)
    }
}
