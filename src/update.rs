use crate::context::{ContextError, ExecutionContext};
use crate::fingerprint::{Fingerprint, pending_fingerprint};
use crate::fragments::{Fragment, FragmentKind, collect_fragments};
use crate::guard::{ChangeGuard, GuardState};
use crate::migrate::{LOCAL_FRAGMENT, Migration, fragment_directory, migrate, pending_migration};
use crate::record::{Generation, RecordError};
use crate::render::{RenderError, render_fragments};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("Invalid target {path}: {source}")]
    Target {
        path: PathBuf,
        #[source]
        source: ContextError,
    },
    #[error("{0} exists but is not a regular file")]
    TargetNotAFile(PathBuf),
    #[error("Failed to set up fragment directory {path}: {source}")]
    Migration {
        path: PathBuf,
        #[source]
        source: ContextError,
    },
    #[error("Failed to list fragments in {path}: {source}")]
    Collect {
        path: PathBuf,
        #[source]
        source: ContextError,
    },
    #[error("{0}")]
    Render(#[from] RenderError),
    #[error("Failed to check {path} for local changes: {source}")]
    Guard {
        path: PathBuf,
        #[source]
        source: ContextError,
    },
    #[error(
        "The contents of {target} were modified since it was last generated, refusing to overwrite it! \
         If you're sure you want to proceed, use --force or delete {record} and retry."
    )]
    RefuseToOverwrite { target: PathBuf, record: PathBuf },
    #[error("Fingerprint mismatch: expected {expected}, got {actual}")]
    FingerprintMismatch { expected: String, actual: String },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: ContextError,
    },
    #[error(
        "Wrote {target} but failed to update fingerprint record {path}: {source}. \
         The next update will see {target} as modified; rerun with --force once the record is writable."
    )]
    Record {
        target: PathBuf,
        path: PathBuf,
        #[source]
        source: RecordError,
    },
}

#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Overwrite the target even if it was modified locally.
    pub force: bool,
    /// Compute everything but change nothing.
    pub dry_run: bool,
    /// Only write if the rendered content has this pending fingerprint.
    pub fingerprint: Option<String>,
}

/// Everything known about a target before deciding whether to write it.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Absolute path of the generated file.
    pub target: PathBuf,
    pub directory: PathBuf,
    pub migration: Migration,
    pub fragments: Vec<Fragment>,
    pub content: Vec<u8>,
    pub recorded: Option<Generation>,
    pub state: GuardState,
    pub record_path: PathBuf,
}

impl Plan {
    /// Whether the target already holds exactly the rendered content and the
    /// record agrees.
    pub fn is_up_to_date(&self) -> bool {
        self.migration == Migration::AlreadyMigrated
            && self.state == GuardState::Unmodified
            && self
                .recorded
                .as_ref()
                .is_some_and(|r| r.sha256 == Fingerprint::of(&self.content))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Written,
    /// The target already matched; nothing was written.
    Unchanged,
    DryRun,
}

#[derive(Debug)]
pub struct UpdateResult {
    pub plan: Plan,
    pub outcome: Outcome,
    /// Pending fingerprint of the rendered content.
    pub fingerprint: String,
}

/// Migrates (or pretends to), collects, renders and checks a target.
///
/// With `apply_migration` unset nothing is modified: a target that has not
/// been migrated yet is rendered as if it were the only fragment.
pub fn prepare(
    ctx: &dyn ExecutionContext,
    target: &Path,
    apply_migration: bool,
) -> Result<Plan, UpdateError> {
    let target = ctx
        .absolute_path(target)
        .map_err(|source| UpdateError::Target {
            path: target.to_path_buf(),
            source,
        })?;
    let target_error = |source| UpdateError::Target {
        path: target.clone(),
        source,
    };
    if ctx.exists(&target).map_err(target_error)? && !ctx.is_file(&target).map_err(target_error)? {
        return Err(UpdateError::TargetNotAFile(target));
    }

    let directory = fragment_directory(&target);
    let migration_error = |source| UpdateError::Migration {
        path: directory.clone(),
        source,
    };
    let migration = if apply_migration {
        migrate(ctx, &target, &directory).map_err(migration_error)?
    } else {
        pending_migration(ctx, &target, &directory).map_err(migration_error)?
    };

    let fragments = match (&migration, apply_migration) {
        (Migration::MovedExisting { .. }, false) => vec![Fragment {
            name: LOCAL_FRAGMENT.to_string(),
            path: target.clone(),
            kind: FragmentKind::Static,
        }],
        (Migration::CreatedEmpty, false) => Vec::new(),
        _ => collect_fragments(ctx, &directory).map_err(|source| UpdateError::Collect {
            path: directory.clone(),
            source,
        })?,
    };

    let content = render_fragments(ctx, &fragments)?;

    let guard = ChangeGuard::new(ctx, &target, &directory);
    let guard_error = |source| UpdateError::Guard {
        path: target.clone(),
        source,
    };
    let recorded = guard.recorded().map_err(guard_error)?;
    let state = guard.check(recorded.as_ref()).map_err(guard_error)?;
    debug!("{} is {}", target.display(), state.describe());

    Ok(Plan {
        record_path: guard.record_path().to_path_buf(),
        target,
        directory,
        migration,
        fragments,
        content,
        recorded,
        state,
    })
}

/// Regenerates `target` from its fragment directory.
///
/// # Behavior
///
/// 1. Ensures `<target>.d` exists, moving a pre-existing target into it as
///    the `local` fragment on first use.
/// 2. Renders all fragments in natural order; executable fragments are run
///    and their stdout is used. Any failing fragment aborts the update.
/// 3. Compares the target's current bytes against the fingerprint recorded
///    by the previous run. A locally modified (or deleted) target is only
///    overwritten with `options.force`.
/// 4. Writes the target atomically and records the new fingerprint.
///
/// If the target already holds the rendered content the write is skipped.
///
/// The target and the record are two separate writes. If recording fails
/// after the target was replaced, `Record` is returned and the next update
/// treats the target as locally modified until it is run with `force`.
/// With `options.dry_run` step 1 and 4 are only simulated.
///
/// # Errors
///
/// * `RefuseToOverwrite` - the target was modified and `force` is unset
/// * `Render` - a fragment could not be read or executed
/// * `FingerprintMismatch` - `options.fingerprint` does not match the render
/// * `Migration`, `Collect`, `Guard`, `Write`, `Record` - filesystem failures
pub fn update_file(
    ctx: &dyn ExecutionContext,
    target: &Path,
    options: &UpdateOptions,
) -> Result<UpdateResult, UpdateError> {
    let plan = prepare(ctx, target, !options.dry_run)?;
    let fingerprint = pending_fingerprint(&plan.content);

    // Validated after rendering so executable fragments cannot change the
    // content between the check and the write.
    if let Some(expected) = &options.fingerprint
        && expected != &fingerprint
    {
        return Err(UpdateError::FingerprintMismatch {
            expected: expected.clone(),
            actual: fingerprint,
        });
    }

    if plan.state.is_modified() {
        if !options.force {
            return Err(UpdateError::RefuseToOverwrite {
                target: plan.target,
                record: plan.record_path,
            });
        }
        warn!(
            "The contents of {} were modified but --force was used so overwriting anyway!",
            plan.target.display()
        );
    }

    let outcome = if options.dry_run {
        Outcome::DryRun
    } else if plan.is_up_to_date() {
        info!("{} is up to date", plan.target.display());
        Outcome::Unchanged
    } else {
        info!("Writing {}", plan.target.display());
        ctx.write_file(&plan.target, &plan.content)
            .map_err(|source| UpdateError::Write {
                path: plan.target.clone(),
                source,
            })?;
        ChangeGuard::new(ctx, &plan.target, &plan.directory)
            .remember(&plan.content)
            .map_err(|source| UpdateError::Record {
                target: plan.target.clone(),
                path: plan.record_path.clone(),
                source,
            })?;
        Outcome::Written
    };

    Ok(UpdateResult {
        plan,
        outcome,
        fingerprint,
    })
}
