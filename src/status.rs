use crate::context::ExecutionContext;
use crate::fingerprint::pending_fingerprint;
use crate::guard::GuardState;
use crate::migrate::Migration;
use crate::update::{Plan, UpdateError, prepare};
use std::path::Path;

#[derive(Debug)]
pub struct StatusReport {
    pub plan: Plan,
    /// Whether regenerating would change the bytes of the target.
    pub pending_change: bool,
    /// A fingerprint of the content the next update would write.
    ///
    /// This is currently a Base64-encoded SHA-256 but it could change
    /// in the future.
    ///
    /// See --fingerprint flag for more information.
    pub fingerprint: String,
}

impl StatusReport {
    /// True if an update would neither migrate, refuse, nor write anything
    /// new.
    pub fn is_clean(&self) -> bool {
        self.plan.migration == Migration::AlreadyMigrated
            && !self.plan.state.is_modified()
            && !self.pending_change
    }
}

/// Works out what `update` would do to `target` without changing anything.
///
/// Executable fragments are still run, since their output is part of the
/// pending content.
pub fn compute_status(
    ctx: &dyn ExecutionContext,
    target: &Path,
) -> Result<StatusReport, UpdateError> {
    let plan = prepare(ctx, target, false)?;

    let read_error = |source| UpdateError::Guard {
        path: plan.target.clone(),
        source,
    };
    let current = if ctx.is_file(&plan.target).map_err(read_error)? {
        Some(ctx.read_file(&plan.target).map_err(read_error)?)
    } else {
        None
    };

    let pending_change = current.as_deref() != Some(plan.content.as_slice());
    let fingerprint = pending_fingerprint(&plan.content);

    Ok(StatusReport {
        plan,
        pending_change,
        fingerprint,
    })
}

pub fn format_status(report: &StatusReport) -> Vec<String> {
    let plan = &report.plan;
    let mut lines = vec![
        format!("Target: {}", plan.target.display()),
        format!("State: {}", plan.state.describe()),
    ];

    if let GuardState::LocallyModified { expected, observed } = &plan.state {
        lines.push(format!("  recorded sha256: {}", expected.as_str()));
        lines.push(format!(
            "  current sha256:  {}",
            observed.as_ref().map_or("(missing)", |f| f.as_str())
        ));
    }

    match &plan.migration {
        Migration::AlreadyMigrated => {}
        Migration::MovedExisting { local } => {
            lines.push(format!("Migration: would move target to {}", local.display()));
        }
        Migration::CreatedEmpty => {
            lines.push(format!(
                "Migration: would create {}",
                plan.directory.display()
            ));
        }
    }

    if plan.fragments.is_empty() {
        lines.push("Fragments: none".to_string());
    } else {
        lines.push("Fragments:".to_string());
        for fragment in &plan.fragments {
            lines.push(format!("  {:<10} {}", fragment.kind.label(), fragment.name));
        }
    }

    if report.pending_change {
        lines.push(format!(
            "Pending: would write {} bytes",
            plan.content.len()
        ));
    } else {
        lines.push("Pending: no changes".to_string());
    }

    lines.push(format!("Fingerprint: {}", report.fingerprint));
    lines
}

pub fn print_status(report: &StatusReport) {
    for line in format_status(report) {
        println!("{line}");
    }
}
