//! Collection of the fragments that make up a generated file.
//!
//! The listing is non-recursive: only regular files directly inside the
//! fragment directory count. Directories and names starting with a dot (which
//! includes the fingerprint record) are skipped.

use crate::context::{ContextError, EntryKind, ExecutionContext};
use crate::natural_order;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    /// Contents are used verbatim.
    Static,
    /// Executed; its stdout is used.
    Executable,
}

impl FragmentKind {
    pub fn label(self) -> &'static str {
        match self {
            FragmentKind::Static => "static",
            FragmentKind::Executable => "executable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub name: String,
    pub path: PathBuf,
    pub kind: FragmentKind,
}

/// Lists `directory` and returns its fragments in render order.
pub fn collect_fragments(
    ctx: &dyn ExecutionContext,
    directory: &Path,
) -> Result<Vec<Fragment>, ContextError> {
    let mut fragments = Vec::new();

    for entry in ctx.list_entries(directory)? {
        if entry.name.starts_with('.') {
            continue;
        }
        let kind = match entry.kind {
            EntryKind::Dir => continue,
            EntryKind::Other => {
                warn!(
                    "Ignoring {}: not a regular file",
                    directory.join(&entry.name).display()
                );
                continue;
            }
            EntryKind::File if entry.is_executable => FragmentKind::Executable,
            EntryKind::File => FragmentKind::Static,
        };
        fragments.push(Fragment {
            path: directory.join(&entry.name),
            name: entry.name,
            kind,
        });
    }

    fragments.sort_by(|a, b| natural_order::compare(&a.name, &b.name));

    debug!(
        "Found {} fragments in {}",
        fragments.len(),
        directory.display()
    );

    Ok(fragments)
}
