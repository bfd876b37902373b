//! Where and as whom file and process operations run.
//!
//! Everything the regeneration engine does to the filesystem or to fragment
//! programs goes through [`ExecutionContext`]. The engine never inspects which
//! backend it is talking to; the binary picks one at startup:
//!
//! - [`LocalContext`] performs operations directly with `std::fs` and
//!   `std::process`.
//! - [`CommandContext`] expresses every operation as a small POSIX shell
//!   snippet and runs it through a wrapper (`ssh` for a remote host, `sudo`
//!   for elevated privileges, or both).

mod command;
mod local;

pub use command::{CommandContext, RemoteHost};
pub use local::LocalContext;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("No such file or directory: {0}")]
    NotFound(PathBuf),
    #[error("Path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),
    #[error("Remote paths must be absolute: {0}")]
    RelativeRemotePath(PathBuf),
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} failed ({}){}", exit_description(.status), stderr_suffix(.stderr))]
    CommandFailed {
        program: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("Unexpected output from {program}: {detail}")]
    Protocol { program: String, detail: String },
}

impl ContextError {
    /// Classifies an I/O error the way callers care about: permission and
    /// existence problems get their own variants.
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            ErrorKind::PermissionDenied => ContextError::PermissionDenied(path.to_path_buf()),
            ErrorKind::NotFound => ContextError::NotFound(path.to_path_buf()),
            _ => ContextError::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}

pub(crate) fn exit_description(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

pub(crate) fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    /// Sockets, fifos, device nodes and dangling symlinks.
    Other,
}

/// One immediate child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Whether the effective user may execute the entry. Only meaningful for
    /// [`EntryKind::File`].
    pub is_executable: bool,
}

/// Capability interface over local, remote and elevated execution.
///
/// Symlinks are followed everywhere: a symlink to a regular file is a file.
pub trait ExecutionContext: std::fmt::Debug {
    /// Human readable label, e.g. `local` or `ssh admin@web1 (sudo)`.
    fn describe(&self) -> String;

    /// Turns `path` into an absolute path as seen by this context.
    fn absolute_path(&self, path: &Path) -> Result<PathBuf, ContextError>;

    fn exists(&self, path: &Path) -> Result<bool, ContextError>;

    fn is_dir(&self, path: &Path) -> Result<bool, ContextError>;

    fn is_file(&self, path: &Path) -> Result<bool, ContextError>;

    fn read_file(&self, path: &Path) -> Result<Vec<u8>, ContextError>;

    /// Replaces `path` with `contents` atomically: readers see either the old
    /// or the new contents, never a partial file. Existing permissions are
    /// kept.
    fn write_file(&self, path: &Path, contents: &[u8]) -> Result<(), ContextError>;

    /// Renames `source` to `destination`, atomically where the filesystem
    /// allows it.
    fn move_file(&self, source: &Path, destination: &Path) -> Result<(), ContextError>;

    /// Creates `path` and any missing parents. Succeeds if it already exists.
    fn make_directory(&self, path: &Path) -> Result<(), ContextError>;

    /// Lists the immediate children of `path` in no particular order.
    fn list_entries(&self, path: &Path) -> Result<Vec<DirEntry>, ContextError>;

    /// Runs the program at `path` without arguments and returns its stdout.
    /// A non-zero exit is an error.
    fn run_command(&self, path: &Path) -> Result<Vec<u8>, ContextError>;
}
