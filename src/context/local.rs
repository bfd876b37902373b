use super::{ContextError, DirEntry, EntryKind, ExecutionContext};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Runs everything on this machine as the current user.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalContext;

impl LocalContext {
    pub fn new() -> Self {
        LocalContext
    }
}

fn metadata_if_exists(path: &Path) -> Result<Option<fs::Metadata>, ContextError> {
    match fs::metadata(path) {
        Ok(metadata) => Ok(Some(metadata)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ContextError::from_io(path, e)),
    }
}

/// Checks the execute permission for the effective user, like `test -x`.
#[cfg(unix)]
fn is_executable(path: &Path) -> Result<bool, ContextError> {
    use nix::errno::Errno;
    use nix::fcntl::AtFlags;
    use nix::unistd::{AccessFlags, faccessat};

    match faccessat(None, path, AccessFlags::X_OK, AtFlags::AT_EACCESS) {
        Ok(()) => Ok(true),
        Err(Errno::EACCES | Errno::EPERM) => Ok(false),
        Err(errno) => Err(ContextError::from_io(path, std::io::Error::from(errno))),
    }
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> Result<bool, ContextError> {
    Ok(false)
}

impl ExecutionContext for LocalContext {
    fn describe(&self) -> String {
        "local".to_string()
    }

    /// Resolves `..` and symlinks in the parent directory, so every
    /// spelling of a target maps to the same path. The final component is
    /// kept as given.
    fn absolute_path(&self, path: &Path) -> Result<PathBuf, ContextError> {
        let absolute = std::path::absolute(path).map_err(|e| ContextError::from_io(path, e))?;
        let (Some(parent), Some(name)) = (absolute.parent(), absolute.file_name()) else {
            return Ok(absolute);
        };
        match fs::canonicalize(parent) {
            Ok(parent) => Ok(parent.join(name)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(absolute),
            Err(e) => Err(ContextError::from_io(parent, e)),
        }
    }

    fn exists(&self, path: &Path) -> Result<bool, ContextError> {
        match fs::symlink_metadata(path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ContextError::from_io(path, e)),
        }
    }

    fn is_dir(&self, path: &Path) -> Result<bool, ContextError> {
        Ok(metadata_if_exists(path)?.is_some_and(|m| m.is_dir()))
    }

    fn is_file(&self, path: &Path) -> Result<bool, ContextError> {
        Ok(metadata_if_exists(path)?.is_some_and(|m| m.is_file()))
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>, ContextError> {
        fs::read(path).map_err(|e| ContextError::from_io(path, e))
    }

    /// Writes to a temporary file next to `path`, fsyncs it, then renames it
    /// into place.
    fn write_file(&self, path: &Path, contents: &[u8]) -> Result<(), ContextError> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let existing = metadata_if_exists(path)?;

        let mut builder = tempfile::Builder::new();
        builder.prefix(".dotdee-").suffix(".tmp");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            // Regular umask semantics for new files; existing files keep
            // their exact mode below.
            builder.permissions(fs::Permissions::from_mode(0o666));
        }

        let mut temp_file = builder
            .tempfile_in(parent)
            .map_err(|e| ContextError::from_io(parent, e))?;

        if let Some(metadata) = existing {
            fs::set_permissions(temp_file.path(), metadata.permissions())
                .map_err(|e| ContextError::from_io(temp_file.path(), e))?;
        }

        temp_file
            .write_all(contents)
            .map_err(|e| ContextError::from_io(path, e))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| ContextError::from_io(path, e))?;
        temp_file
            .persist(path)
            .map_err(|e| ContextError::from_io(path, e.error))?;

        debug!("Wrote {} bytes to {}", contents.len(), path.display());
        Ok(())
    }

    fn move_file(&self, source: &Path, destination: &Path) -> Result<(), ContextError> {
        match fs::rename(source, destination) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::CrossesDevices => {
                // Copy, verify, then delete, so some path always holds the
                // original bytes.
                debug!(
                    "Rename across filesystems, copying {} to {}",
                    source.display(),
                    destination.display()
                );
                let contents = self.read_file(source)?;
                self.write_file(destination, &contents)?;
                if self.read_file(destination)? != contents {
                    return Err(ContextError::Io {
                        path: destination.to_path_buf(),
                        source: std::io::Error::other("copy verification failed"),
                    });
                }
                fs::remove_file(source).map_err(|e| ContextError::from_io(source, e))
            }
            Err(e) => Err(ContextError::from_io(source, e)),
        }
    }

    fn make_directory(&self, path: &Path) -> Result<(), ContextError> {
        fs::create_dir_all(path).map_err(|e| ContextError::from_io(path, e))
    }

    fn list_entries(&self, path: &Path) -> Result<Vec<DirEntry>, ContextError> {
        let read_dir = fs::read_dir(path).map_err(|e| ContextError::from_io(path, e))?;

        let mut entries = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| ContextError::from_io(path, e))?;
            let entry_path = entry.path();
            let name = entry
                .file_name()
                .into_string()
                .map_err(|_| ContextError::NonUtf8Path(entry_path.clone()))?;

            let kind = match metadata_if_exists(&entry_path)? {
                Some(m) if m.is_dir() => EntryKind::Dir,
                Some(m) if m.is_file() => EntryKind::File,
                _ => EntryKind::Other,
            };
            let is_executable = kind == EntryKind::File && is_executable(&entry_path)?;

            entries.push(DirEntry {
                name,
                kind,
                is_executable,
            });
        }

        Ok(entries)
    }

    fn run_command(&self, path: &Path) -> Result<Vec<u8>, ContextError> {
        let program = path.display().to_string();
        let output = Command::new(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| ContextError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ContextError::CommandFailed {
                program,
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if !output.stderr.is_empty() {
            debug!(
                "{} wrote to stderr: {}",
                program,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(output.stdout)
    }
}
