use crate::context::{ContextError, ExecutionContext};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the fragment that receives a pre-existing target on first run.
pub const LOCAL_FRAGMENT: &str = "local";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Migration {
    /// The fragment directory was already there.
    AlreadyMigrated,
    /// The target was moved into the new fragment directory as `local`.
    MovedExisting { local: PathBuf },
    /// Neither existed; an empty fragment directory was created.
    CreatedEmpty,
}

/// `<target>.d`, next to the target.
pub fn fragment_directory(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(OsString::from)
        .unwrap_or_default();
    name.push(".d");
    target.with_file_name(name)
}

/// Works out what [`migrate`] would do, without doing it.
pub fn pending_migration(
    ctx: &dyn ExecutionContext,
    target: &Path,
    directory: &Path,
) -> Result<Migration, ContextError> {
    if ctx.is_dir(directory)? {
        Ok(Migration::AlreadyMigrated)
    } else if ctx.is_file(target)? {
        Ok(Migration::MovedExisting {
            local: directory.join(LOCAL_FRAGMENT),
        })
    } else {
        Ok(Migration::CreatedEmpty)
    }
}

/// Makes sure the fragment directory for `target` exists.
///
/// On first use an existing target becomes the `local` fragment, so no
/// hand-written content is lost. The move is a rename, so the content is
/// always reachable under one of the two names.
pub fn migrate(
    ctx: &dyn ExecutionContext,
    target: &Path,
    directory: &Path,
) -> Result<Migration, ContextError> {
    let migration = pending_migration(ctx, target, directory)?;

    match &migration {
        Migration::AlreadyMigrated => {}
        Migration::MovedExisting { local } => {
            info!("Creating directory {}", directory.display());
            ctx.make_directory(directory)?;
            info!("Moving {} to {}", target.display(), local.display());
            ctx.move_file(target, local)?;
        }
        Migration::CreatedEmpty => {
            info!("Creating directory {}", directory.display());
            ctx.make_directory(directory)?;
        }
    }

    Ok(migration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LocalContext;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_fragment_directory() {
        assert_eq!(
            fragment_directory(Path::new("/etc/hosts")),
            Path::new("/etc/hosts.d")
        );
        assert_eq!(
            fragment_directory(Path::new("/home/u/.bashrc")),
            Path::new("/home/u/.bashrc.d")
        );
    }

    #[test]
    fn test_moves_existing_target() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("hosts");
        let directory = fragment_directory(&target);
        fs::write(&target, "A\n").unwrap();

        let migration = migrate(&LocalContext::new(), &target, &directory).unwrap();

        assert_eq!(
            migration,
            Migration::MovedExisting {
                local: directory.join("local")
            }
        );
        assert!(directory.is_dir());
        assert!(!target.exists());
        assert_eq!(fs::read(directory.join("local")).unwrap(), b"A\n");
    }

    #[test]
    fn test_existing_directory_is_left_alone() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("hosts");
        let directory = fragment_directory(&target);
        fs::write(&target, "generated\n").unwrap();
        fs::create_dir(&directory).unwrap();

        let migration = migrate(&LocalContext::new(), &target, &directory).unwrap();

        assert_eq!(migration, Migration::AlreadyMigrated);
        assert_eq!(fs::read(&target).unwrap(), b"generated\n");
        assert!(!directory.join("local").exists());
    }

    #[test]
    fn test_creates_empty_directory() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("hosts");
        let directory = fragment_directory(&target);

        let migration = migrate(&LocalContext::new(), &target, &directory).unwrap();

        assert_eq!(migration, Migration::CreatedEmpty);
        assert!(directory.is_dir());
        assert_eq!(fs::read_dir(&directory).unwrap().count(), 0);
    }

    #[test]
    fn test_pending_migration_does_not_touch_anything() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("hosts");
        let directory = fragment_directory(&target);
        fs::write(&target, "A\n").unwrap();

        let migration = pending_migration(&LocalContext::new(), &target, &directory).unwrap();

        assert!(matches!(migration, Migration::MovedExisting { .. }));
        assert!(target.exists());
        assert!(!directory.exists());
    }
}
