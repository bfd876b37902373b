use super::{ContextError, DirEntry, EntryKind, ExecutionContext};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::debug;

const EXISTS_SCRIPT: &str = r#"test -e "$1" || test -L "$1""#;
const IS_DIR_SCRIPT: &str = r#"test -d "$1""#;
const IS_FILE_SCRIPT: &str = r#"test -f "$1""#;
const READ_SCRIPT: &str = r#"exec cat -- "$1""#;
const MOVE_SCRIPT: &str = r#"exec mv -- "$1" "$2""#;
const MKDIR_SCRIPT: &str = r#"exec mkdir -p -- "$1""#;
/// Prints the physical path of a directory, or nothing if it does not exist.
const RESOLVE_DIR_SCRIPT: &str = r#"if cd -P -- "$1" 2>/dev/null; then pwd -P; fi"#;

/// Writes stdin to a temporary file beside the target and renames it over the
/// target. `cp -p` carries over the mode and ownership of an existing target
/// before the contents are replaced.
const WRITE_SCRIPT: &str = r#"set -e
tmp=$(mktemp "$(dirname -- "$1")/.dotdee-XXXXXX")
trap 'rm -f -- "$tmp"' EXIT
if [ -f "$1" ]; then cp -p -- "$1" "$tmp"; else chmod 644 "$tmp"; fi
cat > "$tmp"
mv -f -- "$tmp" "$1"
trap - EXIT"#;

/// Prints one NUL-terminated record per entry: a kind byte (`d`, `f`, `o`),
/// an executable byte (`x`, `-`), then the name.
const LIST_SCRIPT: &str = r#"cd -- "$1" || exit 2
for name in * .[!.]* ..?*; do
  [ -e "$name" ] || [ -L "$name" ] || continue
  if [ -d "$name" ]; then kind=d; elif [ -f "$name" ]; then kind=f; else kind=o; fi
  if [ -x "$name" ]; then x=x; else x=-; fi
  printf '%s%s%s\0' "$kind" "$x" "$name"
done"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteHost {
    pub host: String,
    pub user: Option<String>,
    pub port: Option<u16>,
}

impl RemoteHost {
    fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.host),
            None => self.host.clone(),
        }
    }
}

/// Runs each operation as a shell command, optionally on another host and/or
/// through `sudo`.
///
/// With neither a remote host nor elevation the commands run locally as the
/// current user, which is mostly useful for exercising the shell protocol.
#[derive(Debug, Clone)]
pub struct CommandContext {
    remote: Option<RemoteHost>,
    sudo: bool,
}

/// Quotes `value` for a POSIX shell. Plain words are left untouched.
pub(crate) fn shell_quote(value: &str) -> String {
    let is_plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c));
    if is_plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

fn path_arg(path: &Path) -> Result<String, ContextError> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| ContextError::NonUtf8Path(path.to_path_buf()))
}

fn parse_listing(program: &str, stdout: &[u8]) -> Result<Vec<DirEntry>, ContextError> {
    let mut entries = Vec::new();
    for record in stdout.split(|&b| b == 0).filter(|r| !r.is_empty()) {
        let (kind, rest) = record.split_first().ok_or_else(|| ContextError::Protocol {
            program: program.to_string(),
            detail: "empty listing record".to_string(),
        })?;
        let (executable, name) = rest.split_first().ok_or_else(|| ContextError::Protocol {
            program: program.to_string(),
            detail: "truncated listing record".to_string(),
        })?;

        let kind = match kind {
            b'd' => EntryKind::Dir,
            b'f' => EntryKind::File,
            b'o' => EntryKind::Other,
            other => {
                return Err(ContextError::Protocol {
                    program: program.to_string(),
                    detail: format!("unknown entry kind {:?}", char::from(*other)),
                });
            }
        };
        let name = String::from_utf8(name.to_vec()).map_err(|_| {
            ContextError::NonUtf8Path(PathBuf::from(String::from_utf8_lossy(name).into_owned()))
        })?;

        entries.push(DirEntry {
            name,
            kind,
            is_executable: kind == EntryKind::File && *executable == b'x',
        });
    }
    Ok(entries)
}

impl CommandContext {
    pub fn new(remote: Option<RemoteHost>, sudo: bool) -> Self {
        CommandContext { remote, sudo }
    }

    /// Wraps `argv` in `sudo` and `ssh` as configured.
    fn wrapped_argv(&self, argv: Vec<String>) -> Vec<String> {
        let mut argv = argv;
        if self.sudo {
            argv.splice(0..0, ["sudo", "-n", "--"].map(String::from));
        }
        match &self.remote {
            Some(remote) => {
                let mut wrapped = vec![
                    "ssh".to_string(),
                    "-o".to_string(),
                    "BatchMode=yes".to_string(),
                ];
                if let Some(port) = remote.port {
                    wrapped.push("-p".to_string());
                    wrapped.push(port.to_string());
                }
                wrapped.push(remote.destination());
                wrapped.push("--".to_string());
                // The remote side hands the command line to a shell.
                wrapped.push(
                    argv.iter()
                        .map(|a| shell_quote(a))
                        .collect::<Vec<_>>()
                        .join(" "),
                );
                wrapped
            }
            None => argv,
        }
    }

    fn script_argv(script: &str, args: &[String]) -> Vec<String> {
        let mut argv = vec![
            "sh".to_string(),
            "-c".to_string(),
            script.to_string(),
            "dotdee".to_string(),
        ];
        argv.extend(args.iter().cloned());
        argv
    }

    fn run(&self, argv: Vec<String>, stdin: Option<&[u8]>) -> Result<Output, ContextError> {
        let argv = self.wrapped_argv(argv);
        let (program, args) = argv.split_first().ok_or_else(|| ContextError::Protocol {
            program: String::new(),
            detail: "empty command line".to_string(),
        })?;
        debug!("Running {:?}", argv);

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let spawn_error = |source: std::io::Error| ContextError::Spawn {
            program: program.clone(),
            source,
        };
        let mut child = command.spawn().map_err(spawn_error)?;
        if let Some(input) = stdin
            && let Some(mut pipe) = child.stdin.take()
        {
            pipe.write_all(input).map_err(spawn_error)?;
        }
        child.wait_with_output().map_err(spawn_error)
    }

    fn checked(
        &self,
        label: String,
        argv: Vec<String>,
        stdin: Option<&[u8]>,
    ) -> Result<Vec<u8>, ContextError> {
        let output = self.run(argv, stdin)?;
        if !output.status.success() {
            return Err(ContextError::CommandFailed {
                program: label,
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }

    /// Runs a `test` style script: exit 0 is true, exit 1 is false.
    fn path_test(&self, script: &str, path: &Path) -> Result<bool, ContextError> {
        let output = self.run(Self::script_argv(script, &[path_arg(path)?]), None)?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            status => Err(ContextError::CommandFailed {
                program: format!("test {} via {}", path.display(), self.describe()),
                status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }

    fn script(
        &self,
        script: &str,
        paths: &[&Path],
        stdin: Option<&[u8]>,
    ) -> Result<Vec<u8>, ContextError> {
        let args = paths
            .iter()
            .map(|p| path_arg(p))
            .collect::<Result<Vec<_>, _>>()?;
        let label = format!(
            "{} via {}",
            paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" "),
            self.describe()
        );
        self.checked(label, Self::script_argv(script, &args), stdin)
    }
}

impl ExecutionContext for CommandContext {
    fn describe(&self) -> String {
        match (&self.remote, self.sudo) {
            (Some(remote), true) => format!("ssh {} (sudo)", remote.destination()),
            (Some(remote), false) => format!("ssh {}", remote.destination()),
            (None, true) => "sudo".to_string(),
            (None, false) => "shell".to_string(),
        }
    }

    /// Resolves `..` and symlinks in the parent directory on the side that
    /// owns the file. The final component is kept as given.
    fn absolute_path(&self, path: &Path) -> Result<PathBuf, ContextError> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else if self.remote.is_some() {
            return Err(ContextError::RelativeRemotePath(path.to_path_buf()));
        } else {
            std::path::absolute(path).map_err(|e| ContextError::from_io(path, e))?
        };
        let (Some(parent), Some(name)) = (absolute.parent(), absolute.file_name()) else {
            return Ok(absolute);
        };

        let stdout = self.script(RESOLVE_DIR_SCRIPT, &[parent], None)?;
        let resolved = String::from_utf8(stdout)
            .map_err(|_| ContextError::NonUtf8Path(parent.to_path_buf()))?;
        match resolved.strip_suffix('\n') {
            Some(directory) if !directory.is_empty() => Ok(Path::new(directory).join(name)),
            _ => Ok(absolute),
        }
    }

    fn exists(&self, path: &Path) -> Result<bool, ContextError> {
        self.path_test(EXISTS_SCRIPT, path)
    }

    fn is_dir(&self, path: &Path) -> Result<bool, ContextError> {
        self.path_test(IS_DIR_SCRIPT, path)
    }

    fn is_file(&self, path: &Path) -> Result<bool, ContextError> {
        self.path_test(IS_FILE_SCRIPT, path)
    }

    fn read_file(&self, path: &Path) -> Result<Vec<u8>, ContextError> {
        self.script(READ_SCRIPT, &[path], None)
    }

    fn write_file(&self, path: &Path, contents: &[u8]) -> Result<(), ContextError> {
        self.script(WRITE_SCRIPT, &[path], Some(contents))?;
        debug!("Wrote {} bytes to {}", contents.len(), path.display());
        Ok(())
    }

    fn move_file(&self, source: &Path, destination: &Path) -> Result<(), ContextError> {
        self.script(MOVE_SCRIPT, &[source, destination], None)
            .map(|_| ())
    }

    fn make_directory(&self, path: &Path) -> Result<(), ContextError> {
        self.script(MKDIR_SCRIPT, &[path], None).map(|_| ())
    }

    fn list_entries(&self, path: &Path) -> Result<Vec<DirEntry>, ContextError> {
        let stdout = self.script(LIST_SCRIPT, &[path], None)?;
        parse_listing(&format!("listing of {}", path.display()), &stdout)
    }

    fn run_command(&self, path: &Path) -> Result<Vec<u8>, ContextError> {
        self.checked(path.display().to_string(), vec![path_arg(path)?], None)
    }
}
