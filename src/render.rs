use crate::context::{ContextError, ExecutionContext, exit_description, stderr_suffix};
use crate::fragments::{Fragment, FragmentKind};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Failed to read fragment {fragment}: {source}")]
    Read {
        fragment: String,
        #[source]
        source: ContextError,
    },
    #[error("Fragment {fragment} failed ({}){}", exit_description(.status), stderr_suffix(.stderr))]
    Execution {
        fragment: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("Failed to execute fragment {fragment}: {source}")]
    Invoke {
        fragment: String,
        #[source]
        source: ContextError,
    },
}

/// Strips trailing line terminators so each contribution ends in exactly one
/// newline once joined.
pub fn trim_line_endings(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&b| b != b'\n' && b != b'\r')
        .map_or(0, |i| i + 1);
    &bytes[..end]
}

fn line_count(bytes: &[u8]) -> usize {
    bytes.split(|&b| b == b'\n').count()
}

fn materialize(ctx: &dyn ExecutionContext, fragment: &Fragment) -> Result<Vec<u8>, RenderError> {
    match fragment.kind {
        FragmentKind::Static => {
            info!("Reading fragment {}", fragment.path.display());
            ctx.read_file(&fragment.path)
                .map_err(|source| RenderError::Read {
                    fragment: fragment.name.clone(),
                    source,
                })
        }
        FragmentKind::Executable => {
            info!("Executing fragment {}", fragment.path.display());
            ctx.run_command(&fragment.path).map_err(|e| match e {
                ContextError::CommandFailed { status, stderr, .. } => RenderError::Execution {
                    fragment: fragment.name.clone(),
                    status,
                    stderr,
                },
                source => RenderError::Invoke {
                    fragment: fragment.name.clone(),
                    source,
                },
            })
        }
    }
}

/// Builds the generated content from `fragments`, in order.
///
/// Every fragment contributes its bytes (or its stdout, if executable)
/// followed by exactly one newline. No fragments means empty content. The
/// first failing fragment aborts the whole render.
pub fn render_fragments(
    ctx: &dyn ExecutionContext,
    fragments: &[Fragment],
) -> Result<Vec<u8>, RenderError> {
    let mut content = Vec::new();

    for fragment in fragments {
        let raw = materialize(ctx, fragment)?;
        let contribution = trim_line_endings(&raw);
        debug!(
            "Fragment {} contributed {} lines",
            fragment.name,
            line_count(contribution)
        );
        content.extend_from_slice(contribution);
        content.push(b'\n');
    }

    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LocalContext;
    use crate::fragments::collect_fragments;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn write_script(path: &Path, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        fs::write(path, body).unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn render_dir(dir: &Path) -> Result<Vec<u8>, RenderError> {
        let ctx = LocalContext::new();
        let fragments = collect_fragments(&ctx, dir).unwrap();
        render_fragments(&ctx, &fragments)
    }

    #[test]
    fn test_trim_line_endings() {
        assert_eq!(trim_line_endings(b"A\n"), b"A");
        assert_eq!(trim_line_endings(b"A\r\n\r\n"), b"A");
        assert_eq!(trim_line_endings(b"A\n\nB"), b"A\n\nB");
        assert_eq!(trim_line_endings(b"\n\n"), b"");
        assert_eq!(trim_line_endings(b""), b"");
    }

    #[test]
    fn test_empty_fragment_list_renders_nothing() {
        let content = render_fragments(&LocalContext::new(), &[]).unwrap();
        assert!(content.is_empty());
    }

    #[test]
    fn test_joins_with_single_newlines_in_natural_order() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        // Created out of order on purpose.
        fs::write(root.join("10-extra"), "extra\n").unwrap();
        fs::write(root.join("1-local"), "local").unwrap();
        fs::write(root.join("2-work"), "work\n\n\n").unwrap();

        let content = render_dir(root).unwrap();

        assert_eq!(content, b"local\nwork\nextra\n");
    }

    #[test]
    fn test_interior_blank_lines_are_kept() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a"), "one\n\ntwo\n").unwrap();

        assert_eq!(render_dir(temp.path()).unwrap(), b"one\n\ntwo\n");
    }

    #[test]
    fn test_empty_fragment_contributes_blank_line() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("1"), "a\n").unwrap();
        fs::write(temp.path().join("2"), "").unwrap();
        fs::write(temp.path().join("3"), "b\n").unwrap();

        assert_eq!(render_dir(temp.path()).unwrap(), b"a\n\nb\n");
    }

    #[test]
    #[cfg(unix)]
    fn test_executable_output_is_captured() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write_script(&root.join("01-exec.conf"), "#!/bin/sh\necho X\n");
        fs::write(root.join("02-noexec.conf"), "#!/bin/sh\necho not run\n").unwrap();

        let content = render_dir(root).unwrap();

        assert_eq!(content, b"X\n#!/bin/sh\necho not run\n");
    }

    #[test]
    #[cfg(unix)]
    fn test_failing_executable_aborts() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("1-first"), "first\n").unwrap();
        write_script(&root.join("2-broken"), "#!/bin/sh\necho partial\nexit 1\n");
        fs::write(root.join("3-last"), "last\n").unwrap();

        let result = render_dir(root);

        match result {
            Err(RenderError::Execution {
                fragment, status, ..
            }) => {
                assert_eq!(fragment, "2-broken");
                assert_eq!(status, Some(1));
            }
            other => panic!("Expected Execution error, got {other:?}"),
        }
    }

    #[test]
    #[cfg(unix)]
    fn test_error_message_names_fragment() {
        let temp = TempDir::new().unwrap();
        write_script(
            &temp.path().join("gen"),
            "#!/bin/sh\necho 'database unreachable' >&2\nexit 4\n",
        );

        let error = render_dir(temp.path()).unwrap_err();

        assert_eq!(
            error.to_string(),
            "Fragment gen failed (exit status 4): database unreachable"
        );
    }

    #[test]
    fn test_render_does_not_modify_fragments() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("a"), "a\n\n").unwrap();

        render_dir(root).unwrap();

        assert_eq!(fs::read(root.join("a")).unwrap(), b"a\n\n");
    }
}
