use std::io::Write as _;
use std::path::{Component, Path, PathBuf};

use dockerize_core::{StackId, validate_relative_path};
use tempfile::NamedTempFile;

use crate::resolve::{RenderedArtifact, ResolutionResult};

/// Paths touched by [`write`], relative to the destination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    pub written: Vec<PathBuf>,
    /// Already on disk with identical contents.
    pub unchanged: Vec<PathBuf>,
}

/// Write every artifact of a complete resolution under `destination`.
///
/// Every target is checked and every artifact is staged into a synced temp
/// file next to its target before the first one is moved into place. A
/// failure up to that point leaves existing files as they were; temp files
/// never outlive the call.
///
/// # Errors
///
/// [`WriteError::IncompleteConfiguration`] if the resolution still has
/// unresolved variables; nothing is created in that case, not even
/// `destination`. [`WriteError::TargetBlocked`] if a target or one of its
/// parents is in the way. [`WriteError::Persist`] lists the artifacts
/// already moved into place when a later rename fails.
pub fn write(result: &ResolutionResult, destination: &Path) -> Result<WriteOutcome, WriteError> {
    if !result.is_complete() {
        return Err(WriteError::IncompleteConfiguration {
            stack: result.stack.clone(),
            missing: result.unresolved.clone(),
        });
    }
    for artifact in &result.artifacts {
        validate_relative_path(&artifact.path).map_err(|reason| {
            WriteError::InvalidArtifactPath {
                path: artifact.path.clone(),
                reason,
            }
        })?;
    }

    let targets = result
        .artifacts
        .iter()
        .map(|artifact| {
            check_target(destination, &artifact.path)
                .map(|()| (destination.join(&artifact.path), artifact))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut outcome = WriteOutcome::default();
    let mut staged = Vec::new();
    for (target, artifact) in targets {
        if is_unchanged(&target, artifact) {
            tracing::debug!(path = %target.display(), "artifact unchanged");
            outcome.unchanged.push(artifact.path.clone());
            continue;
        }
        staged.push((stage(&target, artifact)?, target, &artifact.path));
    }

    for (file, target, relative) in staged {
        if let Err(e) = file.persist(&target) {
            return Err(WriteError::Persist {
                path: target,
                written: outcome.written,
                source: e.error,
            });
        }
        tracing::info!(path = %target.display(), "artifact written");
        outcome.written.push(relative.clone());
    }

    Ok(outcome)
}

/// `relative` must already be validated. Existing directories at the target
/// and non-directories among its parents would only fail at rename time.
fn check_target(destination: &Path, relative: &Path) -> Result<(), WriteError> {
    let blocked = |path: PathBuf, reason: &'static str| WriteError::TargetBlocked { path, reason };

    let mut dir = destination.to_path_buf();
    if dir.exists() && !dir.is_dir() {
        return Err(blocked(dir, "destination is not a directory"));
    }
    let mut components = relative
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .peekable();
    while let Some(component) = components.next() {
        dir.push(component);
        if components.peek().is_none() {
            if dir.is_dir() {
                return Err(blocked(dir, "target is a directory"));
            }
        } else if dir.exists() && !dir.is_dir() {
            return Err(blocked(dir, "parent is not a directory"));
        }
    }
    Ok(())
}

/// Identical bytes and executable bit. An unreadable target counts as
/// changed; staging then reports the real error.
fn is_unchanged(target: &Path, artifact: &RenderedArtifact) -> bool {
    match std::fs::read(target) {
        Ok(existing) => {
            existing == artifact.contents.as_bytes() && mode_matches(target, artifact.executable)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::debug!(path = %target.display(), error = %e, "cannot compare existing artifact");
            false
        }
    }
}

fn stage(target: &Path, artifact: &RenderedArtifact) -> Result<NamedTempFile, WriteError> {
    let dir = match target.parent() {
        Some(dir) => dir,
        None => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| WriteError::CreateDir {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let stage_err = |e: std::io::Error| WriteError::Stage {
        path: target.to_path_buf(),
        source: e,
    };
    let mut file = NamedTempFile::new_in(dir).map_err(stage_err)?;
    file.write_all(artifact.contents.as_bytes()).map_err(stage_err)?;
    set_mode(&file, artifact.executable).map_err(stage_err)?;
    file.as_file().sync_all().map_err(stage_err)?;
    Ok(file)
}

#[cfg(unix)]
fn set_mode(file: &NamedTempFile, executable: bool) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mode = if executable { 0o755 } else { 0o644 };
    file.as_file().set_permissions(std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &NamedTempFile, _executable: bool) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn mode_matches(target: &Path, executable: bool) -> bool {
    use std::os::unix::fs::PermissionsExt;

    match std::fs::metadata(target) {
        Ok(meta) => (meta.permissions().mode() & 0o111 != 0) == executable,
        Err(e) => {
            tracing::debug!(path = %target.display(), error = %e, "cannot read artifact mode");
            false
        }
    }
}

#[cfg(not(unix))]
fn mode_matches(_target: &Path, _executable: bool) -> bool {
    true
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error(
        "incomplete configuration for stack '{stack}': missing {}",
        missing.join(", ")
    )]
    IncompleteConfiguration {
        stack: StackId,
        missing: Vec<String>,
    },
    #[error("invalid artifact path {path:?}: {reason}")]
    InvalidArtifactPath { path: PathBuf, reason: &'static str },
    #[error("cannot write {path}: {reason}")]
    TargetBlocked { path: PathBuf, reason: &'static str },
    #[error("failed to create directory {path}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to stage {path}")]
    Stage {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(
        "failed to move staged file into place at {path} (already written: {})",
        display_paths(written)
    )]
    Persist {
        path: PathBuf,
        written: Vec<PathBuf>,
        source: std::io::Error,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "none".to_owned();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
