use std::collections::BTreeSet;
use std::path::PathBuf;

use dockerize_core::{
    ArtifactKind, ConfigSet, Registry, Resolved, StackId, UnknownStack,
};
use serde::Serialize;

/// One artifact with every resolvable placeholder substituted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedArtifact {
    pub kind: ArtifactKind,
    /// Relative to the destination directory.
    pub path: PathBuf,
    pub contents: String,
    pub executable: bool,
}

/// Output of [`resolve`]: rendered artifacts plus the names that blocked
/// a complete rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionResult {
    pub stack: StackId,
    /// Build recipe, manifest, entrypoint, in that order.
    pub artifacts: Vec<RenderedArtifact>,
    /// Sorted and deduplicated.
    pub unresolved: Vec<String>,
}

impl ResolutionResult {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }

    pub fn artifact(&self, kind: ArtifactKind) -> Option<&RenderedArtifact> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }
}

/// Render the template set of `stack` against `config`.
///
/// Unresolved placeholders are left as `${NAME}` in the contents and their
/// root missing variables are listed in [`ResolutionResult::unresolved`],
/// together with every required variable of `config` that has no value.
pub fn resolve(
    registry: &Registry,
    stack: &StackId,
    config: &ConfigSet,
) -> Result<ResolutionResult, UnknownStack> {
    let set = registry.template_set(stack)?;
    let evaluation = config.evaluate();

    let mut unresolved: BTreeSet<String> = evaluation
        .iter()
        .filter_map(|(_, resolved)| match resolved {
            Resolved::Missing(roots) => Some(roots.iter().cloned()),
            Resolved::Value(_) => None,
        })
        .flatten()
        .collect();

    let artifacts = set
        .artifacts()
        .map(|(kind, artifact)| {
            let rendered = artifact.template.render(|name| match evaluation.get(name) {
                Some(Resolved::Value(v)) => Some(v.as_str()),
                Some(Resolved::Missing(_)) => None,
                None => {
                    unresolved.insert(name.to_owned());
                    None
                }
            });
            if !rendered.missing.is_empty() {
                tracing::debug!(
                    stack = %stack,
                    artifact = %kind,
                    placeholders = ?rendered.missing,
                    "placeholders left intact"
                );
            }
            RenderedArtifact {
                kind,
                path: artifact.path.clone(),
                contents: rendered.text,
                executable: kind == ArtifactKind::Entrypoint,
            }
        })
        .collect();

    tracing::debug!(stack = %stack, unresolved = unresolved.len(), "stack resolved");

    Ok(ResolutionResult {
        stack: stack.clone(),
        artifacts,
        unresolved: unresolved.into_iter().collect(),
    })
}
