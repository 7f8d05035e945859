//! The stack registry: profiles, their template sets, and load-time
//! validation.
//!
//! A registry is loaded once, validated, and then only borrowed. Every
//! misconfiguration that could otherwise surface during a particular
//! invocation (overlapping markers, undeclared placeholders, cyclic
//! defaults) is rejected here.
//!
//! # File format
//!
//! ```toml
//! [variables.COOLIFY_FQDN]        # shared by every stack
//! required = true
//!
//! [[stack]]
//! id = "nodejs"
//! priority = 20
//! default_port = 3000
//! build_command = "npm run build"
//! start_command = "node ${ENTRY_POINT}"
//! markers = [{ exists = "package.json" }, { absent = "composer.json" }]
//!
//! [stack.variables.ENTRY_POINT]
//! default = "dist/index.js"
//!
//! [[template_set]]
//! stack = "nodejs"
//! build_recipe = { path = "Dockerfile", template = "..." }
//! manifest = { path = "coolify.env", template = "..." }
//! entrypoint = { path = "docker-entrypoint.sh", template = "..." }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, UnknownStack};
use crate::stack::{StackId, StackProfile, normalized};
use crate::template::Template;
use crate::variables::{VariableSpec, default_order, find_cycle};

const BUILTIN_REGISTRY: &str = include_str!("builtin.toml");

/// Which artifact of a template set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    BuildRecipe,
    Manifest,
    Entrypoint,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [Self::BuildRecipe, Self::Manifest, Self::Entrypoint];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BuildRecipe => "build_recipe",
            Self::Manifest => "manifest",
            Self::Entrypoint => "entrypoint",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::BuildRecipe => "build recipe",
            Self::Manifest => "manifest",
            Self::Entrypoint => "entrypoint",
        })
    }
}

/// One parameterized output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactTemplate {
    /// Output path relative to the destination directory.
    pub path: PathBuf,
    pub template: Template,
}

/// The artifact templates of one stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateSet {
    pub stack: StackId,
    pub build_recipe: ArtifactTemplate,
    pub manifest: ArtifactTemplate,
    pub entrypoint: ArtifactTemplate,
}

impl TemplateSet {
    pub fn artifact(&self, kind: ArtifactKind) -> &ArtifactTemplate {
        match kind {
            ArtifactKind::BuildRecipe => &self.build_recipe,
            ArtifactKind::Manifest => &self.manifest,
            ArtifactKind::Entrypoint => &self.entrypoint,
        }
    }

    /// Artifacts in a fixed order: build recipe, manifest, entrypoint.
    pub fn artifacts(&self) -> impl Iterator<Item = (ArtifactKind, &ArtifactTemplate)> {
        ArtifactKind::ALL.into_iter().map(|k| (k, self.artifact(k)))
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryFile {
    #[serde(default)]
    variables: BTreeMap<String, VariableSpec>,
    #[serde(default)]
    stack: Vec<StackProfile>,
    #[serde(default)]
    template_set: Vec<TemplateSet>,
}

/// Validated, read-only set of stack profiles and template sets.
#[derive(Debug, Clone)]
pub struct Registry {
    /// Sorted by ascending priority.
    profiles: Vec<StackProfile>,
    template_sets: BTreeMap<StackId, TemplateSet>,
}

impl Registry {
    /// The registry compiled into the binary.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_toml_str(BUILTIN_REGISTRY, "<builtin>")
    }

    /// Load and validate a registry file.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        tracing::debug!(path = %path.display(), "loading registry");
        let content = std::fs::read_to_string(path).map_err(|e| RegistryError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    /// Parse and validate registry TOML. `origin` names the source in errors.
    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = toml::from_str(content).map_err(|e| RegistryError::Parse {
            origin: origin.to_owned(),
            source: e,
        })?;
        Self::from_parts(file.variables, file.stack, file.template_set)
    }

    /// Build a registry from already-parsed pieces.
    ///
    /// `shared` declarations are merged into every profile; a profile's own
    /// declaration of the same name wins.
    pub fn from_parts(
        shared: BTreeMap<String, VariableSpec>,
        profiles: Vec<StackProfile>,
        template_sets: Vec<TemplateSet>,
    ) -> Result<Self, RegistryError> {
        let mut profiles: Vec<StackProfile> = profiles
            .into_iter()
            .map(|mut p| {
                for (name, spec) in &shared {
                    p.variables
                        .entry(name.clone())
                        .or_insert_with(|| spec.clone());
                }
                p
            })
            .collect();

        check_identity(&profiles)?;
        for profile in &profiles {
            check_markers(profile)?;
        }
        check_exclusive(&profiles)?;

        let template_sets = index_template_sets(&profiles, template_sets)?;
        for profile in &profiles {
            let set = &template_sets[&profile.id];
            let decls = profile.declarations();
            check_artifacts(&profile.id, set, &decls)?;
            check_defaults(&profile.id, &decls)?;
        }

        profiles.sort_by_key(|p| p.priority);
        tracing::debug!(stacks = profiles.len(), "registry validated");

        Ok(Self {
            profiles,
            template_sets,
        })
    }

    /// Profiles in detection order.
    pub fn profiles(&self) -> &[StackProfile] {
        &self.profiles
    }

    pub fn profile(&self, id: &StackId) -> Result<&StackProfile, UnknownStack> {
        self.profiles
            .iter()
            .find(|p| p.id == *id)
            .ok_or_else(|| self.unknown(id))
    }

    pub fn template_set(&self, id: &StackId) -> Result<&TemplateSet, UnknownStack> {
        self.template_sets.get(id).ok_or_else(|| self.unknown(id))
    }

    pub fn stack_ids(&self) -> Vec<String> {
        self.profiles.iter().map(|p| p.id.to_string()).collect()
    }

    fn unknown(&self, id: &StackId) -> UnknownStack {
        UnknownStack {
            stack: id.clone(),
            known: self.stack_ids(),
        }
    }
}

/// Reject absolute paths, `..`, and other non-plain components.
pub fn validate_relative_path(path: &Path) -> Result<(), &'static str> {
    if path.as_os_str().is_empty() {
        return Err("path is empty");
    }
    for component in path.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return Err("path must not contain '..'"),
            Component::RootDir | Component::Prefix(_) => return Err("path must be relative"),
        }
    }
    if !path.components().any(|c| matches!(c, Component::Normal(_))) {
        return Err("path does not name a file");
    }
    Ok(())
}

fn check_identity(profiles: &[StackProfile]) -> Result<(), RegistryError> {
    let mut ids = BTreeSet::new();
    let mut priorities: BTreeMap<u32, &StackId> = BTreeMap::new();
    for p in profiles {
        if !ids.insert(&p.id) {
            return Err(RegistryError::DuplicateStack(p.id.clone()));
        }
        if let Some(first) = priorities.insert(p.priority, &p.id) {
            return Err(RegistryError::DuplicatePriority {
                priority: p.priority,
                first: first.clone(),
                second: p.id.clone(),
            });
        }
    }
    Ok(())
}

fn check_markers(profile: &StackProfile) -> Result<(), RegistryError> {
    if profile.markers.is_empty() {
        return Err(RegistryError::NoMarkers(profile.id.clone()));
    }
    for (i, marker) in profile.markers.iter().enumerate() {
        validate_relative_path(marker.path()).map_err(|reason| {
            RegistryError::InvalidMarkerPath {
                stack: profile.id.clone(),
                path: marker.path().to_path_buf(),
                reason,
            }
        })?;
        if profile.markers[i + 1..].iter().any(|m| m.contradicts(marker)) {
            return Err(RegistryError::ContradictoryMarkers {
                stack: profile.id.clone(),
                path: marker.path().to_path_buf(),
            });
        }
    }
    Ok(())
}

/// Two conjunctions of presence/absence literals can both hold unless one
/// requires a path the other forbids.
fn check_exclusive(profiles: &[StackProfile]) -> Result<(), RegistryError> {
    for (i, a) in profiles.iter().enumerate() {
        for b in &profiles[i + 1..] {
            if a.overlaps(b) {
                let (first, second) = if a.priority <= b.priority { (a, b) } else { (b, a) };
                return Err(RegistryError::AmbiguousMarkers {
                    first: first.id.clone(),
                    second: second.id.clone(),
                });
            }
        }
    }
    Ok(())
}

fn index_template_sets(
    profiles: &[StackProfile],
    sets: Vec<TemplateSet>,
) -> Result<BTreeMap<StackId, TemplateSet>, RegistryError> {
    let known: BTreeSet<&StackId> = profiles.iter().map(|p| &p.id).collect();
    let mut indexed = BTreeMap::new();
    for set in sets {
        if !known.contains(&set.stack) {
            return Err(RegistryError::OrphanTemplateSet(set.stack));
        }
        if indexed.contains_key(&set.stack) {
            return Err(RegistryError::DuplicateTemplateSet(set.stack));
        }
        indexed.insert(set.stack.clone(), set);
    }
    if let Some(p) = profiles.iter().find(|p| !indexed.contains_key(&p.id)) {
        return Err(RegistryError::MissingTemplateSet(p.id.clone()));
    }
    Ok(indexed)
}

fn check_artifacts(
    stack: &StackId,
    set: &TemplateSet,
    decls: &BTreeMap<String, VariableSpec>,
) -> Result<(), RegistryError> {
    let mut paths = BTreeSet::new();
    for (kind, artifact) in set.artifacts() {
        validate_relative_path(&artifact.path).map_err(|reason| {
            RegistryError::InvalidArtifactPath {
                stack: stack.clone(),
                path: artifact.path.clone(),
                reason,
            }
        })?;
        if !paths.insert(normalized(&artifact.path)) {
            return Err(RegistryError::DuplicateArtifactPath {
                stack: stack.clone(),
                path: artifact.path.clone(),
            });
        }
        if let Some(name) = artifact
            .template
            .placeholders()
            .into_iter()
            .find(|name| !decls.contains_key(*name))
        {
            return Err(RegistryError::UndeclaredPlaceholder {
                stack: stack.clone(),
                artifact: kind.to_string(),
                placeholder: name.to_owned(),
            });
        }
    }
    Ok(())
}

fn check_defaults(
    stack: &StackId,
    decls: &BTreeMap<String, VariableSpec>,
) -> Result<(), RegistryError> {
    for (name, spec) in decls {
        if let Some(reference) = spec.references().find(|r| !decls.contains_key(*r)) {
            return Err(RegistryError::UnknownDefaultReference {
                stack: stack.clone(),
                variable: name.clone(),
                reference: reference.to_owned(),
            });
        }
    }

    let order = default_order(
        decls
            .iter()
            .map(|(name, spec)| (name.as_str(), spec.references().collect::<Vec<_>>())),
    );
    if !order.stuck.is_empty() {
        let found = find_cycle(&order.stuck, |name| match decls.get(name) {
            Some(spec) => spec.references().map(str::to_owned).collect(),
            None => Vec::new(),
        });
        // Nodes stuck only behind a cycle are reported wholesale.
        let cycle = match found {
            Some(cycle) => cycle,
            None => order.stuck,
        };
        return Err(RegistryError::CyclicDefault {
            stack: stack.clone(),
            cycle,
        });
    }
    Ok(())
}
