use std::fmt;
use std::path::PathBuf;

use crate::stack::{Marker, StackId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config at {path}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to read env file {path}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },

    #[error("invalid override {input:?}: {reason}")]
    InvalidOverride { input: String, reason: &'static str },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Detection(#[from] DetectionFailure),

    #[error(transparent)]
    UnknownStack(#[from] UnknownStack),
}

/// Registry misconfiguration, caught once at load time.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read registry {path}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse registry {origin}")]
    Parse {
        origin: String,
        source: toml::de::Error,
    },

    #[error("stack '{0}' is declared more than once")]
    DuplicateStack(StackId),

    #[error("stacks '{first}' and '{second}' share priority {priority}")]
    DuplicatePriority {
        priority: u32,
        first: StackId,
        second: StackId,
    },

    #[error("stack '{0}' has no detection markers")]
    NoMarkers(StackId),

    #[error("invalid marker path {path:?} in stack '{stack}': {reason}")]
    InvalidMarkerPath {
        stack: StackId,
        path: PathBuf,
        reason: &'static str,
    },

    #[error("stack '{stack}' can never match: {path:?} is required both present and absent")]
    ContradictoryMarkers { stack: StackId, path: PathBuf },

    #[error(
        "stacks '{first}' and '{second}' can both match the same project; \
         add an `absent` marker to one of them"
    )]
    AmbiguousMarkers { first: StackId, second: StackId },

    #[error("stack '{0}' has no template set")]
    MissingTemplateSet(StackId),

    #[error("template set refers to unknown stack '{0}'")]
    OrphanTemplateSet(StackId),

    #[error("stack '{0}' has more than one template set")]
    DuplicateTemplateSet(StackId),

    #[error("invalid artifact path {path:?} in stack '{stack}': {reason}")]
    InvalidArtifactPath {
        stack: StackId,
        path: PathBuf,
        reason: &'static str,
    },

    #[error("stack '{stack}' writes {path:?} more than once")]
    DuplicateArtifactPath { stack: StackId, path: PathBuf },

    #[error(
        "placeholder ${{{placeholder}}} in the {artifact} of stack '{stack}' is not a declared variable"
    )]
    UndeclaredPlaceholder {
        stack: StackId,
        artifact: String,
        placeholder: String,
    },

    #[error(
        "default of {variable} in stack '{stack}' references undeclared variable {reference}"
    )]
    UnknownDefaultReference {
        stack: StackId,
        variable: String,
        reference: String,
    },

    #[error("cyclic default references in stack '{stack}': {}", cycle.join(" -> "))]
    CyclicDefault { stack: StackId, cycle: Vec<String> },
}

/// One profile that did not match, with the first marker that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub stack: StackId,
    pub marker: Marker,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.stack, self.marker)
    }
}

/// No stack profile matched the project.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason}; checked: {}", format_rejections(rejected))]
pub struct DetectionFailure {
    pub reason: String,
    pub rejected: Vec<Rejection>,
}

/// A stack id with no profile or template set in the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stack '{stack}'; known stacks: {}", format_list(known))]
pub struct UnknownStack {
    pub stack: StackId,
    pub known: Vec<String>,
}

fn format_rejections(rejected: &[Rejection]) -> String {
    if rejected.is_empty() {
        "(no stacks registered)".to_owned()
    } else {
        rejected
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn format_list(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_owned()
    } else {
        items.join(", ")
    }
}
