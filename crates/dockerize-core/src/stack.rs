//! Stack profiles and their detection markers.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::oracle::FileOracle;
use crate::template::Template;
use crate::variables::VariableSpec;

/// Variables every stack declares implicitly, derived from the profile.
pub const BUILTIN_VARIABLES: &[&str] = &["BUILD_COMMAND", "PORT", "STACK_ID", "START_COMMAND"];

/// Stable identifier of a stack, e.g. `nodejs` or `php-laravel`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StackId(String);

impl StackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StackId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for StackId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A single filesystem predicate, relative to the project root.
///
/// In TOML: `{ exists = "package.json" }` or `{ absent = "composer.json" }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Marker {
    Exists(PathBuf),
    Absent(PathBuf),
}

impl Marker {
    pub fn path(&self) -> &Path {
        match self {
            Self::Exists(p) | Self::Absent(p) => p,
        }
    }

    pub fn holds(&self, oracle: &dyn FileOracle) -> bool {
        match self {
            Self::Exists(p) => oracle.exists(p),
            Self::Absent(p) => !oracle.exists(p),
        }
    }

    /// True when no filesystem state can satisfy both markers.
    pub fn contradicts(&self, other: &Marker) -> bool {
        match (self, other) {
            (Self::Exists(a), Self::Absent(b)) | (Self::Absent(a), Self::Exists(b)) => {
                normalized(a) == normalized(b)
            }
            _ => false,
        }
    }
}

/// `./composer.json` and `composer.json` name the same file.
pub(crate) fn normalized(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exists(p) => write!(f, "exists {}", p.display()),
            Self::Absent(p) => write!(f, "absent {}", p.display()),
        }
    }
}

/// Declarative description of one technology stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackProfile {
    pub id: StackId,
    /// Evaluation order during detection, lowest first. Unique per registry.
    pub priority: u32,
    #[serde(default)]
    pub description: Option<String>,
    /// All must hold for the profile to match.
    pub markers: Vec<Marker>,
    pub default_port: u16,
    pub build_command: String,
    pub start_command: String,
    #[serde(default)]
    pub variables: BTreeMap<String, VariableSpec>,
}

impl StackProfile {
    pub fn matches(&self, oracle: &dyn FileOracle) -> bool {
        self.first_failing_marker(oracle).is_none()
    }

    /// Markers are checked in declared order; evaluation stops at the first
    /// one that does not hold.
    pub fn first_failing_marker(&self, oracle: &dyn FileOracle) -> Option<&Marker> {
        self.markers.iter().find(|m| !m.holds(oracle))
    }

    /// True when some filesystem state satisfies both profiles.
    pub fn overlaps(&self, other: &StackProfile) -> bool {
        !self
            .markers
            .iter()
            .any(|a| other.markers.iter().any(|b| a.contradicts(b)))
    }

    /// Full variable declarations for this stack: the built-in variables
    /// derived from the profile, overlaid by the profile's own declarations.
    ///
    /// `BUILD_COMMAND` and `START_COMMAND` are default expressions, so
    /// placeholders inside the commands resolve against other variables.
    pub fn declarations(&self) -> BTreeMap<String, VariableSpec> {
        let mut decls = BTreeMap::new();
        decls.insert(
            "STACK_ID".to_owned(),
            VariableSpec::defaulted(Template::literal(self.id.as_str())),
        );
        decls.insert(
            "PORT".to_owned(),
            VariableSpec::defaulted(Template::literal(&self.default_port.to_string())),
        );
        decls.insert(
            "BUILD_COMMAND".to_owned(),
            VariableSpec::defaulted(Template::parse(&self.build_command)),
        );
        decls.insert(
            "START_COMMAND".to_owned(),
            VariableSpec::defaulted(Template::parse(&self.start_command)),
        );
        for (name, spec) in &self.variables {
            decls.insert(name.clone(), spec.clone());
        }
        decls
    }
}
