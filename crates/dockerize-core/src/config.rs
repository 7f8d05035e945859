use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::registry::Registry;
use crate::stack::StackId;

/// Name of the per-project configuration file.
pub const CONFIG_FILE: &str = "dockerize.toml";

/// dockerize.toml configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockerizeConfig {
    #[serde(default)]
    pub project: ProjectConfig,
    /// Explicit overrides, applied above the environment.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Stack to use instead of detection
    pub stack: Option<StackId>,
    /// Where artifacts are written, relative to the project root
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Dotenv file merged into the environment layer
    pub env_file: Option<PathBuf>,
    /// Registry file replacing the built-in stacks
    pub registry: Option<PathBuf>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            stack: None,
            output_dir: default_output_dir(),
            env_file: None,
            registry: None,
        }
    }
}

impl DockerizeConfig {
    /// Load from dockerize.toml in the given directory, or return defaults if not found.
    pub fn load(project_dir: &Path) -> crate::Result<Self> {
        let config_path = project_dir.join(CONFIG_FILE);
        if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).map_err(|e| crate::Error::ConfigLoad {
                    path: config_path.clone(),
                    source: e,
                })?;
            toml::from_str(&content).map_err(|e| crate::Error::ConfigParse {
                path: config_path,
                source: e,
            })
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// The configured registry file, or the built-in registry.
    pub fn registry(&self, project_dir: &Path) -> crate::Result<Registry> {
        let registry = match &self.project.registry {
            Some(path) => Registry::load(&project_dir.join(path))?,
            None => Registry::builtin()?,
        };
        Ok(registry)
    }

    /// Environment snapshot: the dotenv file (if configured) overlaid by
    /// `process_env`. The process environment itself is never modified.
    pub fn environment<I>(
        &self,
        project_dir: &Path,
        process_env: I,
    ) -> crate::Result<BTreeMap<String, String>>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut env = BTreeMap::new();
        if let Some(file) = &self.project.env_file {
            let path = project_dir.join(file);
            let iter = dotenvy::from_path_iter(&path).map_err(|e| crate::Error::EnvFile {
                path: path.clone(),
                source: e,
            })?;
            for item in iter {
                let (key, value) = item.map_err(|e| crate::Error::EnvFile {
                    path: path.clone(),
                    source: e,
                })?;
                env.insert(key, value);
            }
            tracing::debug!(path = %path.display(), entries = env.len(), "env file loaded");
        }
        env.extend(process_env);
        Ok(env)
    }

    pub fn output_dir(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.project.output_dir)
    }
}

/// Parse a `KEY=VALUE` override.
///
/// The key must be a valid placeholder name; the value may be empty and may
/// contain further `=` characters.
pub fn parse_override(input: &str) -> crate::Result<(String, String)> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| crate::Error::InvalidOverride {
            input: input.to_owned(),
            reason: "expected KEY=VALUE",
        })?;
    let mut chars = key.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(crate::Error::InvalidOverride {
            input: input.to_owned(),
            reason: "key must match [A-Za-z_][A-Za-z0-9_]*",
        });
    }
    Ok((key.to_owned(), value.to_owned()))
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".dockerize")
}
