use std::ffi::OsString;
use std::path::{Path, PathBuf};

use dockerize_core::{
    ConfigSet, DockerizeConfig, FsOracle, Registry, StackId, StackProfile, parse_override,
};

/// Everything a resolving command needs from the project directory.
pub(crate) struct Context {
    pub project_dir: PathBuf,
    pub config: DockerizeConfig,
    pub registry: Registry,
}

impl Context {
    pub fn load(project_dir: &Path) -> anyhow::Result<Self> {
        if !project_dir.is_dir() {
            anyhow::bail!("project directory {} not found", project_dir.display());
        }
        let config = DockerizeConfig::load(project_dir)?;
        let registry = config.registry(project_dir)?;
        Ok(Self {
            project_dir: project_dir.to_path_buf(),
            config,
            registry,
        })
    }

    /// `--stack`, then `project.stack` from dockerize.toml, then detection.
    pub fn select_stack(&self, flag: Option<&str>) -> anyhow::Result<&StackProfile> {
        let chosen = flag
            .map(StackId::new)
            .or_else(|| self.config.project.stack.clone());
        match chosen {
            Some(id) => {
                tracing::debug!(stack = %id, "stack selected explicitly");
                Ok(self.registry.profile(&id)?)
            }
            None => self.detect(),
        }
    }

    pub fn detect(&self) -> anyhow::Result<&StackProfile> {
        let oracle = FsOracle::new(&self.project_dir);
        Ok(dockerize_core::detect(&self.registry, &oracle)?)
    }

    /// Layers, lowest first: declared defaults (plus `ARTIFACT_DIR`), the
    /// environment snapshot, `[variables]` from dockerize.toml, `--set` flags.
    pub fn config_set(
        &self,
        profile: &StackProfile,
        sets: &[String],
        artifact_dir: &Path,
    ) -> anyhow::Result<ConfigSet> {
        let flags = sets
            .iter()
            .map(|s| parse_override(s))
            .collect::<Result<Vec<_>, _>>()?;
        let decls = profile.declarations();
        let process = process_env(decls.keys().map(String::as_str), |name| {
            std::env::var_os(name)
        });
        let env = self.config.environment(&self.project_dir, process)?;

        Ok(ConfigSet::from_declarations(&decls)
            .with_defaults([("ARTIFACT_DIR", artifact_dir.display().to_string())])
            .with_environment(env)
            .with_overrides(&self.config.variables)
            .with_overrides(flags))
    }

    /// `--out` if given, otherwise the configured output directory.
    pub fn output_dir(&self, out: Option<&Path>) -> PathBuf {
        match out {
            Some(dir) => dir.to_path_buf(),
            None => self.config.output_dir(&self.project_dir),
        }
    }

    /// The output directory as the build recipes see it: relative to the
    /// project root when it lies inside it.
    pub fn artifact_dir(&self, output_dir: &Path) -> PathBuf {
        if !output_dir.starts_with(&self.project_dir) {
            return output_dir.to_path_buf();
        }
        let relative: PathBuf = output_dir
            .components()
            .skip(self.project_dir.components().count())
            .collect();
        if relative.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            relative
        }
    }
}

/// Values of the declared `names` in the process environment. A value that
/// is not valid UTF-8 is skipped with a warning.
fn process_env<'a>(
    names: impl IntoIterator<Item = &'a str>,
    lookup: impl Fn(&str) -> Option<OsString>,
) -> Vec<(String, String)> {
    names
        .into_iter()
        .filter_map(|name| match lookup(name)?.into_string() {
            Ok(value) => Some((name.to_owned(), value)),
            Err(raw) => {
                tracing::warn!(variable = name, value = ?raw, "ignoring non-UTF-8 environment value");
                None
            }
        })
        .collect()
}
