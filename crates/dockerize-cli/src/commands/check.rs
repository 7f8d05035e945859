use std::path::Path;

use anyhow::Context as _;
use dockerize_core::{DockerizeConfig, Registry};

/// Validate `registry`, or the registry the project would use.
pub fn check(project_dir: &Path, registry: Option<&Path>) -> anyhow::Result<()> {
    let (origin, loaded) = match registry {
        Some(path) => (
            path.display().to_string(),
            Registry::load(path).with_context(|| format!("registry {} is invalid", path.display())),
        ),
        None => {
            let config = DockerizeConfig::load(project_dir)?;
            let origin = config
                .project
                .registry
                .as_ref()
                .map_or_else(|| "built-in registry".to_owned(), |p| p.display().to_string());
            let loaded = config
                .registry(project_dir)
                .with_context(|| format!("{origin} is invalid"));
            (origin, loaded)
        }
    };
    let registry = loaded?;

    println!(
        "OK: {origin} defines {} stack(s): {}",
        registry.profiles().len(),
        registry.stack_ids().join(", ")
    );
    Ok(())
}
