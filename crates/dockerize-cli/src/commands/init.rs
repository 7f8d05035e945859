use std::path::Path;

use dockerize_core::CONFIG_FILE;

use super::context::Context;

/// Write a dockerize.toml skeleton into the project.
pub fn init_project(project_dir: &Path) -> anyhow::Result<()> {
    let config_path = project_dir.join(CONFIG_FILE);
    if config_path.exists() {
        println!("{CONFIG_FILE} already exists, skipping");
        return Ok(());
    }
    let ctx = Context::load(project_dir)?;

    let detected = match ctx.detect() {
        Ok(profile) => Some(profile),
        Err(e) => {
            tracing::debug!(error = %e, "no stack detected for skeleton");
            None
        }
    };
    let stack_line = match detected {
        Some(profile) => format!("# stack = \"{}\"  # detected", profile.id),
        None => "# stack = \"nodejs\"".to_owned(),
    };

    let mut variables = String::new();
    if let Some(profile) = detected {
        for (name, spec) in profile.declarations() {
            if spec.required && spec.default.is_none() {
                variables.push_str(&format!("# {name} = \"\"\n"));
            }
        }
    }

    let skeleton = format!(
        r#"[project]
{stack_line}
# output_dir = ".dockerize"
# env_file = ".env"
# registry = "stacks.toml"

[variables]
{variables}"#
    );
    std::fs::write(&config_path, skeleton)?;
    println!("Created {}", config_path.display());

    println!();
    println!("Next steps:");
    println!();
    println!("  1. Fill in the required variables in {CONFIG_FILE}");
    println!("     (or pass them with --set NAME=VALUE)");
    println!();
    println!("  2. Preview the artifacts:");
    println!("     dockerize plan");
    println!();
    println!("  3. Write them:");
    println!("     dockerize generate");

    Ok(())
}
