use std::path::Path;

use super::context::Context;

/// Resolve without writing. Fails when variables remain unresolved, after
/// printing what was resolved so far.
pub fn plan(
    project_dir: &Path,
    stack: Option<&str>,
    sets: &[String],
    json: bool,
) -> anyhow::Result<()> {
    let ctx = Context::load(project_dir)?;
    let profile = ctx.select_stack(stack)?;
    let output_dir = ctx.output_dir(None);
    let config = ctx.config_set(profile, sets, &ctx.artifact_dir(&output_dir))?;
    let result = dockerize_build::resolve(&ctx.registry, &profile.id, &config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("Stack: {}", result.stack);
        for artifact in &result.artifacts {
            println!();
            println!("── {} ({}) ──", artifact.path.display(), artifact.kind);
            print!("{}", artifact.contents);
        }
        if !result.unresolved.is_empty() {
            println!();
            println!("Unresolved variables:");
            for name in &result.unresolved {
                println!("  {name}");
            }
        }
    }

    if !result.is_complete() {
        anyhow::bail!(
            "{} unresolved variable(s): {}",
            result.unresolved.len(),
            result.unresolved.join(", ")
        );
    }
    Ok(())
}
