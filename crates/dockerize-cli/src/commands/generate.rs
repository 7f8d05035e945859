use std::path::Path;

use dockerize_build::WriteError;

use super::context::Context;

pub fn generate(
    project_dir: &Path,
    stack: Option<&str>,
    sets: &[String],
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let ctx = Context::load(project_dir)?;
    let profile = ctx.select_stack(stack)?;
    let output_dir = ctx.output_dir(out);
    let config = ctx.config_set(profile, sets, &ctx.artifact_dir(&output_dir))?;
    let result = dockerize_build::resolve(&ctx.registry, &profile.id, &config)?;

    let outcome = match dockerize_build::write(&result, &output_dir) {
        Ok(outcome) => outcome,
        Err(WriteError::IncompleteConfiguration { stack, missing }) => {
            eprintln!("Cannot generate artifacts for '{stack}'; missing values for:");
            for name in &missing {
                eprintln!("  {name}");
            }
            eprintln!();
            eprintln!("Supply them with --set NAME=VALUE, [variables] in dockerize.toml, or the environment.");
            anyhow::bail!("incomplete configuration: {}", missing.join(", "));
        }
        Err(e) => return Err(e.into()),
    };

    for path in &outcome.written {
        println!("Wrote {}", output_dir.join(path).display());
    }
    for path in &outcome.unchanged {
        println!("Unchanged {}", output_dir.join(path).display());
    }
    println!();
    println!(
        "Stack '{}': {} written, {} unchanged",
        result.stack,
        outcome.written.len(),
        outcome.unchanged.len()
    );
    Ok(())
}
