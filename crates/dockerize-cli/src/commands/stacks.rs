use std::path::Path;

use dockerize_core::{DockerizeConfig, StackProfile};

pub fn stacks(project_dir: &Path, json: bool) -> anyhow::Result<()> {
    let config = DockerizeConfig::load(project_dir)?;
    let registry = config.registry(project_dir)?;

    if json {
        println!("{}", serde_json::to_string_pretty(registry.profiles())?);
        return Ok(());
    }

    for (i, profile) in registry.profiles().iter().enumerate() {
        if i > 0 {
            println!();
        }
        print_profile(profile);
    }
    Ok(())
}

fn print_profile(profile: &StackProfile) {
    println!("{} (priority {})", profile.id, profile.priority);
    if let Some(description) = &profile.description {
        println!("  {description}");
    }
    let markers: Vec<String> = profile.markers.iter().map(ToString::to_string).collect();
    println!("  markers:   {}", markers.join(", "));
    println!("  port:      {}", profile.default_port);

    let variables: Vec<String> = profile
        .variables
        .iter()
        .map(|(name, spec)| match (&spec.default, spec.required) {
            (Some(default), _) => format!("{name}={default}"),
            (None, true) => format!("{name} (required)"),
            (None, false) => name.clone(),
        })
        .collect();
    if !variables.is_empty() {
        println!("  variables: {}", variables.join(", "));
    }
}
