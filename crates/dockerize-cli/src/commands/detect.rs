use std::path::Path;

use serde::Serialize;

use super::context::Context;

#[derive(Serialize)]
struct Detected<'a> {
    stack: &'a str,
    description: Option<&'a str>,
    port: u16,
    build_command: &'a str,
    start_command: &'a str,
}

pub fn detect(project_dir: &Path, json: bool) -> anyhow::Result<()> {
    let ctx = Context::load(project_dir)?;
    let profile = ctx.detect()?;

    if json {
        let detected = Detected {
            stack: profile.id.as_str(),
            description: profile.description.as_deref(),
            port: profile.default_port,
            build_command: &profile.build_command,
            start_command: &profile.start_command,
        };
        println!("{}", serde_json::to_string_pretty(&detected)?);
        return Ok(());
    }

    println!("{}", profile.id);
    if let Some(description) = &profile.description {
        println!("  {description}");
    }
    println!("  port:  {}", profile.default_port);
    println!("  build: {}", profile.build_command);
    println!("  start: {}", profile.start_command);
    Ok(())
}
