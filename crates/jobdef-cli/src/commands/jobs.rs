//! Job commands.

use super::{Options, load};
use anyhow::{Context, Result};
use jobdef_config::Format;
use jobdef_config::render::{render_kdl, render_yaml};
use std::path::{Path, PathBuf};

pub fn list(options: &Options, paths: &[PathBuf]) -> Result<()> {
    let loader = load(options.settings()?, paths)?;
    let registry = loader.registry();

    if registry.is_empty() {
        println!("No jobs found");
        return Ok(());
    }

    for job in registry.jobs() {
        match &job.parent {
            Some(parent) if registry.is_external(parent) => {
                println!("{} (parent: {}, external)", job.name, parent)
            }
            Some(parent) => println!("{} (parent: {})", job.name, parent),
            None => println!("{}", job.name),
        }
    }
    Ok(())
}

pub fn show(options: &Options, path: &Path, job: &str, env: bool) -> Result<()> {
    let mut settings = options.settings()?;
    settings.interpolate_env |= env;

    let loader = load(settings, &[path.to_path_buf()])?;
    let descriptor = loader
        .resolve(job)
        .with_context(|| format!("Failed to resolve job: {}", job))?;

    println!("{}", serde_json::to_string_pretty(&descriptor)?);
    Ok(())
}

pub fn render(options: &Options, paths: &[PathBuf], format: Format) -> Result<()> {
    let loader = load(options.settings()?, paths)?;
    let jobs = loader.registry().jobs();

    let text = match format {
        Format::Yaml => render_yaml(jobs)?,
        Format::Kdl => render_kdl(jobs),
    };
    print!("{}", text);
    Ok(())
}
