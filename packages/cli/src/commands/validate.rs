use crate::config::Config;
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// XUK file to check
    pub input: PathBuf,
}

pub fn validate(args: ValidateArgs, cwd: &str, config: &Config) -> Result<()> {
    println!("🔍 {} {}", "Validating".green().bold(), args.input.display());

    let (project, _) = super::open(&args.input, cwd, config)?;

    let mut failures = 0;
    for (index, presentation) in project.presentations().iter().enumerate() {
        match presentation.validate() {
            Ok(()) => println!(
                "   {} Presentation {} ({} nodes)",
                "✓".green(),
                index,
                presentation.summary().node_count
            ),
            Err(err) => {
                failures += 1;
                println!("   {} Presentation {}: {}", "✗".red(), index, err);
            }
        }
    }

    println!();
    if failures > 0 {
        return Err(anyhow!("{} of {} presentations are invalid", failures, project.len()));
    }
    println!("✨ {} {} presentations valid", "Done".green().bold(), project.len());
    Ok(())
}
