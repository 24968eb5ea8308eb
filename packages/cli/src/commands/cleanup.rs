use crate::config::Config;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use tracing::info;

#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// XUK file to clean
    pub input: PathBuf,

    /// Save the cleaned document here instead of over the input
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn cleanup(args: CleanupArgs, cwd: &str, config: &Config) -> Result<()> {
    println!("🧹 {} {}", "Cleaning".green().bold(), args.input.display());

    let (mut project, input_uri) = super::open(&args.input, cwd, config)?;

    let (mut media_data, mut providers) = (0, 0);
    for presentation in project.presentations_mut() {
        let report = presentation.cleanup()?;
        media_data += report.removed_media_data;
        providers += report.removed_data_providers;
    }
    info!(media_data, providers, "cleanup finished");

    let target = match &args.output {
        Some(output) => super::file_url(output, cwd)?,
        None => input_uri,
    };
    project.save_xuk(&target)?;

    println!("   Removed media data: {}", media_data);
    println!("   Removed data providers: {}", providers);
    println!();
    println!("✨ {} Saved {}", "Done".green().bold(), target);
    Ok(())
}
