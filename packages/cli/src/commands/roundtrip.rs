use crate::config::Config;
use anyhow::{anyhow, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use xuk_model::xuk::NoProgress;
use xuk_model::{Project, ValueEquals};

#[derive(Args, Debug)]
pub struct RoundtripArgs {
    /// XUK file to read
    pub input: PathBuf,

    /// Write the re-serialized document here
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn roundtrip(args: RoundtripArgs, cwd: &str, config: &Config) -> Result<()> {
    println!("🔁 {} {}", "Round-tripping".green().bold(), args.input.display());

    let (project, input_uri) = super::open(&args.input, cwd, config)?;
    let target = match &args.output {
        Some(output) => super::file_url(output, cwd)?,
        None => input_uri,
    };

    let mut bytes = Vec::new();
    project.write_xuk(&mut bytes, &target, &mut NoProgress)?;
    println!("   Wrote {} bytes", bytes.len());

    let mut reread = Project::with_options(config.xuk.clone());
    reread.read_xuk(bytes.as_slice(), &target, &mut NoProgress)?;
    if !project.value_equals(&reread) {
        return Err(anyhow!("Re-read document differs from the original"));
    }
    println!("   {} {} presentations value-equal", "✓".green(), reread.len());

    if let Some(output) = &args.output {
        std::fs::write(super::absolute(output, cwd), &bytes)?;
        println!("   Saved {}", output.display());
    }

    println!();
    println!("✨ {} Round trip complete!", "Done".green().bold());
    Ok(())
}
