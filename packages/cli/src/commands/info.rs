use crate::config::{Config, OutputFormat};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use xuk_model::PresentationSummary;

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// XUK file to inspect
    pub input: PathBuf,

    /// Output format (text, json)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,
}

pub fn info(args: InfoArgs, cwd: &str, config: &Config) -> Result<()> {
    let (project, _) = super::open(&args.input, cwd, config)?;
    let summaries: Vec<PresentationSummary> =
        project.presentations().iter().map(|p| p.summary()).collect();

    match args.format.unwrap_or(config.output_format) {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        OutputFormat::Text => {
            println!("📖 {} {}", "Project".green().bold(), args.input.display());
            println!("   Presentations: {}", summaries.len());
            for (index, summary) in summaries.iter().enumerate() {
                println!();
                print_summary(index, summary);
            }
        }
    }

    Ok(())
}

fn print_summary(index: usize, summary: &PresentationSummary) {
    println!("{} {}", format!("Presentation {index}").bright_blue().bold(), summary.root_uri);
    if let Some(language) = &summary.language {
        println!("   Language: {language}");
    }
    println!("   Nodes: {} (depth {})", summary.node_count, summary.depth);

    if !summary.channels.is_empty() {
        println!("   Channels:");
        for channel in &summary.channels {
            println!(
                "     {} {:?}{} - {} media",
                channel.name.bright_white(),
                channel.kind,
                channel
                    .language
                    .as_deref()
                    .map(|l| format!(" [{l}]"))
                    .unwrap_or_default(),
                channel.media_count
            );
        }
    }

    for (name, count) in &summary.media_counts {
        println!("   {name}: {count}");
    }

    if !summary.metadata.is_empty() {
        println!("   Metadata:");
        for metadata in &summary.metadata {
            println!("     {} = {}", metadata.name().bright_white(), metadata.content());
        }
    }

    println!(
        "   Media data: {}  Data providers: {}",
        summary.media_data_count, summary.data_provider_count
    );
}
