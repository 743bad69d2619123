//! site-archiver CLI
//!
//! Archives pages into `<root>/assets/sites`, lists and deletes archives, and
//! rewrites `+https://...` tokens in text read from stdin.

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use site_archiver::{ArchiveConfig, ArchiveRequest, Archiver, process_archive_links};

/// Save web pages as single self-contained HTML files
#[derive(Parser, Debug)]
#[command(name = "site-archiver", version, about)]
struct Cli {
    /// Project root; archives go under <root>/assets/sites
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Give up on a page after this many seconds
    #[arg(long)]
    deadline: Option<u64>,

    /// Download identical sub-resource URLs once per page
    #[arg(long)]
    dedupe: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Archive a single page
    Archive {
        /// Page URL (http or https)
        url: String,
    },

    /// List stored archives, newest first
    List {
        /// Print JSON instead of one line per archive
        #[arg(long)]
        json: bool,
    },

    /// Delete a stored archive by filename
    Delete { filename: String },

    /// Archive every +https://... token in text read from stdin
    Links,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = ArchiveConfig::builder()
        .dedupe_fetches(cli.dedupe)
        .project_root(&cli.root)
        .build()
        .context("invalid configuration")?;
    log::debug!("Archiving into {}", config.sites_path().display());

    let archiver = Archiver::new(config).context("failed to create HTTP client")?;

    match cli.command {
        Command::Archive { url } => {
            let request = ArchiveRequest::new(url);
            let result = match cli.deadline {
                Some(secs) => {
                    archiver
                        .archive_with_deadline(&request, Duration::from_secs(secs))
                        .await
                }
                None => archiver.archive(&request).await,
            }?;
            println!("{}", result.path);
        }
        Command::List { json } => {
            let entries = archiver.registry().list().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in entries {
                    println!(
                        "{}\t{}\t{}\t{}",
                        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        entry.filename,
                        entry.title,
                        entry.source_url
                    );
                }
            }
        }
        Command::Delete { filename } => {
            archiver.registry().delete(&filename).await?;
            log::info!("Removed {filename}");
        }
        Command::Links => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            let report = process_archive_links(&text, &archiver).await;
            for (token, error) in &report.failed {
                log::warn!("Left {token} unchanged: {error}");
            }
            print!("{}", report.text);
        }
    }

    Ok(())
}
