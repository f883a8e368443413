//! tetl - Twitter archive ETL: extract posts, rebuild threads, pair replies with their parents.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tetl::{install_interrupt_handler, init_tracing_once, BranchPolicy, CancelToken, Credentials, Tetl, TwitterClient};

/// Exit status of a run stopped by Ctrl-C.
const EXIT_CANCELLED: i32 = 130;

#[derive(Parser)]
#[command(name = "tetl")]
#[command(about = "Streaming ETL for Twitter/X data archives")]
#[command(version)]
struct Cli {
    /// Unzipped archive data folder (holds tweets.js)
    #[arg(long, global = true, default_value = "twitter/data")]
    archive_dir: PathBuf,
    /// Folder for every output table
    #[arg(long, global = true, default_value = "output")]
    output_dir: PathBuf,
    /// Hide progress bars
    #[arg(long, global = true)]
    no_progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract archived posts into posts.tsv
    Extract,

    /// Rebuild reply chains from posts.tsv into threads.tsv
    Threads {
        /// Give every losing sibling reply its own thread
        #[arg(long)]
        split_branches: bool,
        /// Text separator between joined posts
        #[arg(long, default_value = " | ")]
        separator: String,
    },

    /// Fetch the parent of every reply to someone else and write qa.tsv
    Qa {
        /// Resume: skip this many candidate replies and append to qa.tsv
        #[arg(long, default_value_t = 0)]
        skip: usize,
        /// Delay before each remote call, in milliseconds
        #[arg(long, default_value_t = 100)]
        pacing_ms: u64,
    },

    /// Delete every post listed in posts_to_delete.tsv
    Delete {
        /// Id table (single column named "id")
        #[arg(long)]
        ids: Option<PathBuf>,
        /// Delay before each remote call, in milliseconds
        #[arg(long, default_value_t = 100)]
        pacing_ms: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing_once();

    let cancel = CancelToken::new();
    if let Err(e) = install_interrupt_handler(&cancel, true) {
        tracing::warn!("could not install Ctrl-C handler: {e}");
    }

    let base = Tetl::new()
        .archive_dir(&cli.archive_dir)
        .output_dir(&cli.output_dir)
        .progress(!cli.no_progress);

    let cancelled = match cli.command {
        Commands::Extract => {
            let summary = base.extract_archive(&cancel)?;
            println!("Extracted {} posts from {} file(s)", summary.records, summary.parts);
            summary.cancelled
        }
        Commands::Threads { split_branches, separator } => {
            let policy = if split_branches { BranchPolicy::SplitBranches } else { BranchPolicy::FirstWins };
            let report = base.branch_policy(policy).thread_separator(separator).build_threads(&cancel)?;
            println!(
                "{} threads, {} single posts, {} posts remaining",
                report.threads.len(),
                report.singletons.len(),
                report.orphans.len()
            );
            report.cancelled
        }
        Commands::Qa { skip, pacing_ms } => {
            let creds = Credentials::from_env()?;
            let client = TwitterClient::new(&creds)?.with_cancel(cancel.clone());
            let summary = base
                .qa_skip(skip)
                .pacing(Duration::from_millis(pacing_ms))
                .build_qa_pairs(&client, &cancel)?;
            println!(
                "{} pairs written, {} failed, {} of {} candidates looked up",
                summary.written, summary.failed, summary.processed, summary.candidates
            );
            summary.cancelled
        }
        Commands::Delete { ids, pacing_ms } => {
            let creds = Credentials::from_env()?;
            let client = TwitterClient::new(&creds)?.with_cancel(cancel.clone());
            let mut etl = base.pacing(Duration::from_millis(pacing_ms));
            if let Some(ids) = ids {
                etl = etl.delete_ids_path(ids);
            }
            let summary = etl.delete_posts(&client, &cancel)?;
            println!("{} deleted, {} failed", summary.deleted, summary.failed);
            summary.cancelled
        }
    };

    if cancelled {
        eprintln!("Cancelled.");
        std::process::exit(EXIT_CANCELLED);
    }
    Ok(())
}
