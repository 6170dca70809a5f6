// src/cli.rs

use clap::Parser;
use std::path::PathBuf;

/// Command-line interface options for gmail-headline.
#[derive(Parser, Debug)]
#[command(
    name = "gmail-headline",
    version = env!("GIT_DESCRIBE"),
    about = "Export Gmail message headlines, mark them read, and prune old mail",
    long_about = None
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "gmail-headline.yml", env = "GMAIL_HEADLINE_CONFIG")]
    pub config: PathBuf,

    /// OAuth2 client secret file (Google Cloud Console JSON)
    #[arg(short = 'C', long, env = "GMAIL_HEADLINE_CREDENTIALS_FILE")]
    pub credentials_file: Option<PathBuf>,

    /// Cached OAuth2 token file
    #[arg(short = 'T', long, env = "GMAIL_HEADLINE_TOKEN_FILE")]
    pub token_file: Option<PathBuf>,

    /// Append-only JSON-lines output file
    #[arg(short, long, env = "GMAIL_HEADLINE_OUTPUT_FILE")]
    pub output_file: Option<PathBuf>,

    /// Maximum messages exported per run
    #[arg(short, long, env = "GMAIL_HEADLINE_LIMIT")]
    pub limit: Option<usize>,

    #[arg(short = 'n', long, help = "export only; log mark-read and delete batches instead of sending them")]
    pub dry_run: bool,

    #[arg(short, long, help = "turn on debug logging")]
    pub debug: bool,
}
