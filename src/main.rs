// src/main.rs

use clap::Parser;
use env_logger::Builder;
use eyre::{Result, WrapErr};
use log::{debug, error, LevelFilter};

use gmail_headline::cfg::load_config;
use gmail_headline::cli::Cli;
use gmail_headline::triage;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = Builder::new();
    builder.filter_level(if cli.debug { LevelFilter::Debug } else { LevelFilter::Info });
    builder.parse_default_env().try_init().ok();

    debug!("{:?}", cli);

    let mut config = load_config(&cli.config).wrap_err("loading configuration")?;
    config.apply_cli(&cli);
    config.validate().wrap_err("validating configuration")?;

    match triage::run(&config) {
        Ok(_) => Ok(()),
        Err(e) => {
            error!("{}", e);
            Err(e).wrap_err("gmail-headline run aborted")
        }
    }
}
