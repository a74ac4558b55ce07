use anyhow::Result;
use clap::Parser;
use susenas_monitor::cli;
use tracing::error;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = cli::Args::parse();
    if let Err(err) = cli::dispatch(args) {
        error!("{:#}", err);
        std::process::exit(1);
    }
    Ok(())
}
