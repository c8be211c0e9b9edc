use anyhow::Result;
use clap::Parser;

use promptgate::{cli::Cli, config, logging, run};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = config::resolve_config_path(&cli)?;
    let config = config::load(&config_path)?;
    logging::init_logger(config.log)?;
    run(config).await
}
