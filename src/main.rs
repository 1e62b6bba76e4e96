use clap::Parser;

use sheetx::app;
use sheetx::config::ServerConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();

    // Start the web application
    app::run(config).await?;

    Ok(())
}
