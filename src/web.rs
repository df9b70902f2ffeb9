use assets_audit::app;
use assets_audit::config::Config;
use clap::Parser;

/// Main entry point for the web application
///
/// Reads settings from the command line and environment, initialises
/// logging (`RUST_LOG`, default `info`) and serves the audit pages until
/// the process is stopped.
///
/// # Returns
/// * `Result<(), Box<dyn std::error::Error>>` - Success or error object
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();

    app::run(config).await
}
