use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Command line and environment settings for the web server.
#[derive(Clone, Debug, Parser)]
#[command(name = "website", version, about = "Assets audit management system")]
pub struct Config {
    /// Spreadsheet holding the asset register
    #[arg(long, env = "ASSETS_FILE", default_value = "assets.xlsx")]
    pub data_file: PathBuf,

    /// Address to listen on
    #[arg(long, env = "ASSETS_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,
}
