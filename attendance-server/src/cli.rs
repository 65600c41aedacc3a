use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Runs the attendance pipeline and its thin HTTP surface for one deployment
/// (one or more cameras, one backend/ERP endpoint). See `braid-run`'s
/// `BraidRunCliArgs` for the shape this mirrors.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct ServerCliArgs {
    /// Path to the TOML config file (see `attendance_config::Config`).
    pub config_file: PathBuf,

    /// Address the HTTP/WebSocket surface binds to.
    #[arg(long, default_value = "0.0.0.0:8085")]
    pub bind_addr: SocketAddr,
}
