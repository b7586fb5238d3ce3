//! Process configuration from command-line flags and environment.

use std::net::SocketAddr;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "hashledger")]
#[command(about = "Hash-linked ledger with authorized transfers", long_about = None)]
pub struct Config {
    /// Address the HTTP server listens on
    #[arg(long, env = "HASHLEDGER_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Emit logs as JSON lines (filter with RUST_LOG)
    #[arg(long, env = "HASHLEDGER_LOG_JSON")]
    pub log_json: bool,
}
