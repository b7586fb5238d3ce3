//! Application entrypoint and state wiring.

use clap::Parser;
use hashledger::{router, telemetry, AppState, Config, Ledger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    telemetry::init(config.log_json);

    let ledger = Ledger::new();
    tracing::info!(genesis = %ledger.chain().latest().link, "ledger initialized");

    let app = router(AppState::new(ledger));

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
