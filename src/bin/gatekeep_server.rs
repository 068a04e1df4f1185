//! gatekeep gRPC server
//!
//! Runs the ACL-gated Biz and Admin services until Ctrl+C.

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

use gatekeep::config::{Command, ServerConfig, USAGE};
use gatekeep::service::Gatekeeper;
use gatekeep::telemetry::init_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match ServerConfig::from_env() {
        Ok(Command::Run(config)) => config,
        Ok(Command::Help) => {
            println!("{USAGE}");
            return Ok(());
        }
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!();
            eprintln!("{USAGE}");
            std::process::exit(1);
        }
    };

    init_tracing(&config.log_level)?;
    info!(version = env!("CARGO_PKG_VERSION"), "gatekeep server starting");

    let gatekeeper = Gatekeeper::bind(&config.listen_addr, &config.acl_json).await?;
    let token = CancellationToken::new();
    let handle = gatekeeper.spawn(token.clone());

    let _ = signal::ctrl_c().await;
    token.cancel();
    handle.await?;

    info!("shut down");
    Ok(())
}
