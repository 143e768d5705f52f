use std::process::ExitCode;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use chess_hub::collab::Collaborators;
use chess_hub::config::HubConfig;
use chess_hub::hub::Hub;
use chess_hub::rules::Rules;

#[tokio::main]
async fn main() -> ExitCode {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();

    let cancel = CancellationToken::new();
    let hub = match Hub::new(
        HubConfig::default(),
        Rules::shared(),
        Collaborators::in_memory(),
        cancel.clone(),
    ) {
        Ok(hub) => hub,
        Err(err) => {
            error!(error = %err, "failed to build hub");
            return ExitCode::FAILURE;
        }
    };

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received");
            }
            cancel.cancel();
        }
    });

    info!("chess hub starting");
    match hub.run_supervised().await {
        Ok(()) => {
            info!("chess hub stopped");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "chess hub failed");
            ExitCode::FAILURE
        }
    }
}
