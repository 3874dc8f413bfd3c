use log::error;
use tokio::sync::broadcast;

#[tokio::main]
async fn main() {
    let (shutdown_tx, _) = broadcast::channel(1);

    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        let _ = shutdown_tx_clone.send(());
    });

    if let Err(err) = solarflow_bridge::app(shutdown_tx.subscribe()).await {
        // logging may not be up yet if the config failed to load
        eprintln!("solarflow-bridge: {:#}", err);
        error!("{:#}", err);
        std::process::exit(255);
    }
}
