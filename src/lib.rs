pub mod bridge;
pub mod channels;
pub mod command;
pub mod config;
pub mod control_loop;
pub mod controller;
pub mod coordinator;
pub mod error;
pub mod home_assistant;
pub mod item;
pub mod mqtt;
pub mod options;
pub mod prelude;
pub mod property;
pub mod scheduler;
pub mod state_cache;

const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::mqtt::Mqtt;
use crate::prelude::*;

fn init_logging(level: &str) {
    let result = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .try_init();

    if let Err(e) = result {
        eprintln!("failed to initialise logging: {}", e);
    }
}

/// Main application entry point.
///
/// Runs until `shutdown` fires (or the optional runtime limit passes), then unsubscribes
/// everything and disconnects from the broker.
pub async fn app(mut shutdown: broadcast::Receiver<()>) -> Result<()> {
    let options = Options::new();

    let config = Config::new(options.config_file.clone())?;
    init_logging(config.loglevel());

    info!(
        "solarflow-bridge {} starting with config file: {}",
        CARGO_PKG_VERSION, options.config_file
    );
    config.log_summary();

    let channels = Channels::new();
    // must exist before the coordinator sends anything
    let outbound = channels.to_mqtt.subscribe();

    let mut coordinator = Coordinator::new(config.clone(), channels.clone())?;

    let mqtt = Mqtt::new(config, channels.clone());
    let mqtt_clone = mqtt.clone();
    let mqtt_handle = tokio::spawn(async move {
        if let Err(e) = mqtt_clone.start(outbound).await {
            error!("MQTT task failed: {}", e);
        }
    });

    let (stop_tx, stop_rx) = broadcast::channel(1);
    let coordinator_handle = tokio::spawn(async move {
        if let Err(e) = coordinator.start(stop_rx).await {
            error!("Coordinator task failed: {}", e);
        }
    });

    match options.runtime {
        Some(secs) => {
            tokio::select! {
                _ = shutdown.recv() => {}
                _ = tokio::time::sleep(std::time::Duration::from_secs(secs)) => {
                    info!("runtime limit of {}s reached", secs);
                }
            }
        }
        None => {
            let _ = shutdown.recv().await;
        }
    }

    info!("Shutdown signal received, stopping components...");
    let _ = stop_tx.send(());

    if let Err(e) = coordinator_handle.await {
        error!("Error waiting for coordinator task: {}", e);
    }

    mqtt.stop();
    if let Err(e) = mqtt_handle.await {
        error!("Error waiting for mqtt task: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}
