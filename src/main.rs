use std::env;
use std::path::PathBuf;

use anyhow::Result;
use lightlink_ble_lib::config::CONFIG_FILE_NAME;
use lightlink_ble_lib::state::AppState;
use lightlink_ble_lib::{LightingSession, SessionSnapshot, setup_logging};
use log::{error, info, warn};

/// Path of the config file, overridable through `LIGHTLINK_CONFIG`.
fn config_path() -> PathBuf {
    env::var_os("LIGHTLINK_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

fn log_snapshot(snapshot: &SessionSnapshot) {
    info!(
        "powered: {}, scanning: {}, connection: {:?}, profile: {:?}",
        snapshot.powered, snapshot.scanning, snapshot.connection, snapshot.profile
    );
    for peripheral in &snapshot.peripherals {
        info!("{} ({} dBm)\n{}", peripheral.name, peripheral.rssi, peripheral.summary());
    }
    for characteristic in &snapshot.characteristics {
        info!(
            "{} {} = {:?} {}",
            characteristic.name, characteristic.capabilities, characteristic.read_value, characteristic.description
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging(log::Level::Info);

    let state = AppState::new(&config_path()).await?;
    let session = state.session();
    // connect to the first peripheral advertising this name, if set
    let auto_connect = env::var("LIGHTLINK_CONNECT").ok();

    let mut snapshots = session.watch();
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    warn!("Session ended unexpectedly");
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                log_snapshot(&snapshot);

                if snapshot.active_peripheral.is_some() {
                    continue;
                }
                let target = auto_connect.as_deref().and_then(|name| {
                    snapshot.peripherals.iter().find(|p| p.name == name)
                });
                if let Some(target) = target {
                    if let Err(e) = session.connect(target.id.clone()).await {
                        error!("Failed to connect to {}: {}", target.name, e);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    state.shutdown().await
}
