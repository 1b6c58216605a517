//! LightLink BLE library
//! Central-role session core for discovering, connecting to and controlling
//! aircraft lighting modules over Bluetooth Low Energy.

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod state;
pub mod utils;

pub use config::AppConfig;
pub use crate::core::bluetooth::{
    LightingSession, SessionCommand, SessionHandle, SessionSnapshot, StoreChange,
};
pub use error::BleError;

/// Installs the session logger, falling back to env_logger if another
/// logger is already in place.
pub fn setup_logging(level: log::Level) {
    if logging::SessionLogger::init(level).is_err() {
        let _ = env_logger::builder()
            .filter_level(level.to_level_filter())
            .try_init();
    }
    log::info!("Logging initialized");
}
