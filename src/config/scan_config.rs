use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::bluetooth::constants::{DEFAULT_RESCAN_INTERVAL_MS, LIGHT_PRODUCT_NAMES};

/// Scan settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Advertised names accepted into the device list. Empty accepts every device.
    pub allowed_devices: Vec<String>,
    /// Interval of the forced stop/start of discovery, in milliseconds.
    pub rescan_interval_ms: u64,
    /// Services a peripheral must advertise to be reported. Empty means no filter.
    pub service_filter: Vec<Uuid>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            allowed_devices: LIGHT_PRODUCT_NAMES.iter().map(|name| name.to_string()).collect(),
            rescan_interval_ms: DEFAULT_RESCAN_INTERVAL_MS,
            service_filter: Vec::new(),
        }
    }
}

impl ScanConfig {
    pub fn is_allowed(&self, name: &str) -> bool {
        self.allowed_devices.is_empty() || self.allowed_devices.iter().any(|allowed| allowed == name)
    }

    /// Rescan period. A zero interval falls back to the default.
    pub fn rescan_interval(&self) -> Duration {
        if self.rescan_interval_ms == 0 {
            warn!(
                "rescan_interval_ms is 0, using {} ms instead",
                DEFAULT_RESCAN_INTERVAL_MS
            );
            return Duration::from_millis(DEFAULT_RESCAN_INTERVAL_MS);
        }
        Duration::from_millis(self.rescan_interval_ms)
    }
}
