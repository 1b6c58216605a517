use serde::{Deserialize, Serialize};

/// Connection and enumeration settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Discover only the catalogued services instead of the whole GATT table.
    pub restrict_service_discovery: bool,
    /// Issue a read right after every toggle write.
    pub read_back_after_write: bool,
    /// Treat a link loss reported by the platform like an explicit disconnect.
    pub clear_on_link_loss: bool,
    /// Subscribe to every notify/indicate characteristic as it is discovered.
    pub subscribe_notifications: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            restrict_service_discovery: true,
            read_back_after_write: true,
            clear_on_link_loss: false,
            subscribe_notifications: false,
        }
    }
}
