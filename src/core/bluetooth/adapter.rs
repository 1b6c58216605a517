//! Tracks the radio's power state and gates scanning on it.

use log::{info, warn};

use crate::core::bluetooth::store::StateStore;
use crate::core::bluetooth::types::PowerState;

/// What the session must do after a power state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    None,
    /// Radio came up with the session idle.
    StartScan,
    /// Radio went away: stop scanning and drop the connection.
    PowerDown,
}

#[derive(Debug, Default)]
pub struct AdapterMonitor {
    state: PowerState,
}

impl AdapterMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    pub fn on_power_state(&mut self, store: &mut StateStore, state: PowerState) -> PowerAction {
        if state != self.state {
            info!("Bluetooth radio state: {:?}", state);
        }
        self.state = state;

        if state.is_powered_on() {
            store.set_powered(true);
            // never auto-start while a connection holds the radio
            if store.scanning() || store.connection().is_engaged() {
                return PowerAction::None;
            }
            return PowerAction::StartScan;
        }

        if store.powered() {
            warn!("Bluetooth radio is not available ({:?})", state);
        }
        store.set_powered(false);
        PowerAction::PowerDown
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::connection::ConnectionState;
    use crate::core::bluetooth::types::PeripheralId;

    #[test]
    fn test_power_on_starts_scan_only_when_idle() {
        let mut monitor = AdapterMonitor::new();
        let mut store = StateStore::new();

        assert_eq!(monitor.on_power_state(&mut store, PowerState::PoweredOn), PowerAction::StartScan);
        assert!(store.powered());

        store.set_scanning(true);
        assert_eq!(monitor.on_power_state(&mut store, PowerState::PoweredOn), PowerAction::None);

        store.set_scanning(false);
        store.set_connection(ConnectionState::Connected(PeripheralId::from("x")));
        assert_eq!(monitor.on_power_state(&mut store, PowerState::PoweredOn), PowerAction::None);

        store.set_connection(ConnectionState::Connecting(PeripheralId::from("x")));
        assert_eq!(monitor.on_power_state(&mut store, PowerState::PoweredOn), PowerAction::None);
    }

    #[test]
    fn test_every_other_state_powers_down() {
        for state in [
            PowerState::Unknown,
            PowerState::Resetting,
            PowerState::Unsupported,
            PowerState::Unauthorized,
            PowerState::PoweredOff,
        ] {
            let mut monitor = AdapterMonitor::new();
            let mut store = StateStore::new();
            store.set_powered(true);
            assert_eq!(monitor.on_power_state(&mut store, state), PowerAction::PowerDown);
            assert!(!store.powered());
            assert_eq!(monitor.state(), state);
        }
    }
}
