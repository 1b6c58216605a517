//! Bluetooth connection handling for the lighting modules
//! Owns the single connection slot and reacts to the platform's connection
//! lifecycle events. The slot only reaches `Connected` once the platform
//! confirms the link.

use log::{error, info, warn};
use serde::Serialize;

use crate::config::connection_config::ConnectionConfig;
use crate::core::bluetooth::catalog::known_entities;
use crate::core::bluetooth::platform::BlePlatform;
use crate::core::bluetooth::store::StateStore;
use crate::core::bluetooth::topology::TopologyEnumerator;
use crate::core::bluetooth::types::PeripheralId;
use crate::error::BleError;

/// State of the single connection slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "peripheral")]
pub enum ConnectionState {
    Disconnected,
    Connecting(PeripheralId),
    Connected(PeripheralId),
    /// Last attempt failed. The slot is free again.
    Failed {
        peripheral: PeripheralId,
        reason: String,
    },
}

impl ConnectionState {
    /// The peripheral occupying the slot, if any. A failed attempt occupies nothing.
    pub fn peripheral(&self) -> Option<&PeripheralId> {
        match self {
            ConnectionState::Connecting(id) | ConnectionState::Connected(id) => Some(id),
            ConnectionState::Disconnected | ConnectionState::Failed { .. } => None,
        }
    }

    /// True while connecting or connected.
    pub fn is_engaged(&self) -> bool {
        self.peripheral().is_some()
    }

    pub fn is_active(&self, id: &PeripheralId) -> bool {
        self.peripheral() == Some(id)
    }
}

/// Connection manager for the lighting modules
pub struct ConnectionManager {
    config: ConnectionConfig,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Checks the preconditions of a connect request without touching anything.
    pub fn ensure_can_connect(&self, store: &StateStore, target: &PeripheralId) -> Result<(), BleError> {
        if !store.powered() {
            return Err(BleError::AdapterUnavailable);
        }
        if let Some(active) = store.active_peripheral() {
            return Err(BleError::AlreadyConnected(active.clone()));
        }
        if store.peripheral(target).is_none() {
            return Err(BleError::UnknownPeripheral(target.clone()));
        }
        Ok(())
    }

    /// Claims the slot for `target` and issues the platform connect request.
    pub fn connect(
        &self,
        store: &mut StateStore,
        platform: &dyn BlePlatform,
        target: &PeripheralId,
    ) -> Result<(), BleError> {
        self.ensure_can_connect(store, target)?;

        info!("Connecting to {}...", target);
        store.set_connection(ConnectionState::Connecting(target.clone()));
        platform.connect(target);
        Ok(())
    }

    /// Binds the confirmed link to the slot. Returns the enumerator that will
    /// receive the peripheral's events from now on.
    pub fn on_connected(
        &self,
        store: &mut StateStore,
        platform: &dyn BlePlatform,
        peripheral: PeripheralId,
    ) -> Option<TopologyEnumerator> {
        match store.connection() {
            ConnectionState::Connecting(target) if *target == peripheral => {}
            ConnectionState::Connected(current) if *current == peripheral => {
                warn!("Duplicate connected event for {}", peripheral);
                return None;
            }
            _ => {
                warn!("Unexpected connection to {}, cancelling it", peripheral);
                platform.cancel_connection(&peripheral);
                return None;
            }
        }

        info!("Connected to {}", peripheral);
        store.set_connection(ConnectionState::Connected(peripheral.clone()));

        let service_filter = if self.config.restrict_service_discovery {
            known_entities().known_service_uuids()
        } else {
            Vec::new()
        };
        let enumerator = TopologyEnumerator::new(
            peripheral,
            service_filter,
            self.config.subscribe_notifications,
        );
        enumerator.begin(platform);
        Some(enumerator)
    }

    /// The attempted connection is discarded and the slot freed.
    pub fn on_connect_failed(&self, store: &mut StateStore, peripheral: PeripheralId, reason: String) {
        error!("Failed to connect to {}: {}", peripheral, reason);
        if !matches!(store.connection(), ConnectionState::Connecting(target) if *target == peripheral) {
            warn!("Ignoring connect failure for {}, not the pending connection", peripheral);
            return;
        }
        store.set_connection(ConnectionState::Failed { peripheral, reason });
    }

    /// Cancels the connection, if any, and drops the discovered topology.
    /// Safe to call when nothing is connected.
    pub fn disconnect(&self, store: &mut StateStore, platform: &dyn BlePlatform) {
        match store.active_peripheral().cloned() {
            Some(peripheral) => {
                info!("Disconnecting from {}", peripheral);
                platform.cancel_connection(&peripheral);
            }
            None => info!("No peripheral connected"),
        }
        if store.connection().is_engaged() {
            store.set_connection(ConnectionState::Disconnected);
        }
        store.clear_topology();
    }

    /// Observes a platform-reported disconnect. Returns true when the session
    /// state was cleaned up as a result, which only happens for a lost link to
    /// the active peripheral with `clear_on_link_loss` set.
    pub fn on_disconnected(
        &self,
        store: &mut StateStore,
        peripheral: PeripheralId,
        reason: Option<String>,
    ) -> bool {
        match &reason {
            Some(reason) => warn!("Disconnected from {}: {}", peripheral, reason),
            None => info!("Disconnected from {}", peripheral),
        }

        if !self.config.clear_on_link_loss || !store.connection().is_active(&peripheral) {
            return false;
        }

        info!("Link to {} lost, clearing session state", peripheral);
        store.set_connection(ConnectionState::Disconnected);
        store.clear_topology();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::mock::{MockPlatform, PlatformCall};
    use crate::core::bluetooth::types::{AdvertisementFields, PeripheralRecord, ServiceHandle, ServiceRecord};

    fn powered_store_with(id: &str) -> StateStore {
        let mut store = StateStore::new();
        store.set_powered(true);
        store.record_sighting(PeripheralRecord {
            id: PeripheralId::from(id),
            name: "AVEO-ZTVL".to_string(),
            address: None,
            rssi: -60,
            advertisement: AdvertisementFields::default(),
        });
        store
    }

    #[test]
    fn test_connected_only_after_confirmation() {
        let platform = MockPlatform::new();
        let manager = ConnectionManager::new(ConnectionConfig::default());
        let mut store = powered_store_with("x");
        let x = PeripheralId::from("x");

        manager.connect(&mut store, &platform, &x).unwrap();
        assert_eq!(store.connection(), &ConnectionState::Connecting(x.clone()));
        assert!(!store.connected());
        assert_eq!(store.active_peripheral(), Some(&x));

        let enumerator = manager.on_connected(&mut store, &platform, x.clone());
        assert!(enumerator.is_some());
        assert!(store.connected());

        let calls = platform.take_calls();
        assert_eq!(calls[0], PlatformCall::Connect(x.clone()));
        match &calls[1] {
            PlatformCall::DiscoverServices { peripheral, filter } => {
                assert_eq!(peripheral, &x);
                assert!(!filter.is_empty());
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[test]
    fn test_second_connect_is_rejected() {
        let platform = MockPlatform::new();
        let manager = ConnectionManager::new(ConnectionConfig::default());
        let mut store = powered_store_with("x");
        let x = PeripheralId::from("x");

        manager.connect(&mut store, &platform, &x).unwrap();
        assert_eq!(
            manager.connect(&mut store, &platform, &x),
            Err(BleError::AlreadyConnected(x.clone()))
        );
        assert_eq!(platform.calls().len(), 1);
    }

    #[test]
    fn test_connect_preconditions() {
        let platform = MockPlatform::new();
        let manager = ConnectionManager::new(ConnectionConfig::default());
        let mut store = powered_store_with("x");

        let y = PeripheralId::from("y");
        assert_eq!(
            manager.connect(&mut store, &platform, &y),
            Err(BleError::UnknownPeripheral(y))
        );

        store.set_powered(false);
        assert_eq!(
            manager.connect(&mut store, &platform, &PeripheralId::from("x")),
            Err(BleError::AdapterUnavailable)
        );
        assert!(platform.calls().is_empty());
    }

    #[test]
    fn test_connect_failure_frees_the_slot() {
        let platform = MockPlatform::new();
        let manager = ConnectionManager::new(ConnectionConfig::default());
        let mut store = powered_store_with("x");
        let x = PeripheralId::from("x");

        manager.connect(&mut store, &platform, &x).unwrap();
        manager.on_connect_failed(&mut store, x.clone(), "timeout".to_string());

        assert!(!store.connected());
        assert_eq!(store.active_peripheral(), None);
        assert_eq!(
            store.connection(),
            &ConnectionState::Failed {
                peripheral: x.clone(),
                reason: "timeout".to_string()
            }
        );
        // the slot can be claimed again
        assert!(manager.connect(&mut store, &platform, &x).is_ok());
    }

    #[test]
    fn test_disconnect_clears_topology_and_is_idempotent() {
        let platform = MockPlatform::new();
        let manager = ConnectionManager::new(ConnectionConfig::default());
        let mut store = powered_store_with("x");
        let x = PeripheralId::from("x");

        manager.connect(&mut store, &platform, &x).unwrap();
        manager.on_connected(&mut store, &platform, x.clone());
        store.push_service(ServiceRecord {
            handle: ServiceHandle(1),
            uuid: crate::core::bluetooth::constants::UUID_DEVICE_INFORMATION_SERVICE,
            peripheral: x.clone(),
            name: "Device Information".to_string(),
        });
        platform.take_calls();

        manager.disconnect(&mut store, &platform);
        assert!(!store.connected());
        assert!(store.services().is_empty());
        assert!(store.characteristics().is_empty());
        assert_eq!(platform.take_calls(), vec![PlatformCall::CancelConnection(x)]);

        manager.disconnect(&mut store, &platform);
        assert!(platform.calls().is_empty());
        assert_eq!(store.connection(), &ConnectionState::Disconnected);
    }

    #[test]
    fn test_unexpected_connection_is_cancelled() {
        let platform = MockPlatform::new();
        let manager = ConnectionManager::new(ConnectionConfig::default());
        let mut store = powered_store_with("x");
        let z = PeripheralId::from("z");

        assert!(manager.on_connected(&mut store, &platform, z.clone()).is_none());
        assert_eq!(platform.calls(), vec![PlatformCall::CancelConnection(z)]);
        assert_eq!(store.connection(), &ConnectionState::Disconnected);
    }

    #[test]
    fn test_link_loss_is_a_notification_unless_configured() {
        let platform = MockPlatform::new();
        let x = PeripheralId::from("x");

        let manager = ConnectionManager::new(ConnectionConfig::default());
        let mut store = powered_store_with("x");
        manager.connect(&mut store, &platform, &x).unwrap();
        manager.on_connected(&mut store, &platform, x.clone());
        assert!(!manager.on_disconnected(&mut store, x.clone(), Some("link lost".to_string())));
        assert!(store.connected());

        let manager = ConnectionManager::new(ConnectionConfig {
            clear_on_link_loss: true,
            ..ConnectionConfig::default()
        });
        assert!(!manager.on_disconnected(&mut store, PeripheralId::from("other"), None));
        assert!(manager.on_disconnected(&mut store, x, Some("link lost".to_string())));
        assert!(!store.connected());
    }
}
