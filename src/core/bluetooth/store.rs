//! Session state store
//! The single mutable model of the session. Only the processing context
//! mutates it; every mutation is announced on a broadcast channel so that
//! observers learn what changed instead of redrawing everything.

use std::collections::HashMap;

use log::debug;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::core::bluetooth::catalog::DeviceProfile;
use crate::core::bluetooth::connection::ConnectionState;
use crate::core::bluetooth::types::*;

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// A single observable mutation of the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StoreChange {
    PoweredChanged(bool),
    ScanningChanged(bool),
    ConnectionChanged(ConnectionState),
    PeripheralsCleared,
    PeripheralAdded(PeripheralId),
    PeripheralUpdated(PeripheralId),
    ServiceAdded(ServiceHandle),
    CharacteristicAdded(CharacteristicHandle),
    CharacteristicUpdated(CharacteristicHandle),
    TopologyCleared,
    ProfileChanged(DeviceProfile),
}

/// Point-in-time copy of the store handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub powered: bool,
    pub scanning: bool,
    pub connected: bool,
    pub connection: ConnectionState,
    pub active_peripheral: Option<PeripheralId>,
    pub peripherals: Vec<PeripheralRecord>,
    pub services: Vec<ServiceRecord>,
    pub characteristics: Vec<CharacteristicRecord>,
    pub profile: DeviceProfile,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            powered: false,
            scanning: false,
            connected: false,
            connection: ConnectionState::Disconnected,
            active_peripheral: None,
            peripherals: Vec::new(),
            services: Vec::new(),
            characteristics: Vec::new(),
            profile: DeviceProfile::Generic,
        }
    }
}

/// Outcome of recording an advertisement sighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sighting {
    New,
    Updated,
}

pub struct StateStore {
    powered: bool,
    scanning: bool,
    connection: ConnectionState,
    peripherals: Vec<PeripheralRecord>,
    /// Position of each identity in `peripherals`, one entry per identity
    peripheral_index: HashMap<PeripheralId, usize>,
    services: Vec<ServiceRecord>,
    characteristics: Vec<CharacteristicRecord>,
    profile: DeviceProfile,
    changes: broadcast::Sender<StoreChange>,
    dirty: bool,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            powered: false,
            scanning: false,
            connection: ConnectionState::Disconnected,
            peripherals: Vec::new(),
            peripheral_index: HashMap::new(),
            services: Vec::new(),
            characteristics: Vec::new(),
            profile: DeviceProfile::Generic,
            changes,
            dirty: false,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    pub fn change_sender(&self) -> broadcast::Sender<StoreChange> {
        self.changes.clone()
    }

    fn publish(&mut self, change: StoreChange) {
        debug!("Store change: {:?}", change);
        self.dirty = true;
        // no receivers is fine, the presentation layer may not be listening yet
        let _ = self.changes.send(change);
    }

    /// Returns whether anything changed since the last call, and resets the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn powered(&self) -> bool {
        self.powered
    }

    pub fn set_powered(&mut self, powered: bool) {
        if self.powered != powered {
            self.powered = powered;
            self.publish(StoreChange::PoweredChanged(powered));
        }
    }

    pub fn scanning(&self) -> bool {
        self.scanning
    }

    pub fn set_scanning(&mut self, scanning: bool) {
        if self.scanning != scanning {
            self.scanning = scanning;
            self.publish(StoreChange::ScanningChanged(scanning));
        }
    }

    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    pub fn set_connection(&mut self, connection: ConnectionState) {
        if self.connection != connection {
            self.connection = connection.clone();
            self.publish(StoreChange::ConnectionChanged(connection));
        }
    }

    /// True only once the platform has confirmed the link.
    pub fn connected(&self) -> bool {
        matches!(self.connection, ConnectionState::Connected(_))
    }

    pub fn active_peripheral(&self) -> Option<&PeripheralId> {
        self.connection.peripheral()
    }

    pub fn peripherals(&self) -> &[PeripheralRecord] {
        &self.peripherals
    }

    pub fn peripheral(&self, id: &PeripheralId) -> Option<&PeripheralRecord> {
        self.peripheral_index.get(id).map(|&index| &self.peripherals[index])
    }

    /// Peripherals whose name contains `query`, ignoring case. An empty query matches all.
    pub fn peripherals_matching(&self, query: &str) -> Vec<&PeripheralRecord> {
        let query = query.trim().to_lowercase();
        self.peripherals
            .iter()
            .filter(|p| query.is_empty() || p.name.to_lowercase().contains(&query))
            .collect()
    }

    pub fn clear_peripherals(&mut self) {
        self.peripherals.clear();
        self.peripheral_index.clear();
        self.publish(StoreChange::PeripheralsCleared);
    }

    /// Records a sighting: appends on first sight, otherwise refreshes the
    /// advertisement payload and signal strength in place.
    pub fn record_sighting(&mut self, record: PeripheralRecord) -> Sighting {
        match self.peripheral_index.get(&record.id) {
            Some(&index) => {
                let existing = &mut self.peripherals[index];
                existing.advertisement = record.advertisement;
                existing.rssi = record.rssi;
                let id = existing.id.clone();
                self.publish(StoreChange::PeripheralUpdated(id));
                Sighting::Updated
            }
            None => {
                let id = record.id.clone();
                self.peripheral_index.insert(id.clone(), self.peripherals.len());
                self.peripherals.push(record);
                self.publish(StoreChange::PeripheralAdded(id));
                Sighting::New
            }
        }
    }

    pub fn services(&self) -> &[ServiceRecord] {
        &self.services
    }

    pub fn service(&self, handle: ServiceHandle) -> Option<&ServiceRecord> {
        self.services.iter().find(|s| s.handle == handle)
    }

    /// Appends a service unless one with the same handle is already present.
    pub fn push_service(&mut self, service: ServiceRecord) -> bool {
        if self.service(service.handle).is_some() {
            return false;
        }
        let handle = service.handle;
        self.services.push(service);
        self.publish(StoreChange::ServiceAdded(handle));

        let profile = DeviceProfile::from_services(self.services.iter().map(|s| &s.uuid));
        if profile != self.profile {
            self.profile = profile;
            self.publish(StoreChange::ProfileChanged(profile));
        }
        true
    }

    pub fn characteristics(&self) -> &[CharacteristicRecord] {
        &self.characteristics
    }

    pub fn characteristic(&self, handle: CharacteristicHandle) -> Option<&CharacteristicRecord> {
        self.characteristics.iter().find(|c| c.handle == handle)
    }

    /// Appends a characteristic unless one with the same handle is already present.
    pub fn push_characteristic(&mut self, characteristic: CharacteristicRecord) -> bool {
        if self.characteristic(characteristic.handle).is_some() {
            return false;
        }
        let handle = characteristic.handle;
        self.characteristics.push(characteristic);
        self.publish(StoreChange::CharacteristicAdded(handle));
        true
    }

    fn update_characteristic<F>(&mut self, handle: CharacteristicHandle, update: F) -> bool
    where
        F: FnOnce(&mut CharacteristicRecord),
    {
        match self.characteristics.iter_mut().find(|c| c.handle == handle) {
            Some(characteristic) => {
                update(characteristic);
                self.publish(StoreChange::CharacteristicUpdated(handle));
                true
            }
            None => false,
        }
    }

    pub fn set_read_value(&mut self, handle: CharacteristicHandle, read_value: String) -> bool {
        self.update_characteristic(handle, |c| c.read_value = read_value)
    }

    pub fn set_description(&mut self, handle: CharacteristicHandle, description: String) -> bool {
        self.update_characteristic(handle, |c| c.description = description)
    }

    pub fn set_notifying(&mut self, handle: CharacteristicHandle, notifying: bool) -> bool {
        self.update_characteristic(handle, |c| c.notifying = notifying)
    }

    /// Drops every service and characteristic of the previous connection.
    pub fn clear_topology(&mut self) {
        self.services.clear();
        self.characteristics.clear();
        self.profile = DeviceProfile::Generic;
        self.publish(StoreChange::TopologyCleared);
    }

    pub fn profile(&self) -> DeviceProfile {
        self.profile
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            powered: self.powered,
            scanning: self.scanning,
            connected: self.connected(),
            connection: self.connection.clone(),
            active_peripheral: self.active_peripheral().cloned(),
            peripherals: self.peripherals.clone(),
            services: self.services.clone(),
            characteristics: self.characteristics.clone(),
            profile: self.profile,
        }
    }
}
