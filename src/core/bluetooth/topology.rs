//! Walks the GATT tree of the connected peripheral.
//! Services are discovered first, then characteristics per service, then
//! descriptors per characteristic. Completions for different services or
//! characteristics may arrive in any order; every step only depends on the
//! record it was issued for.

use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::bluetooth::catalog::known_entities;
use crate::core::bluetooth::constants::UUID_USER_DESCRIPTION_DESCRIPTOR;
use crate::core::bluetooth::events::PeripheralEventSink;
use crate::core::bluetooth::platform::BlePlatform;
use crate::core::bluetooth::store::StateStore;
use crate::core::bluetooth::types::*;
use crate::utils::to_hex;

/// Enumeration of one connection. Created on connect, dropped on disconnect.
#[derive(Debug, Clone)]
pub struct TopologyEnumerator {
    peripheral: PeripheralId,
    service_filter: Vec<Uuid>,
    subscribe_notifications: bool,
}

impl TopologyEnumerator {
    pub fn new(peripheral: PeripheralId, service_filter: Vec<Uuid>, subscribe_notifications: bool) -> Self {
        Self {
            peripheral,
            service_filter,
            subscribe_notifications,
        }
    }

    pub fn peripheral(&self) -> &PeripheralId {
        &self.peripheral
    }

    /// Issues service discovery, the first step of the walk.
    pub fn begin(&self, platform: &dyn BlePlatform) {
        info!("Discovering services of {}...", self.peripheral);
        platform.discover_services(&self.peripheral, &self.service_filter);
    }

    /// Binds the enumerator to the store and platform for one event.
    pub fn context<'a>(
        &'a self,
        store: &'a mut StateStore,
        platform: &'a dyn BlePlatform,
    ) -> TopologyContext<'a> {
        TopologyContext {
            enumerator: self,
            store,
            platform,
        }
    }
}

/// Decodes a user-description descriptor value. Trailing NULs are dropped.
pub fn decode_user_description(value: &[u8]) -> String {
    String::from_utf8_lossy(value)
        .trim_end_matches('\0')
        .trim()
        .to_string()
}

/// The enumerator attached to the store for the duration of one event.
pub struct TopologyContext<'a> {
    enumerator: &'a TopologyEnumerator,
    store: &'a mut StateStore,
    platform: &'a dyn BlePlatform,
}

impl PeripheralEventSink for TopologyContext<'_> {
    fn on_services_discovered(&mut self, services: Option<Vec<ServiceInfo>>, error: Option<String>) {
        if let Some(error) = error {
            error!("Service discovery failed: {}", error);
        }
        let Some(services) = services else {
            debug!("Service discovery returned nothing");
            return;
        };

        let catalog = known_entities();
        for service in services {
            let name = catalog.service_name(&service.uuid);
            info!("Found service {} ({})", service.uuid, name);
            let added = self.store.push_service(ServiceRecord {
                handle: service.handle,
                uuid: service.uuid,
                peripheral: self.enumerator.peripheral.clone(),
                name: name.to_string(),
            });
            if added {
                self.platform
                    .discover_characteristics(&self.enumerator.peripheral, service.handle);
            }
        }
    }

    fn on_characteristics_discovered(
        &mut self,
        service: ServiceHandle,
        characteristics: Option<Vec<CharacteristicInfo>>,
        error: Option<String>,
    ) {
        if let Some(error) = error {
            error!("Characteristic discovery for service {} failed: {}", service, error);
        }
        let Some(characteristics) = characteristics else {
            return;
        };
        if self.store.service(service).is_none() {
            warn!("Characteristics for unknown service {}, ignoring", service);
            return;
        }

        let catalog = known_entities();
        for characteristic in characteristics {
            let name = catalog.characteristic_name(&characteristic.uuid);
            debug!(
                "Found characteristic {} ({}) {}",
                characteristic.uuid, name, characteristic.capabilities
            );
            let added = self.store.push_characteristic(CharacteristicRecord {
                handle: characteristic.handle,
                service,
                uuid: characteristic.uuid,
                name: name.to_string(),
                description: String::new(),
                read_value: String::new(),
                capabilities: characteristic.capabilities,
                notifying: false,
            });
            if !added {
                continue;
            }

            let peripheral = &self.enumerator.peripheral;
            self.platform
                .read_characteristic(peripheral, characteristic.handle);
            self.platform
                .discover_descriptors(peripheral, characteristic.handle);
            if self.enumerator.subscribe_notifications && characteristic.capabilities.can_subscribe() {
                self.platform
                    .set_notify(peripheral, characteristic.handle, true);
            }
        }
    }

    fn on_descriptors_discovered(
        &mut self,
        characteristic: CharacteristicHandle,
        descriptors: Option<Vec<DescriptorInfo>>,
        error: Option<String>,
    ) {
        if let Some(error) = error {
            error!("Descriptor discovery for {} failed: {}", characteristic, error);
        }
        let Some(descriptors) = descriptors else {
            return;
        };

        if let Some(user_description) = descriptors
            .iter()
            .find(|d| d.uuid == UUID_USER_DESCRIPTION_DESCRIPTOR)
        {
            self.platform
                .read_descriptor(&self.enumerator.peripheral, characteristic, user_description.handle);
        }
    }

    fn on_characteristic_value(&mut self, characteristic: CharacteristicHandle, value: Result<Vec<u8>, String>) {
        match value {
            Ok(bytes) => {
                let hex = to_hex(&bytes);
                debug!("Value of {}: {}", characteristic, hex);
                if !self.store.set_read_value(characteristic, hex) {
                    warn!("Value for unknown characteristic {}, ignoring", characteristic);
                }
            }
            Err(e) => error!("Failed to read characteristic {}: {}", characteristic, e),
        }
    }

    fn on_descriptor_value(
        &mut self,
        characteristic: CharacteristicHandle,
        descriptor: DescriptorInfo,
        value: Result<Vec<u8>, String>,
    ) {
        if descriptor.uuid != UUID_USER_DESCRIPTION_DESCRIPTOR {
            return;
        }
        match value {
            Ok(bytes) => {
                let description = decode_user_description(&bytes);
                debug!("Description of {}: {:?}", characteristic, description);
                if !self.store.set_description(characteristic, description) {
                    warn!("Description for unknown characteristic {}, ignoring", characteristic);
                }
            }
            Err(e) => error!("Failed to read description of {}: {}", characteristic, e),
        }
    }

    fn on_write_completed(&mut self, characteristic: CharacteristicHandle, result: Result<(), String>) {
        match result {
            Ok(()) => debug!("Write to {} completed", characteristic),
            Err(e) => error!("Failed to write to {}: {}", characteristic, e),
        }
    }

    fn on_notification_state(
        &mut self,
        characteristic: CharacteristicHandle,
        enabled: bool,
        result: Result<(), String>,
    ) {
        match result {
            Ok(()) => {
                info!(
                    "Notifications {} for {}",
                    if enabled { "enabled" } else { "disabled" },
                    characteristic
                );
                self.store.set_notifying(characteristic, enabled);
            }
            Err(e) => error!("Failed to change notification state of {}: {}", characteristic, e),
        }
    }
}
