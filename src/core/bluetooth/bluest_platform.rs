//! Radio access through the `bluest` crate.
//! Each request spawns a tokio task; its outcome is posted back into the
//! session queue as a platform event. Native handles are kept in a registry
//! and referred to by numeric handles everywhere else.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{Result, anyhow};
use bluest::{Adapter, AdapterEvent, Characteristic, Descriptor, Device, Service, Uuid};
use futures_util::StreamExt;
use log::{debug, error, info, warn};
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::events::{EventSender, PlatformEvent};
use crate::core::bluetooth::notification::NotificationHandler;
use crate::core::bluetooth::platform::BlePlatform;
use crate::core::bluetooth::types::*;

/// How often a connected link is checked for loss.
const LINK_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Default)]
struct Registry {
    devices: HashMap<PeripheralId, Device>,
    services: HashMap<ServiceHandle, Service>,
    characteristics: HashMap<CharacteristicHandle, Characteristic>,
    descriptors: HashMap<DescriptorHandle, Descriptor>,
    link_watchers: HashMap<PeripheralId, CancellationToken>,
    next_handle: u64,
}

impl Registry {
    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

pub struct BluestPlatform {
    adapter: Adapter,
    events: EventSender,
    registry: Arc<Mutex<Registry>>,
    scan_token: Mutex<Option<CancellationToken>>,
    notification_handler: NotificationHandler,
}

impl BluestPlatform {
    /// Opens the default adapter.
    pub async fn open(events: EventSender) -> Result<Self> {
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| anyhow!("No Bluetooth adapter found"))?;
        info!("Bluetooth adapter opened.");
        Ok(Self::new(adapter, events))
    }

    pub fn new(adapter: Adapter, events: EventSender) -> Self {
        Self {
            adapter,
            notification_handler: NotificationHandler::new(events.clone()),
            events,
            registry: Arc::new(Mutex::new(Registry::default())),
            scan_token: Mutex::new(None),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reports the current power state, then every availability change.
    pub fn watch_power_state(&self) {
        let adapter = self.adapter.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let initial = if adapter.is_available().await {
                PowerState::PoweredOn
            } else {
                PowerState::PoweredOff
            };
            events.emit(PlatformEvent::PowerStateChanged(initial));

            let mut adapter_events = match adapter.events().await {
                Ok(stream) => stream,
                Err(e) => {
                    error!("Failed to watch adapter availability: {}", e);
                    events.emit(PlatformEvent::PowerStateChanged(PowerState::Unknown));
                    return;
                }
            };
            while let Some(event) = adapter_events.next().await {
                let state = match event {
                    Ok(AdapterEvent::Available) => PowerState::PoweredOn,
                    Ok(AdapterEvent::Unavailable) => PowerState::PoweredOff,
                    Err(e) => {
                        warn!("Adapter event error: {}", e);
                        PowerState::Resetting
                    }
                };
                events.emit(PlatformEvent::PowerStateChanged(state));
                if events.is_closed() {
                    break;
                }
            }
            info!("Adapter event stream has ended.");
        });
    }

    fn device(&self, peripheral: &PeripheralId) -> Option<Device> {
        self.registry().devices.get(peripheral).cloned()
    }

    fn characteristic(&self, handle: CharacteristicHandle) -> Option<Characteristic> {
        self.registry().characteristics.get(&handle).cloned()
    }

    fn extract_mac_address(device_id_str: &str) -> Option<String> {
        let re = Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").ok()?;
        re.find_iter(device_id_str)
            .last()
            .map(|m| m.as_str().to_uppercase())
    }

    fn advertisement_fields(adv_data: &bluest::AdvertisementData) -> AdvertisementFields {
        AdvertisementFields {
            local_name: adv_data.local_name.clone(),
            service_uuids: adv_data.services.iter().copied().collect(),
            manufacturer_data: adv_data.manufacturer_data.as_ref().map(|m| ManufacturerData {
                company_id: m.company_id,
                data: m.data.to_vec(),
            }),
            tx_power_level: adv_data.tx_power_level,
            is_connectable: adv_data.is_connectable,
        }
    }

    fn capabilities(properties: bluest::CharacteristicProperties) -> CharacteristicCapabilities {
        CharacteristicCapabilities {
            broadcast: properties.broadcast,
            read: properties.read,
            write_without_response: properties.write_without_response,
            write: properties.write,
            notify: properties.notify,
            indicate: properties.indicate,
        }
    }
}

impl BlePlatform for BluestPlatform {
    fn start_discovery(&self, service_filter: &[Uuid]) {
        let cancel_token = CancellationToken::new();
        if let Some(previous) = self
            .scan_token
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(cancel_token.clone())
        {
            previous.cancel();
        }

        let adapter = self.adapter.clone();
        let events = self.events.clone();
        let registry = self.registry.clone();
        let service_filter = service_filter.to_vec();

        tokio::spawn(async move {
            let mut scan_stream = match adapter.scan(&service_filter).await {
                Ok(stream) => stream,
                Err(e) => {
                    // the rescan timer retries on its next tick
                    error!("Failed to start bluetooth scan: {}", e);
                    return;
                }
            };
            debug!("Bluetooth scan started");

            loop {
                tokio::select! {
                    result = scan_stream.next() => {
                        match result {
                            Some(discovered) => {
                                let device = discovered.device;
                                let id = device.id().to_string();
                                let peripheral = PeripheralId::new(id.clone());
                                registry
                                    .lock()
                                    .unwrap_or_else(|e| e.into_inner())
                                    .devices
                                    .insert(peripheral.clone(), device.clone());

                                events.emit(PlatformEvent::AdvertisementObserved {
                                    peripheral,
                                    platform_name: device.name().ok(),
                                    address: Self::extract_mac_address(&id),
                                    advertisement: Self::advertisement_fields(&discovered.adv_data),
                                    rssi: discovered.rssi.unwrap_or_default(),
                                });
                            }
                            None => {
                                info!("Bluetooth scan stream has ended.");
                                break;
                            }
                        }
                    }
                    _ = cancel_token.cancelled() => break,
                }
            }
        });
    }

    fn stop_discovery(&self) {
        if let Some(token) = self
            .scan_token
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            token.cancel();
            debug!("Bluetooth scan stopped");
        }
    }

    fn connect(&self, peripheral: &PeripheralId) {
        let Some(device) = self.device(peripheral) else {
            self.events.emit(PlatformEvent::ConnectFailed {
                peripheral: peripheral.clone(),
                reason: "device not seen by this adapter".to_string(),
            });
            return;
        };

        let adapter = self.adapter.clone();
        let events = self.events.clone();
        let peripheral = peripheral.clone();
        let link_watch = LinkWatchStarter {
            registry: self.registry.clone(),
            events: self.events.clone(),
        };

        tokio::spawn(async move {
            info!("Initiating connection to {}...", peripheral);
            match adapter.connect_device(&device).await {
                Ok(()) => {
                    events.emit(PlatformEvent::Connected {
                        peripheral: peripheral.clone(),
                    });
                    link_watch.start(peripheral, device);
                }
                Err(e) => events.emit(PlatformEvent::ConnectFailed {
                    peripheral,
                    reason: e.to_string(),
                }),
            }
        });
    }

    fn cancel_connection(&self, peripheral: &PeripheralId) {
        self.notification_handler.stop_all();
        {
            let mut registry = self.registry();
            if let Some(token) = registry.link_watchers.remove(peripheral) {
                token.cancel();
            }
            registry.services.clear();
            registry.characteristics.clear();
            registry.descriptors.clear();
        }

        let Some(device) = self.device(peripheral) else {
            return;
        };
        let adapter = self.adapter.clone();
        let events = self.events.clone();
        let peripheral = peripheral.clone();

        tokio::spawn(async move {
            info!("Disconnecting from device {}", peripheral);
            let reason = adapter.disconnect_device(&device).await.err().map(|e| e.to_string());
            events.emit(PlatformEvent::Disconnected { peripheral, reason });
        });
    }

    fn discover_services(&self, peripheral: &PeripheralId, filter: &[Uuid]) {
        let Some(device) = self.device(peripheral) else {
            warn!("Service discovery requested for unknown device {}", peripheral);
            return;
        };
        let events = self.events.clone();
        let registry = self.registry.clone();
        let peripheral = peripheral.clone();
        let filter = filter.to_vec();

        tokio::spawn(async move {
            let discovered = if filter.is_empty() {
                device.discover_services().await
            } else {
                let mut services = Vec::new();
                let mut failure = None;
                for uuid in &filter {
                    match device.discover_services_with_uuid(*uuid).await {
                        Ok(found) => services.extend(found),
                        Err(e) => failure = Some(e),
                    }
                }
                match failure {
                    Some(e) if services.is_empty() => Err(e),
                    _ => Ok(services),
                }
            };

            let event = match discovered {
                Ok(services) => {
                    let mut registry = registry.lock().unwrap_or_else(|e| e.into_inner());
                    let infos = services
                        .into_iter()
                        .map(|service| {
                            let handle = ServiceHandle(registry.next_handle());
                            let info = ServiceInfo {
                                handle,
                                uuid: service.uuid(),
                            };
                            registry.services.insert(handle, service);
                            info
                        })
                        .collect();
                    PlatformEvent::ServicesDiscovered {
                        peripheral,
                        services: Some(infos),
                        error: None,
                    }
                }
                Err(e) => PlatformEvent::ServicesDiscovered {
                    peripheral,
                    services: None,
                    error: Some(e.to_string()),
                },
            };
            events.emit(event);
        });
    }

    fn discover_characteristics(&self, peripheral: &PeripheralId, service: ServiceHandle) {
        let Some(native) = self.registry().services.get(&service).cloned() else {
            warn!("Characteristic discovery requested for unknown service {}", service);
            return;
        };
        let events = self.events.clone();
        let registry = self.registry.clone();
        let peripheral = peripheral.clone();

        tokio::spawn(async move {
            let event = match native.discover_characteristics().await {
                Ok(characteristics) => {
                    let mut infos = Vec::with_capacity(characteristics.len());
                    for characteristic in characteristics {
                        let capabilities = match characteristic.properties().await {
                            Ok(properties) => Self::capabilities(properties),
                            Err(e) => {
                                warn!("Failed to read properties of {}: {}", characteristic.uuid(), e);
                                CharacteristicCapabilities::default()
                            }
                        };
                        let mut registry = registry.lock().unwrap_or_else(|e| e.into_inner());
                        let handle = CharacteristicHandle(registry.next_handle());
                        infos.push(CharacteristicInfo {
                            handle,
                            uuid: characteristic.uuid(),
                            capabilities,
                        });
                        registry.characteristics.insert(handle, characteristic);
                    }
                    PlatformEvent::CharacteristicsDiscovered {
                        peripheral,
                        service,
                        characteristics: Some(infos),
                        error: None,
                    }
                }
                Err(e) => PlatformEvent::CharacteristicsDiscovered {
                    peripheral,
                    service,
                    characteristics: None,
                    error: Some(e.to_string()),
                },
            };
            events.emit(event);
        });
    }

    fn discover_descriptors(&self, peripheral: &PeripheralId, characteristic: CharacteristicHandle) {
        let Some(native) = self.characteristic(characteristic) else {
            warn!("Descriptor discovery requested for unknown characteristic {}", characteristic);
            return;
        };
        let events = self.events.clone();
        let registry = self.registry.clone();
        let peripheral = peripheral.clone();

        tokio::spawn(async move {
            let event = match native.discover_descriptors().await {
                Ok(descriptors) => {
                    let mut registry = registry.lock().unwrap_or_else(|e| e.into_inner());
                    let infos = descriptors
                        .into_iter()
                        .map(|descriptor| {
                            let handle = DescriptorHandle(registry.next_handle());
                            let info = DescriptorInfo {
                                handle,
                                uuid: descriptor.uuid(),
                            };
                            registry.descriptors.insert(handle, descriptor);
                            info
                        })
                        .collect();
                    PlatformEvent::DescriptorsDiscovered {
                        peripheral,
                        characteristic,
                        descriptors: Some(infos),
                        error: None,
                    }
                }
                Err(e) => PlatformEvent::DescriptorsDiscovered {
                    peripheral,
                    characteristic,
                    descriptors: None,
                    error: Some(e.to_string()),
                },
            };
            events.emit(event);
        });
    }

    fn read_characteristic(&self, peripheral: &PeripheralId, characteristic: CharacteristicHandle) {
        let Some(native) = self.characteristic(characteristic) else {
            warn!("Read requested for unknown characteristic {}", characteristic);
            return;
        };
        let events = self.events.clone();
        let peripheral = peripheral.clone();

        tokio::spawn(async move {
            let value = native.read().await.map_err(|e| e.to_string());
            events.emit(PlatformEvent::CharacteristicValueUpdated {
                peripheral,
                characteristic,
                value,
            });
        });
    }

    fn write_characteristic(
        &self,
        peripheral: &PeripheralId,
        characteristic: CharacteristicHandle,
        value: Vec<u8>,
        kind: WriteKind,
    ) {
        let Some(native) = self.characteristic(characteristic) else {
            warn!("Write requested for unknown characteristic {}", characteristic);
            return;
        };
        let events = self.events.clone();
        let peripheral = peripheral.clone();

        tokio::spawn(async move {
            let result = match kind {
                WriteKind::WithResponse => native.write(&value).await,
                WriteKind::WithoutResponse => native.write_without_response(&value).await,
            };
            events.emit(PlatformEvent::WriteCompleted {
                peripheral,
                characteristic,
                result: result.map_err(|e| e.to_string()),
            });
        });
    }

    fn read_descriptor(
        &self,
        peripheral: &PeripheralId,
        characteristic: CharacteristicHandle,
        descriptor: DescriptorHandle,
    ) {
        let Some(native) = self.registry().descriptors.get(&descriptor).cloned() else {
            warn!("Read requested for unknown descriptor {}", descriptor);
            return;
        };
        let events = self.events.clone();
        let peripheral = peripheral.clone();

        tokio::spawn(async move {
            let info = DescriptorInfo {
                handle: descriptor,
                uuid: native.uuid(),
            };
            let value = native.read().await.map_err(|e| e.to_string());
            events.emit(PlatformEvent::DescriptorValueUpdated {
                peripheral,
                characteristic,
                descriptor: info,
                value,
            });
        });
    }

    fn set_notify(&self, peripheral: &PeripheralId, characteristic: CharacteristicHandle, enabled: bool) {
        if !enabled {
            self.notification_handler
                .unsubscribe(peripheral.clone(), characteristic);
            return;
        }
        match self.characteristic(characteristic) {
            Some(native) => {
                self.notification_handler
                    .subscribe(peripheral.clone(), characteristic, native)
            }
            None => warn!("Subscription requested for unknown characteristic {}", characteristic),
        }
    }
}

/// The pieces of the platform a connect task needs to start watching the link.
struct LinkWatchStarter {
    registry: Arc<Mutex<Registry>>,
    events: EventSender,
}

impl LinkWatchStarter {
    fn start(self, peripheral: PeripheralId, device: Device) {
        let token = CancellationToken::new();
        if let Some(previous) = self
            .registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .link_watchers
            .insert(peripheral.clone(), token.clone())
        {
            previous.cancel();
        }
        let events = self.events;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(LINK_POLL_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if !device.is_connected().await {
                            warn!("Link to {} lost", peripheral);
                            events.emit(PlatformEvent::Disconnected {
                                peripheral,
                                reason: Some("link lost".to_string()),
                            });
                            break;
                        }
                    }
                    _ = token.cancelled() => break,
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_mac_address() {
        assert_eq!(
            BluestPlatform::extract_mac_address("hci0/dev_aa:bb:cc:dd:ee:0f"),
            Some("AA:BB:CC:DD:EE:0F".to_string())
        );
        assert_eq!(
            BluestPlatform::extract_mac_address("BluetoothLE#BluetoothLE00:11:22:33:44:55-a1-b2-c3-d4-e5-f6"),
            Some("A1-B2-C3-D4-E5-F6".to_string())
        );
        assert_eq!(
            BluestPlatform::extract_mac_address("6F9A3C2E-1B4D-4F5A-9C8E-7D6B5A4C3B2A"),
            None
        );
    }
}
