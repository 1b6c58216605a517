//! Asynchronous events delivered by the radio, and the two sinks they fan into.

use log::warn;
use tokio::sync::{mpsc, oneshot};

use crate::core::bluetooth::handle::SessionCommand;
use crate::core::bluetooth::types::*;
use crate::error::BleError;

/// A completion or notification reported by the platform stack.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformEvent {
    PowerStateChanged(PowerState),
    AdvertisementObserved {
        peripheral: PeripheralId,
        /// Name the platform has cached for the device, if any
        platform_name: Option<String>,
        address: Option<String>,
        advertisement: AdvertisementFields,
        rssi: i16,
    },
    Connected {
        peripheral: PeripheralId,
    },
    ConnectFailed {
        peripheral: PeripheralId,
        reason: String,
    },
    Disconnected {
        peripheral: PeripheralId,
        reason: Option<String>,
    },
    ServicesDiscovered {
        peripheral: PeripheralId,
        services: Option<Vec<ServiceInfo>>,
        error: Option<String>,
    },
    CharacteristicsDiscovered {
        peripheral: PeripheralId,
        service: ServiceHandle,
        characteristics: Option<Vec<CharacteristicInfo>>,
        error: Option<String>,
    },
    DescriptorsDiscovered {
        peripheral: PeripheralId,
        characteristic: CharacteristicHandle,
        descriptors: Option<Vec<DescriptorInfo>>,
        error: Option<String>,
    },
    /// Result of an explicit read or an incoming notification.
    CharacteristicValueUpdated {
        peripheral: PeripheralId,
        characteristic: CharacteristicHandle,
        value: Result<Vec<u8>, String>,
    },
    DescriptorValueUpdated {
        peripheral: PeripheralId,
        characteristic: CharacteristicHandle,
        descriptor: DescriptorInfo,
        value: Result<Vec<u8>, String>,
    },
    WriteCompleted {
        peripheral: PeripheralId,
        characteristic: CharacteristicHandle,
        result: Result<(), String>,
    },
    NotificationStateChanged {
        peripheral: PeripheralId,
        characteristic: CharacteristicHandle,
        enabled: bool,
        result: Result<(), String>,
    },
}

/// Receiver of radio-level events: power, discovery and connection lifecycle.
pub trait AdapterEventSink {
    fn on_power_state(&mut self, state: PowerState);
    fn on_advertisement(
        &mut self,
        peripheral: PeripheralId,
        platform_name: Option<String>,
        address: Option<String>,
        advertisement: AdvertisementFields,
        rssi: i16,
    );
    fn on_connected(&mut self, peripheral: PeripheralId);
    fn on_connect_failed(&mut self, peripheral: PeripheralId, reason: String);
    fn on_disconnected(&mut self, peripheral: PeripheralId, reason: Option<String>);
}

/// Receiver of events scoped to one connected peripheral.
pub trait PeripheralEventSink {
    fn on_services_discovered(&mut self, services: Option<Vec<ServiceInfo>>, error: Option<String>);
    fn on_characteristics_discovered(
        &mut self,
        service: ServiceHandle,
        characteristics: Option<Vec<CharacteristicInfo>>,
        error: Option<String>,
    );
    fn on_descriptors_discovered(
        &mut self,
        characteristic: CharacteristicHandle,
        descriptors: Option<Vec<DescriptorInfo>>,
        error: Option<String>,
    );
    fn on_characteristic_value(&mut self, characteristic: CharacteristicHandle, value: Result<Vec<u8>, String>);
    fn on_descriptor_value(
        &mut self,
        characteristic: CharacteristicHandle,
        descriptor: DescriptorInfo,
        value: Result<Vec<u8>, String>,
    );
    fn on_write_completed(&mut self, characteristic: CharacteristicHandle, result: Result<(), String>);
    fn on_notification_state(
        &mut self,
        characteristic: CharacteristicHandle,
        enabled: bool,
        result: Result<(), String>,
    );
}

impl PlatformEvent {
    /// Peripheral the event is scoped to, for peripheral-level events.
    pub fn peripheral_scope(&self) -> Option<&PeripheralId> {
        match self {
            PlatformEvent::ServicesDiscovered { peripheral, .. }
            | PlatformEvent::CharacteristicsDiscovered { peripheral, .. }
            | PlatformEvent::DescriptorsDiscovered { peripheral, .. }
            | PlatformEvent::CharacteristicValueUpdated { peripheral, .. }
            | PlatformEvent::DescriptorValueUpdated { peripheral, .. }
            | PlatformEvent::WriteCompleted { peripheral, .. }
            | PlatformEvent::NotificationStateChanged { peripheral, .. } => Some(peripheral),
            _ => None,
        }
    }

    /// Hands an adapter-level event to `sink`. Returns the event back if it is
    /// peripheral-scoped so the caller can route it to the attached peripheral sink.
    pub fn dispatch_adapter(self, sink: &mut dyn AdapterEventSink) -> Option<PlatformEvent> {
        match self {
            PlatformEvent::PowerStateChanged(state) => sink.on_power_state(state),
            PlatformEvent::AdvertisementObserved {
                peripheral,
                platform_name,
                address,
                advertisement,
                rssi,
            } => sink.on_advertisement(peripheral, platform_name, address, advertisement, rssi),
            PlatformEvent::Connected { peripheral } => sink.on_connected(peripheral),
            PlatformEvent::ConnectFailed { peripheral, reason } => {
                sink.on_connect_failed(peripheral, reason)
            }
            PlatformEvent::Disconnected { peripheral, reason } => {
                sink.on_disconnected(peripheral, reason)
            }
            other => return Some(other),
        }
        None
    }

    /// Hands a peripheral-scoped event to `sink`. Adapter-level events are ignored.
    pub fn dispatch_peripheral(self, sink: &mut dyn PeripheralEventSink) {
        match self {
            PlatformEvent::ServicesDiscovered { services, error, .. } => {
                sink.on_services_discovered(services, error)
            }
            PlatformEvent::CharacteristicsDiscovered {
                service,
                characteristics,
                error,
                ..
            } => sink.on_characteristics_discovered(service, characteristics, error),
            PlatformEvent::DescriptorsDiscovered {
                characteristic,
                descriptors,
                error,
                ..
            } => sink.on_descriptors_discovered(characteristic, descriptors, error),
            PlatformEvent::CharacteristicValueUpdated {
                characteristic,
                value,
                ..
            } => sink.on_characteristic_value(characteristic, value),
            PlatformEvent::DescriptorValueUpdated {
                characteristic,
                descriptor,
                value,
                ..
            } => sink.on_descriptor_value(characteristic, descriptor, value),
            PlatformEvent::WriteCompleted {
                characteristic,
                result,
                ..
            } => sink.on_write_completed(characteristic, result),
            PlatformEvent::NotificationStateChanged {
                characteristic,
                enabled,
                result,
                ..
            } => sink.on_notification_state(characteristic, enabled, result),
            other => warn!("Adapter-level event routed to peripheral sink: {:?}", other),
        }
    }
}

/// Everything the session's processing context consumes, in one queue.
#[derive(Debug)]
pub enum SessionMessage {
    Platform(PlatformEvent),
    Command(SessionCommand, oneshot::Sender<Result<(), BleError>>),
    /// Periodic scan restart, tagged with the timer generation that produced it
    RescanTick(u64),
    Shutdown(oneshot::Sender<()>),
}

impl From<PlatformEvent> for SessionMessage {
    fn from(event: PlatformEvent) -> Self {
        SessionMessage::Platform(event)
    }
}

/// Clonable handle the platform and the timer use to post into the session queue.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<SessionMessage>,
}

impl EventSender {
    pub fn new(tx: mpsc::UnboundedSender<SessionMessage>) -> Self {
        Self { tx }
    }

    pub fn emit(&self, event: PlatformEvent) {
        if self.tx.send(event.into()).is_err() {
            warn!("Session queue closed, dropping platform event");
        }
    }

    pub fn rescan_tick(&self, generation: u64) -> bool {
        self.tx.send(SessionMessage::RescanTick(generation)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
