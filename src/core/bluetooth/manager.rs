//! Bluetooth manager for the lighting session
//! Owns the state store and every component that mutates it. All input is
//! processed here, one message at a time, so no locking is needed.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{broadcast, mpsc, watch};

use crate::config::AppConfig;
use crate::core::bluetooth::adapter::{AdapterMonitor, PowerAction};
use crate::core::bluetooth::commands::ToggleController;
use crate::core::bluetooth::connection::ConnectionManager;
use crate::core::bluetooth::events::{AdapterEventSink, PlatformEvent, SessionMessage};
use crate::core::bluetooth::handle::SessionCommand;
use crate::core::bluetooth::platform::BlePlatform;
use crate::core::bluetooth::scanner::BluetoothScanner;
use crate::core::bluetooth::store::{SessionSnapshot, StateStore, StoreChange};
use crate::core::bluetooth::timer::RescanTimer;
use crate::core::bluetooth::topology::TopologyEnumerator;
use crate::core::bluetooth::types::*;
use crate::error::BleError;

/// Manages the Bluetooth session
pub struct BluetoothManager {
    store: StateStore,
    platform: Arc<dyn BlePlatform>,
    adapter: AdapterMonitor,
    scanner: BluetoothScanner,
    connection_manager: ConnectionManager,
    toggle_controller: ToggleController,
    /// Receiver of peripheral events, attached while a link is confirmed
    topology: Option<TopologyEnumerator>,
}

impl BluetoothManager {
    pub fn new(config: &AppConfig, platform: Arc<dyn BlePlatform>, timer: Box<dyn RescanTimer>) -> Self {
        Self {
            store: StateStore::new(),
            platform,
            adapter: AdapterMonitor::new(),
            scanner: BluetoothScanner::new(config.scan.clone(), timer),
            connection_manager: ConnectionManager::new(config.connection.clone()),
            toggle_controller: ToggleController::new(config.connection.read_back_after_write),
            topology: None,
        }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.store.subscribe()
    }

    pub fn change_sender(&self) -> broadcast::Sender<StoreChange> {
        self.store.change_sender()
    }

    /// Starts a scan session. An active connection is dropped first since
    /// scanning and a connection never coexist.
    pub fn start_scan(&mut self) -> Result<(), BleError> {
        if !self.store.powered() {
            return Err(BleError::AdapterUnavailable);
        }
        if self.store.connection().is_engaged() {
            info!("Dropping the connection to start scanning");
            self.disconnect();
        }
        self.scanner.start_scan(&mut self.store, self.platform.as_ref())
    }

    pub fn stop_scan(&mut self) {
        self.scanner.stop_scan(&mut self.store, self.platform.as_ref());
    }

    /// Connects to a peripheral from the current scan session, stopping the scan.
    pub fn connect(&mut self, target: &PeripheralId) -> Result<(), BleError> {
        self.connection_manager.ensure_can_connect(&self.store, target)?;
        self.scanner.stop_scan(&mut self.store, self.platform.as_ref());
        self.connection_manager
            .connect(&mut self.store, self.platform.as_ref(), target)
    }

    pub fn disconnect(&mut self) {
        self.topology = None;
        self.connection_manager
            .disconnect(&mut self.store, self.platform.as_ref());
    }

    pub fn toggle_characteristic(&mut self, handle: CharacteristicHandle) -> Result<(), BleError> {
        self.toggle_controller
            .toggle(&self.store, self.platform.as_ref(), handle)
            .map(|_| ())
    }

    pub fn read_value(&mut self, handle: CharacteristicHandle) -> Result<(), BleError> {
        self.toggle_controller
            .read_value(&self.store, self.platform.as_ref(), handle)
    }

    pub fn set_notify(&mut self, handle: CharacteristicHandle, enabled: bool) -> Result<(), BleError> {
        self.toggle_controller
            .set_notify(&self.store, self.platform.as_ref(), handle, enabled)
    }

    pub fn execute(&mut self, command: SessionCommand) -> Result<(), BleError> {
        debug!("Executing {:?}", command);
        match command {
            SessionCommand::StartScan => self.start_scan(),
            SessionCommand::StopScan => {
                self.stop_scan();
                Ok(())
            }
            SessionCommand::Connect(target) => self.connect(&target),
            SessionCommand::Disconnect => {
                self.disconnect();
                Ok(())
            }
            SessionCommand::ToggleCharacteristic(handle) => self.toggle_characteristic(handle),
            SessionCommand::ReadValue(handle) => self.read_value(handle),
            SessionCommand::SetNotify(handle, enabled) => self.set_notify(handle, enabled),
        }
    }

    pub fn on_rescan_tick(&mut self, generation: u64) {
        self.scanner
            .on_rescan_tick(&self.store, self.platform.as_ref(), generation);
    }

    /// Routes a platform event: adapter-level events to the manager itself,
    /// peripheral-level events to the attached enumerator.
    pub fn handle_event(&mut self, event: PlatformEvent) {
        let Some(event) = event.dispatch_adapter(&mut *self) else {
            return;
        };

        let Some(enumerator) = self.topology.as_ref() else {
            warn!("No connection attached, dropping late event {:?}", event);
            return;
        };
        if event.peripheral_scope() != Some(enumerator.peripheral()) {
            warn!("Event for a stale connection, dropping {:?}", event);
            return;
        }
        let mut context = enumerator.context(&mut self.store, self.platform.as_ref());
        event.dispatch_peripheral(&mut context);
    }

    pub fn shutdown(&mut self) {
        info!("Shutting down Bluetooth session");
        self.stop_scan();
        self.disconnect();
    }

    fn publish(&mut self, snapshots: &watch::Sender<SessionSnapshot>) {
        if self.store.take_dirty() {
            snapshots.send_replace(self.store.snapshot());
        }
    }

    /// The processing loop. Every message is handled to completion before the
    /// next one is taken; the snapshot is published before a command's reply.
    pub async fn run(
        mut self,
        mut messages: mpsc::UnboundedReceiver<SessionMessage>,
        snapshots: watch::Sender<SessionSnapshot>,
    ) {
        info!("Bluetooth session started");
        while let Some(message) = messages.recv().await {
            match message {
                SessionMessage::Platform(event) => {
                    self.handle_event(event);
                    self.publish(&snapshots);
                }
                SessionMessage::Command(command, reply) => {
                    let result = self.execute(command);
                    if let Err(e) = &result {
                        warn!("Command rejected: {}", e);
                    }
                    self.publish(&snapshots);
                    let _ = reply.send(result);
                }
                SessionMessage::RescanTick(generation) => {
                    self.on_rescan_tick(generation);
                    self.publish(&snapshots);
                }
                SessionMessage::Shutdown(done) => {
                    self.shutdown();
                    self.publish(&snapshots);
                    let _ = done.send(());
                    break;
                }
            }
        }
        info!("Bluetooth session ended");
    }
}

impl AdapterEventSink for BluetoothManager {
    fn on_power_state(&mut self, state: PowerState) {
        match self.adapter.on_power_state(&mut self.store, state) {
            PowerAction::None => {}
            PowerAction::StartScan => {
                if let Err(e) = self.scanner.start_scan(&mut self.store, self.platform.as_ref()) {
                    warn!("Failed to start scan: {}", e);
                }
            }
            PowerAction::PowerDown => {
                self.stop_scan();
                if self.store.connection().is_engaged() {
                    self.disconnect();
                }
            }
        }
    }

    fn on_advertisement(
        &mut self,
        peripheral: PeripheralId,
        platform_name: Option<String>,
        address: Option<String>,
        advertisement: AdvertisementFields,
        rssi: i16,
    ) {
        self.scanner.on_advertisement(
            &mut self.store,
            peripheral,
            platform_name,
            address,
            advertisement,
            rssi,
        );
    }

    fn on_connected(&mut self, peripheral: PeripheralId) {
        if let Some(enumerator) =
            self.connection_manager
                .on_connected(&mut self.store, self.platform.as_ref(), peripheral)
        {
            self.topology = Some(enumerator);
        }
    }

    fn on_connect_failed(&mut self, peripheral: PeripheralId, reason: String) {
        self.connection_manager
            .on_connect_failed(&mut self.store, peripheral, reason);
    }

    fn on_disconnected(&mut self, peripheral: PeripheralId, reason: Option<String>) {
        if self
            .connection_manager
            .on_disconnected(&mut self.store, peripheral, reason)
        {
            self.topology = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::connection::ConnectionState;
    use crate::core::bluetooth::constants::*;
    use crate::core::bluetooth::mock::{ManualTimer, MockPlatform, PlatformCall};

    fn manager() -> (BluetoothManager, MockPlatform) {
        let platform = MockPlatform::new();
        let manager = BluetoothManager::new(
            &AppConfig::default(),
            Arc::new(platform.clone()),
            Box::new(ManualTimer::new()),
        );
        (manager, platform)
    }

    fn advertise(manager: &mut BluetoothManager, id: &str, name: &str) {
        manager.handle_event(PlatformEvent::AdvertisementObserved {
            peripheral: PeripheralId::from(id),
            platform_name: None,
            address: None,
            advertisement: AdvertisementFields {
                local_name: Some(name.to_string()),
                ..Default::default()
            },
            rssi: -60,
        });
    }

    fn connected_manager() -> (BluetoothManager, MockPlatform) {
        let (mut manager, platform) = manager();
        manager.handle_event(PlatformEvent::PowerStateChanged(PowerState::PoweredOn));
        advertise(&mut manager, "x", "AVEO-ZTVL");
        manager.connect(&PeripheralId::from("x")).unwrap();
        manager.handle_event(PlatformEvent::Connected {
            peripheral: PeripheralId::from("x"),
        });
        platform.take_calls();
        (manager, platform)
    }

    #[test]
    fn test_power_on_auto_starts_scan() {
        let (mut manager, platform) = manager();
        manager.handle_event(PlatformEvent::PowerStateChanged(PowerState::PoweredOn));
        assert!(manager.store().powered());
        assert!(manager.store().scanning());
        assert_eq!(platform.calls(), vec![PlatformCall::StartDiscovery(vec![])]);
    }

    #[test]
    fn test_connect_stops_scan_and_blocks_auto_start() {
        let (mut manager, platform) = manager();
        manager.handle_event(PlatformEvent::PowerStateChanged(PowerState::PoweredOn));
        advertise(&mut manager, "x", "AVEO-ZTVL");
        platform.take_calls();

        manager.connect(&PeripheralId::from("x")).unwrap();
        assert!(!manager.store().scanning());
        assert_eq!(
            platform.take_calls(),
            vec![PlatformCall::StopDiscovery, PlatformCall::Connect(PeripheralId::from("x"))]
        );

        manager.handle_event(PlatformEvent::Connected {
            peripheral: PeripheralId::from("x"),
        });
        platform.take_calls();

        manager.handle_event(PlatformEvent::PowerStateChanged(PowerState::PoweredOn));
        assert!(!manager.store().scanning());
        assert!(platform.calls().is_empty());
    }

    #[test]
    fn test_power_off_stops_scan_and_disconnects() {
        let (mut manager, platform) = connected_manager();
        manager.handle_event(PlatformEvent::PowerStateChanged(PowerState::PoweredOff));

        assert!(!manager.store().powered());
        assert!(!manager.store().scanning());
        assert_eq!(manager.store().connection(), &ConnectionState::Disconnected);
        assert!(platform
            .calls()
            .contains(&PlatformCall::CancelConnection(PeripheralId::from("x"))));
    }

    #[test]
    fn test_late_events_after_disconnect_are_dropped() {
        let (mut manager, _platform) = connected_manager();
        manager.disconnect();

        manager.handle_event(PlatformEvent::ServicesDiscovered {
            peripheral: PeripheralId::from("x"),
            services: Some(vec![ServiceInfo {
                handle: ServiceHandle(1),
                uuid: UUID_DEVICE_INFORMATION_SERVICE,
            }]),
            error: None,
        });
        assert!(manager.store().services().is_empty());
    }

    #[test]
    fn test_events_for_other_peripherals_are_dropped() {
        let (mut manager, platform) = connected_manager();
        manager.handle_event(PlatformEvent::ServicesDiscovered {
            peripheral: PeripheralId::from("other"),
            services: Some(vec![ServiceInfo {
                handle: ServiceHandle(1),
                uuid: UUID_DEVICE_INFORMATION_SERVICE,
            }]),
            error: None,
        });
        assert!(manager.store().services().is_empty());
        assert!(platform.calls().is_empty());
    }

    #[test]
    fn test_start_scan_drops_the_connection() {
        let (mut manager, platform) = connected_manager();
        manager.start_scan().unwrap();

        assert!(manager.store().scanning());
        assert!(!manager.store().connected());
        assert_eq!(
            platform.calls(),
            vec![
                PlatformCall::CancelConnection(PeripheralId::from("x")),
                PlatformCall::StartDiscovery(vec![]),
            ]
        );
    }

    #[test]
    fn test_commands_are_rejected_when_unpowered() {
        let (mut manager, platform) = manager();
        assert_eq!(manager.execute(SessionCommand::StartScan), Err(BleError::AdapterUnavailable));
        assert_eq!(
            manager.execute(SessionCommand::Connect(PeripheralId::from("x"))),
            Err(BleError::AdapterUnavailable)
        );
        assert_eq!(manager.execute(SessionCommand::Disconnect), Ok(()));
        assert_eq!(manager.execute(SessionCommand::StopScan), Ok(()));
        assert!(!platform.calls().contains(&PlatformCall::StartDiscovery(vec![])));
    }
}
