use log::{debug, info};

use crate::config::scan_config::ScanConfig;
use crate::core::bluetooth::constants::UNKNOWN_DEVICE_NAME;
use crate::core::bluetooth::platform::BlePlatform;
use crate::core::bluetooth::store::{Sighting, StateStore};
use crate::core::bluetooth::timer::RescanTimer;
use crate::core::bluetooth::types::*;
use crate::error::BleError;

/// Display name of an advertising peripheral: advertised local name, then
/// the name the platform has cached, then a placeholder.
pub fn resolve_name(advertised: Option<&str>, platform_name: Option<&str>) -> String {
    advertised
        .filter(|name| !name.is_empty())
        .or(platform_name.filter(|name| !name.is_empty()))
        .unwrap_or(UNKNOWN_DEVICE_NAME)
        .to_string()
}

pub struct BluetoothScanner {
    config: ScanConfig,
    timer: Box<dyn RescanTimer>,
    /// Bumped on every start and stop; ticks from an older generation are stale.
    generation: u64,
}

impl BluetoothScanner {
    pub fn new(config: ScanConfig, timer: Box<dyn RescanTimer>) -> Self {
        Self {
            config,
            timer,
            generation: 0,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Starts a new scan session. The peripheral list is cleared and the
    /// periodic restart timer is re-armed, replacing any earlier one.
    pub fn start_scan(&mut self, store: &mut StateStore, platform: &dyn BlePlatform) -> Result<(), BleError> {
        if !store.powered() {
            return Err(BleError::AdapterUnavailable);
        }

        self.generation += 1;
        store.set_scanning(true);
        store.clear_peripherals();
        platform.start_discovery(&self.config.service_filter);

        self.timer.cancel();
        self.timer.arm(self.config.rescan_interval(), self.generation);
        info!("Device scan started.");
        Ok(())
    }

    /// Stops scanning. Always safe to call.
    pub fn stop_scan(&mut self, store: &mut StateStore, platform: &dyn BlePlatform) {
        self.generation += 1;
        self.timer.cancel();
        platform.stop_discovery();
        if store.scanning() {
            store.set_scanning(false);
            info!("Device scan stopped.");
        }
    }

    /// Restarts discovery if the tick belongs to the running scan session.
    pub fn on_rescan_tick(&mut self, store: &StateStore, platform: &dyn BlePlatform, generation: u64) {
        if generation != self.generation || !store.scanning() {
            debug!("Ignoring stale rescan tick (generation {})", generation);
            return;
        }
        debug!("Restarting discovery");
        platform.stop_discovery();
        platform.start_discovery(&self.config.service_filter);
    }

    /// Records an advertisement. Returns `None` when it was filtered out.
    pub fn on_advertisement(
        &mut self,
        store: &mut StateStore,
        peripheral: PeripheralId,
        platform_name: Option<String>,
        address: Option<String>,
        advertisement: AdvertisementFields,
        rssi: i16,
    ) -> Option<Sighting> {
        if !store.scanning() {
            debug!("Advertisement from {} outside a scan session, ignoring", peripheral);
            return None;
        }

        let name = resolve_name(advertisement.local_name.as_deref(), platform_name.as_deref());
        if !self.config.is_allowed(&name) {
            debug!("Device {} ({}) not in allow-list", name, peripheral);
            return None;
        }

        debug!("Found device - ID: {}, Name: {}, RSSI: {}", peripheral, name, rssi);
        let sighting = store.record_sighting(PeripheralRecord {
            id: peripheral,
            name,
            address,
            rssi,
            advertisement,
        });
        Some(sighting)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::core::bluetooth::mock::{ManualTimer, MockPlatform, PlatformCall, TimerCall};

    fn scanner(config: ScanConfig) -> (BluetoothScanner, ManualTimer) {
        let timer = ManualTimer::new();
        (BluetoothScanner::new(config, Box::new(timer.clone())), timer)
    }

    fn named(name: &str) -> AdvertisementFields {
        AdvertisementFields {
            local_name: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn powered_store() -> StateStore {
        let mut store = StateStore::new();
        store.set_powered(true);
        store
    }

    #[test]
    fn test_resolve_name_priority() {
        assert_eq!(resolve_name(Some("AVEO-ZTVL"), Some("cached")), "AVEO-ZTVL");
        assert_eq!(resolve_name(None, Some("cached")), "cached");
        assert_eq!(resolve_name(Some(""), None), UNKNOWN_DEVICE_NAME);
        assert_eq!(resolve_name(None, None), UNKNOWN_DEVICE_NAME);
    }

    #[test]
    fn test_start_scan_requires_power() {
        let platform = MockPlatform::new();
        let (mut scanner, timer) = scanner(ScanConfig::default());
        let mut store = StateStore::new();

        assert_eq!(
            scanner.start_scan(&mut store, &platform),
            Err(BleError::AdapterUnavailable)
        );
        assert!(!store.scanning());
        assert!(platform.calls().is_empty());
        assert!(timer.calls().is_empty());
    }

    #[test]
    fn test_restart_replaces_the_timer() {
        let platform = MockPlatform::new();
        let (mut scanner, timer) = scanner(ScanConfig::default());
        let mut store = powered_store();

        scanner.start_scan(&mut store, &platform).unwrap();
        scanner.start_scan(&mut store, &platform).unwrap();

        let interval = Duration::from_millis(2000);
        assert_eq!(
            timer.calls(),
            vec![
                TimerCall::Cancel,
                TimerCall::Arm(interval, 1),
                TimerCall::Cancel,
                TimerCall::Arm(interval, 2),
            ]
        );
        assert_eq!(
            platform.calls(),
            vec![PlatformCall::StartDiscovery(vec![]), PlatformCall::StartDiscovery(vec![])]
        );
    }

    #[test]
    fn test_zero_interval_arms_the_default_period() {
        let platform = MockPlatform::new();
        let (mut scanner, timer) = scanner(ScanConfig {
            rescan_interval_ms: 0,
            ..Default::default()
        });
        let mut store = powered_store();

        scanner.start_scan(&mut store, &platform).unwrap();
        assert_eq!(
            timer.calls(),
            vec![TimerCall::Cancel, TimerCall::Arm(Duration::from_millis(2000), 1)]
        );
    }

    #[test]
    fn test_stale_ticks_are_ignored() {
        let platform = MockPlatform::new();
        let (mut scanner, _timer) = scanner(ScanConfig::default());
        let mut store = powered_store();

        scanner.start_scan(&mut store, &platform).unwrap();
        platform.take_calls();

        scanner.on_rescan_tick(&store, &platform, scanner.generation());
        assert_eq!(
            platform.take_calls(),
            vec![PlatformCall::StopDiscovery, PlatformCall::StartDiscovery(vec![])]
        );

        let old = scanner.generation();
        scanner.stop_scan(&mut store, &platform);
        platform.take_calls();
        scanner.on_rescan_tick(&store, &platform, old);
        assert!(platform.calls().is_empty());
    }

    #[test]
    fn test_stop_scan_is_idempotent() {
        let platform = MockPlatform::new();
        let (mut scanner, timer) = scanner(ScanConfig::default());
        let mut store = powered_store();
        let mut changes = store.subscribe();

        scanner.stop_scan(&mut store, &platform);
        scanner.stop_scan(&mut store, &platform);
        assert!(!store.scanning());
        assert!(changes.try_recv().is_err());
        assert_eq!(timer.calls(), vec![TimerCall::Cancel, TimerCall::Cancel]);
    }

    #[test]
    fn test_sightings_are_deduplicated_and_filtered() {
        let platform = MockPlatform::new();
        let (mut scanner, _timer) = scanner(ScanConfig::default());
        let mut store = powered_store();
        scanner.start_scan(&mut store, &platform).unwrap();

        let x = PeripheralId::from("x");
        assert_eq!(
            scanner.on_advertisement(&mut store, x.clone(), None, None, named("AVEO-ZTVL"), -60),
            Some(Sighting::New)
        );
        assert_eq!(
            scanner.on_advertisement(&mut store, x.clone(), None, None, named("AVEO-ZTVL"), -48),
            Some(Sighting::Updated)
        );
        assert_eq!(
            scanner.on_advertisement(&mut store, PeripheralId::from("y"), None, None, named("Headphones"), -40),
            None
        );
        assert_eq!(
            scanner.on_advertisement(&mut store, PeripheralId::from("z"), None, None, AdvertisementFields::default(), -40),
            None
        );

        assert_eq!(store.peripherals().len(), 1);
        assert_eq!(store.peripherals()[0].rssi, -48);
        assert_eq!(store.peripherals()[0].name, "AVEO-ZTVL");
    }

    #[test]
    fn test_empty_allow_list_accepts_everything() {
        let platform = MockPlatform::new();
        let (mut scanner, _timer) = scanner(ScanConfig {
            allowed_devices: Vec::new(),
            ..ScanConfig::default()
        });
        let mut store = powered_store();
        scanner.start_scan(&mut store, &platform).unwrap();

        scanner.on_advertisement(&mut store, PeripheralId::from("z"), None, None, AdvertisementFields::default(), -40);
        scanner.on_advertisement(&mut store, PeripheralId::from("y"), Some("Cached".to_string()), None, AdvertisementFields::default(), -40);

        let names: Vec<&str> = store.peripherals().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec![UNKNOWN_DEVICE_NAME, "Cached"]);
    }

    #[test]
    fn test_new_scan_session_clears_the_list() {
        let platform = MockPlatform::new();
        let (mut scanner, _timer) = scanner(ScanConfig::default());
        let mut store = powered_store();
        scanner.start_scan(&mut store, &platform).unwrap();
        scanner.on_advertisement(&mut store, PeripheralId::from("x"), None, None, named("AVEO-ZTVL"), -60);

        scanner.stop_scan(&mut store, &platform);
        assert_eq!(
            scanner.on_advertisement(&mut store, PeripheralId::from("w"), None, None, named("AVEO-ZTVL"), -60),
            None
        );
        assert_eq!(store.peripherals().len(), 1);

        scanner.start_scan(&mut store, &platform).unwrap();
        assert!(store.peripherals().is_empty());
    }
}
