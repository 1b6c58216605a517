//! Recording stand-ins for the radio and the rescan timer.
//! Nothing is sent anywhere; every request is appended to a call log that
//! tests inspect, and tests feed completions back as `PlatformEvent`s.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;

use crate::core::bluetooth::platform::BlePlatform;
use crate::core::bluetooth::timer::RescanTimer;
use crate::core::bluetooth::types::*;

/// One request issued to the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    StartDiscovery(Vec<Uuid>),
    StopDiscovery,
    Connect(PeripheralId),
    CancelConnection(PeripheralId),
    DiscoverServices {
        peripheral: PeripheralId,
        filter: Vec<Uuid>,
    },
    DiscoverCharacteristics(PeripheralId, ServiceHandle),
    DiscoverDescriptors(PeripheralId, CharacteristicHandle),
    ReadCharacteristic(PeripheralId, CharacteristicHandle),
    WriteCharacteristic(PeripheralId, CharacteristicHandle, Vec<u8>, WriteKind),
    ReadDescriptor(PeripheralId, CharacteristicHandle, DescriptorHandle),
    SetNotify(PeripheralId, CharacteristicHandle, bool),
}

#[derive(Debug, Clone, Default)]
pub struct MockPlatform {
    calls: Arc<Mutex<Vec<PlatformCall>>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: PlatformCall) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Returns the recorded calls and clears the log.
    pub fn take_calls(&self) -> Vec<PlatformCall> {
        std::mem::take(&mut *self.calls.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl BlePlatform for MockPlatform {
    fn start_discovery(&self, service_filter: &[Uuid]) {
        self.record(PlatformCall::StartDiscovery(service_filter.to_vec()));
    }

    fn stop_discovery(&self) {
        self.record(PlatformCall::StopDiscovery);
    }

    fn connect(&self, peripheral: &PeripheralId) {
        self.record(PlatformCall::Connect(peripheral.clone()));
    }

    fn cancel_connection(&self, peripheral: &PeripheralId) {
        self.record(PlatformCall::CancelConnection(peripheral.clone()));
    }

    fn discover_services(&self, peripheral: &PeripheralId, filter: &[Uuid]) {
        self.record(PlatformCall::DiscoverServices {
            peripheral: peripheral.clone(),
            filter: filter.to_vec(),
        });
    }

    fn discover_characteristics(&self, peripheral: &PeripheralId, service: ServiceHandle) {
        self.record(PlatformCall::DiscoverCharacteristics(peripheral.clone(), service));
    }

    fn discover_descriptors(&self, peripheral: &PeripheralId, characteristic: CharacteristicHandle) {
        self.record(PlatformCall::DiscoverDescriptors(peripheral.clone(), characteristic));
    }

    fn read_characteristic(&self, peripheral: &PeripheralId, characteristic: CharacteristicHandle) {
        self.record(PlatformCall::ReadCharacteristic(peripheral.clone(), characteristic));
    }

    fn write_characteristic(
        &self,
        peripheral: &PeripheralId,
        characteristic: CharacteristicHandle,
        value: Vec<u8>,
        kind: WriteKind,
    ) {
        self.record(PlatformCall::WriteCharacteristic(
            peripheral.clone(),
            characteristic,
            value,
            kind,
        ));
    }

    fn read_descriptor(
        &self,
        peripheral: &PeripheralId,
        characteristic: CharacteristicHandle,
        descriptor: DescriptorHandle,
    ) {
        self.record(PlatformCall::ReadDescriptor(
            peripheral.clone(),
            characteristic,
            descriptor,
        ));
    }

    fn set_notify(&self, peripheral: &PeripheralId, characteristic: CharacteristicHandle, enabled: bool) {
        self.record(PlatformCall::SetNotify(peripheral.clone(), characteristic, enabled));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCall {
    Arm(Duration, u64),
    Cancel,
}

/// Timer that never fires on its own; tests post `RescanTick`s themselves.
#[derive(Debug, Clone, Default)]
pub struct ManualTimer {
    calls: Arc<Mutex<Vec<TimerCall>>>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<TimerCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Generation of the most recent arm, if the timer is armed.
    pub fn armed_generation(&self) -> Option<u64> {
        match self.calls().last() {
            Some(TimerCall::Arm(_, generation)) => Some(*generation),
            _ => None,
        }
    }
}

impl RescanTimer for ManualTimer {
    fn arm(&mut self, interval: Duration, generation: u64) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(TimerCall::Arm(interval, generation));
    }

    fn cancel(&mut self) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(TimerCall::Cancel);
    }
}
