//! The radio operations the session issues.
//! Every call is fire-and-forget: it returns immediately and its outcome is
//! reported later as a [`PlatformEvent`](crate::core::bluetooth::events::PlatformEvent).

use uuid::Uuid;

use crate::core::bluetooth::types::*;

pub trait BlePlatform: Send + Sync {
    /// Starts discovery. An empty filter means every advertising peripheral.
    fn start_discovery(&self, service_filter: &[Uuid]);
    fn stop_discovery(&self);

    fn connect(&self, peripheral: &PeripheralId);
    fn cancel_connection(&self, peripheral: &PeripheralId);

    /// Discovers services, restricted to `filter` when it is not empty.
    fn discover_services(&self, peripheral: &PeripheralId, filter: &[Uuid]);
    fn discover_characteristics(&self, peripheral: &PeripheralId, service: ServiceHandle);
    fn discover_descriptors(&self, peripheral: &PeripheralId, characteristic: CharacteristicHandle);

    fn read_characteristic(&self, peripheral: &PeripheralId, characteristic: CharacteristicHandle);
    fn write_characteristic(
        &self,
        peripheral: &PeripheralId,
        characteristic: CharacteristicHandle,
        value: Vec<u8>,
        kind: WriteKind,
    );
    fn read_descriptor(
        &self,
        peripheral: &PeripheralId,
        characteristic: CharacteristicHandle,
        descriptor: DescriptorHandle,
    );
    fn set_notify(&self, peripheral: &PeripheralId, characteristic: CharacteristicHandle, enabled: bool);
}
