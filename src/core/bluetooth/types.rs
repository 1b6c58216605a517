//! Defines shared data structures for the Bluetooth module.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::bluetooth::catalog::canonical_uuid;

/// Stable platform identity of a peripheral.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeripheralId(String);

impl PeripheralId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeripheralId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PeripheralId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! native_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "#{}", self.0)
            }
        }
    };
}

native_handle!(
    /// Platform handle of a discovered service, unique for the lifetime of the platform.
    ServiceHandle
);
native_handle!(
    /// Platform handle of a discovered characteristic.
    CharacteristicHandle
);
native_handle!(
    /// Platform handle of a discovered descriptor.
    DescriptorHandle
);

/// Radio power states reported by the platform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerState {
    #[default]
    Unknown,
    Resetting,
    Unsupported,
    Unauthorized,
    PoweredOff,
    PoweredOn,
}

impl PowerState {
    pub fn is_powered_on(self) -> bool {
        self == PowerState::PoweredOn
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManufacturerData {
    pub company_id: u16,
    pub data: Vec<u8>,
}

/// Advertisement payload as last observed for a peripheral.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertisementFields {
    pub local_name: Option<String>,
    pub service_uuids: Vec<Uuid>,
    pub manufacturer_data: Option<ManufacturerData>,
    pub tx_power_level: Option<i16>,
    pub is_connectable: bool,
}

/// A peripheral seen during the current scan session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeripheralRecord {
    pub id: PeripheralId,
    pub name: String,
    /// MAC address when the platform identity embeds one.
    pub address: Option<String>,
    pub rssi: i16,
    pub advertisement: AdvertisementFields,
}

impl PeripheralRecord {
    /// Two-line summary shown under the name in the device list.
    pub fn summary(&self) -> String {
        let services = if self.advertisement.service_uuids.is_empty() {
            "None".to_string()
        } else {
            self.advertisement
                .service_uuids
                .iter()
                .map(canonical_uuid)
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!("ID: {}\nService UUIDs: {}\n", self.id, services)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub handle: ServiceHandle,
    pub uuid: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub handle: ServiceHandle,
    pub uuid: Uuid,
    pub peripheral: PeripheralId,
    pub name: String,
}

/// Operations a characteristic advertises support for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacteristicCapabilities {
    pub broadcast: bool,
    pub read: bool,
    pub write_without_response: bool,
    pub write: bool,
    pub notify: bool,
    pub indicate: bool,
}

impl CharacteristicCapabilities {
    pub fn can_write(&self) -> bool {
        self.write || self.write_without_response
    }

    pub fn can_subscribe(&self) -> bool {
        self.notify || self.indicate
    }
}

impl fmt::Display for CharacteristicCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = [
            (self.broadcast, "broadcast"),
            (self.read, "read"),
            (self.write_without_response, "writeWithoutResponse"),
            (self.write, "write"),
            (self.notify, "notify"),
            (self.indicate, "indicate"),
        ];
        let names: Vec<&str> = flags
            .iter()
            .filter(|(set, _)| *set)
            .map(|(_, name)| *name)
            .collect();
        write!(f, "[{}]", names.join(", "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacteristicInfo {
    pub handle: CharacteristicHandle,
    pub uuid: Uuid,
    pub capabilities: CharacteristicCapabilities,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacteristicRecord {
    pub handle: CharacteristicHandle,
    pub service: ServiceHandle,
    pub uuid: Uuid,
    pub name: String,
    /// Text of the user-description descriptor, empty until it has been read.
    pub description: String,
    /// Last value read or notified, as uppercase hex pairs. Empty until the first read.
    pub read_value: String,
    pub capabilities: CharacteristicCapabilities,
    pub notifying: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorInfo {
    pub handle: DescriptorHandle,
    pub uuid: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteKind {
    WithResponse,
    WithoutResponse,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::constants::UUID_DEVICE_INFORMATION_SERVICE;

    #[test]
    fn test_capabilities_display_lists_set_flags() {
        let caps = CharacteristicCapabilities {
            read: true,
            write_without_response: true,
            notify: true,
            ..Default::default()
        };
        assert_eq!(caps.to_string(), "[read, writeWithoutResponse, notify]");
        assert!(caps.can_write());
        assert!(caps.can_subscribe());
        assert!(!CharacteristicCapabilities::default().can_write());
    }

    #[test]
    fn test_peripheral_summary() {
        let mut record = PeripheralRecord {
            id: PeripheralId::from("dev-1"),
            name: "AVEO-ZTVL".to_string(),
            address: None,
            rssi: -60,
            advertisement: AdvertisementFields::default(),
        };
        assert_eq!(record.summary(), "ID: dev-1\nService UUIDs: None\n");

        record.advertisement.service_uuids = vec![UUID_DEVICE_INFORMATION_SERVICE];
        assert_eq!(record.summary(), "ID: dev-1\nService UUIDs: 180A\n");
    }
}
