//! Known-entity catalog
//! Maps the UUIDs of known services and characteristics to display names and
//! derives a device profile from the services a peripheral exposes.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::bluetooth::constants::*;

/// Low 96 bits of the Bluetooth base UUID 0000xxxx-0000-1000-8000-00805F9B34FB.
const BLUETOOTH_BASE_LOW_BITS: u128 = 0x0000_1000_8000_0080_5f9b_34fb;
const LOW_96_MASK: u128 = (1u128 << 96) - 1;

/// Canonical string form of a UUID: 16- or 32-bit short form for SIG assigned
/// numbers, otherwise the uppercase hyphenated form.
pub fn canonical_uuid(uuid: &Uuid) -> String {
    let value = uuid.as_u128();
    if value & LOW_96_MASK == BLUETOOTH_BASE_LOW_BITS {
        let short = (value >> 96) as u32;
        if short <= 0xFFFF {
            return format!("{:04X}", short);
        }
        return format!("{:08X}", short);
    }
    uuid.hyphenated().to_string().to_uppercase()
}

/// Expands a 16- or 32-bit SIG assigned number onto the Bluetooth base UUID.
fn short_uuid(short: u32) -> Uuid {
    Uuid::from_u128(((short as u128) << 96) | BLUETOOTH_BASE_LOW_BITS)
}

/// Normalizes a UUID string in any accepted spelling to its canonical form.
pub fn canonical_uuid_str(uuid: &str) -> String {
    let trimmed = uuid.trim();
    let is_short = matches!(trimmed.len(), 4 | 8) && trimmed.chars().all(|c| c.is_ascii_hexdigit());
    if is_short {
        if let Ok(short) = u32::from_str_radix(trimmed, 16) {
            return canonical_uuid(&short_uuid(short));
        }
    }
    match Uuid::parse_str(trimmed) {
        Ok(parsed) => canonical_uuid(&parsed),
        Err(_) => trimmed.to_uppercase(),
    }
}

/// One lookup table of known identifiers.
#[derive(Debug, Clone)]
pub struct Catalog {
    label: &'static str,
    fallback: &'static str,
    entries: HashMap<String, &'static str>,
}

impl Catalog {
    pub fn new<I>(label: &'static str, fallback: &'static str, entries: I) -> Self
    where
        I: IntoIterator<Item = (Uuid, &'static str)>,
    {
        let entries = entries
            .into_iter()
            .map(|(uuid, name)| (canonical_uuid(&uuid), name))
            .collect();
        Self {
            label,
            fallback,
            entries,
        }
    }

    /// Case-insensitive lookup on the canonical string form.
    pub fn lookup(&self, uuid: &str) -> Option<&'static str> {
        self.entries.get(&canonical_uuid_str(uuid)).copied()
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn fallback(&self) -> &'static str {
        self.fallback
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn uuids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Name of `uuid` in `table`, or the table's "unnamed" fallback.
pub fn classify(uuid: &str, table: &Catalog) -> &'static str {
    table.lookup(uuid).unwrap_or(table.fallback())
}

/// Product names of the light modules, in product-number order (1-based).
const LIGHT_PRODUCTS: [&str; 20] = [
    "ZipTip VL",
    "ZipTip Daylite",
    "ZipTip Galactica",
    "PosiStrobe",
    "PosiStrobe CL",
    "PowerBurst",
    "Ultra Galactica",
    "Ultra Daylite",
    "Engage Strobe",
    "MicroBurst",
    "Beacon Red",
    "Beacon White",
    "Tail Strobe",
    "Wing Tip Left",
    "Wing Tip Right",
    "Taxi Light Module",
    "Wig-Wag Controller",
    "Logo Light",
    "Ice Inspection Light",
    "Cabin Light",
];

/// Service UUID of the light product with the given 1-based number.
pub fn light_product_service(number: u16) -> Uuid {
    Uuid::from_u128(LIGHT_PRODUCT_SERVICE_BASE | ((number as u128) << 96))
}

/// All catalogs the session classifies against.
pub struct KnownEntityCatalog {
    services: Catalog,
    landing_lights: Catalog,
    anti_collision_lights: Catalog,
    board_led: Catalog,
    device_information: Catalog,
}

static KNOWN_ENTITIES: LazyLock<KnownEntityCatalog> = LazyLock::new(KnownEntityCatalog::build);

/// The process-wide, read-only catalog.
pub fn known_entities() -> &'static KnownEntityCatalog {
    &KNOWN_ENTITIES
}

impl KnownEntityCatalog {
    fn build() -> Self {
        let mut services = vec![
            (UUID_GENERIC_ACCESS_SERVICE, "Generic Access"),
            (UUID_DEVICE_INFORMATION_SERVICE, "Device Information"),
            (UUID_BATTERY_SERVICE, "Battery Service"),
            (UUID_BOARD_LED_SERVICE, "Board LED"),
            (UUID_LANDING_LIGHTS_SERVICE, "Landing Lights"),
            (UUID_ANTI_COLLISION_SERVICE, "Anti-Collision Lights"),
        ];
        services.extend(
            LIGHT_PRODUCTS
                .iter()
                .enumerate()
                .map(|(index, name)| (light_product_service(index as u16 + 1), *name)),
        );

        Self {
            services: Catalog::new("services", UNNAMED_SERVICE, services),
            landing_lights: Catalog::new(
                "landing lights",
                UNNAMED_CHARACTERISTIC,
                [
                    (UUID_LANDING_LIGHT_CHAR, "Landing Light"),
                    (UUID_TAXI_LIGHT_CHAR, "Taxi Light"),
                    (UUID_WIG_WAG_CHAR, "Wig-Wag"),
                    (UUID_RECOGNITION_LIGHT_CHAR, "Recognition Light"),
                    (UUID_LANDING_BRIGHTNESS_CHAR, "Landing Light Brightness"),
                ],
            ),
            anti_collision_lights: Catalog::new(
                "anti-collision lights",
                UNNAMED_CHARACTERISTIC,
                [
                    (UUID_STROBE_CHAR, "Strobe"),
                    (UUID_BEACON_CHAR, "Beacon"),
                    (UUID_POSITION_LIGHT_CHAR, "Position Light"),
                    (UUID_STROBE_PATTERN_CHAR, "Strobe Pattern"),
                    (UUID_ANTI_COLLISION_MASTER_CHAR, "Anti-Collision Master"),
                ],
            ),
            board_led: Catalog::new(
                "board LED",
                UNNAMED_CHARACTERISTIC,
                [(UUID_BOARD_LED_CHAR, "Board LED")],
            ),
            device_information: Catalog::new(
                "device information",
                UNNAMED_CHARACTERISTIC,
                [
                    (UUID_DEVICE_NAME, "Device Name"),
                    (UUID_BATTERY_LEVEL, "Battery Level"),
                    (UUID_MANUFACTURER_NAME, "Manufacturer Name"),
                    (UUID_MODEL_NUMBER, "Model Number"),
                    (UUID_SERIAL_NUMBER, "Serial Number"),
                    (UUID_FIRMWARE_REVISION, "Firmware Revision"),
                    (UUID_HARDWARE_REVISION, "Hardware Revision"),
                    (UUID_SOFTWARE_REVISION, "Software Revision"),
                ],
            ),
        }
    }

    pub fn services(&self) -> &Catalog {
        &self.services
    }

    /// Characteristic catalogs in the order they are consulted.
    pub fn characteristic_tables(&self) -> [&Catalog; 4] {
        [
            &self.landing_lights,
            &self.anti_collision_lights,
            &self.board_led,
            &self.device_information,
        ]
    }

    pub fn service_name(&self, uuid: &Uuid) -> &'static str {
        classify(&canonical_uuid(uuid), &self.services)
    }

    pub fn characteristic_name(&self, uuid: &Uuid) -> &'static str {
        let key = canonical_uuid(uuid);
        self.characteristic_tables()
            .iter()
            .find_map(|table| table.lookup(&key))
            .unwrap_or(UNNAMED_CHARACTERISTIC)
    }

    /// Every known service UUID, used to narrow service discovery.
    pub fn known_service_uuids(&self) -> Vec<Uuid> {
        let mut uuids = vec![
            UUID_GENERIC_ACCESS_SERVICE,
            UUID_DEVICE_INFORMATION_SERVICE,
            UUID_BATTERY_SERVICE,
            UUID_BOARD_LED_SERVICE,
            UUID_LANDING_LIGHTS_SERVICE,
            UUID_ANTI_COLLISION_SERVICE,
        ];
        uuids.extend((1..=LIGHT_PRODUCTS.len() as u16).map(light_product_service));
        uuids
    }
}

/// What kind of lighting hardware a connected peripheral is, judged by the
/// known services it exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceProfile {
    Generic,
    BoardLed,
    LandingLights,
    AntiCollisionLights,
    /// Both landing and anti-collision services on one module
    LightingSuite,
}

impl DeviceProfile {
    pub fn from_services<'a, I>(services: I) -> Self
    where
        I: IntoIterator<Item = &'a Uuid>,
    {
        let (mut landing, mut anti_collision, mut board_led) = (false, false, false);
        for uuid in services {
            landing |= *uuid == UUID_LANDING_LIGHTS_SERVICE;
            anti_collision |= *uuid == UUID_ANTI_COLLISION_SERVICE;
            board_led |= *uuid == UUID_BOARD_LED_SERVICE;
        }
        match (landing, anti_collision, board_led) {
            (true, true, _) => DeviceProfile::LightingSuite,
            (true, false, _) => DeviceProfile::LandingLights,
            (false, true, _) => DeviceProfile::AntiCollisionLights,
            (false, false, true) => DeviceProfile::BoardLed,
            (false, false, false) => DeviceProfile::Generic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_uuid_short_and_long_forms() {
        assert_eq!(canonical_uuid(&UUID_DEVICE_INFORMATION_SERVICE), "180A");
        assert_eq!(
            canonical_uuid(&UUID_BOARD_LED_SERVICE),
            "19B10000-E8F2-537E-4F6C-D104768A1214"
        );
        assert_eq!(
            canonical_uuid(&Uuid::from_u128(0x12345678_0000_1000_8000_00805f9b34fb)),
            "12345678"
        );
        assert_eq!(canonical_uuid_str("0000180a-0000-1000-8000-00805f9b34fb"), "180A");
        assert_eq!(canonical_uuid_str(" 180a "), "180A");
        assert_eq!(canonical_uuid_str("0000180a"), "180A");
        assert_eq!(canonical_uuid_str("12345678"), "12345678");
        assert_eq!(canonical_uuid_str("+18a"), "+18A");
    }

    #[test]
    fn test_classify_services() {
        let services = known_entities().services();
        assert_eq!(classify("180A", services), "Device Information");
        assert_eq!(classify("180a", services), classify("180A", services));
        assert_eq!(classify("0000180A", services), "Device Information");
        assert_eq!(
            classify("0000180A-0000-1000-8000-00805F9B34FB", services),
            "Device Information"
        );
        assert_eq!(
            classify("0000FFFF-0000-1000-8000-00805F9B34FB", services),
            "Unnamed Service"
        );
        assert_eq!(
            classify("19b10000-e8f2-537e-4f6c-d104768a1214", services),
            "Board LED"
        );
    }

    #[test]
    fn test_light_products_are_catalogued() {
        let catalog = known_entities();
        assert_eq!(catalog.service_name(&light_product_service(1)), "ZipTip VL");
        assert_eq!(catalog.service_name(&light_product_service(20)), "Cabin Light");
        assert_eq!(
            canonical_uuid(&light_product_service(1)),
            "A0E30001-7E5B-4C3A-9D1E-2F6B8A0C5D10"
        );
        assert_eq!(catalog.known_service_uuids().len(), 26);
        assert_eq!(catalog.services().len(), 26);
    }

    #[test]
    fn test_characteristic_priority_and_fallback() {
        let catalog = known_entities();
        assert_eq!(catalog.characteristic_name(&UUID_LANDING_LIGHT_CHAR), "Landing Light");
        assert_eq!(catalog.characteristic_name(&UUID_STROBE_CHAR), "Strobe");
        assert_eq!(catalog.characteristic_name(&UUID_BOARD_LED_CHAR), "Board LED");
        assert_eq!(catalog.characteristic_name(&UUID_MANUFACTURER_NAME), "Manufacturer Name");
        assert_eq!(
            catalog.characteristic_name(&Uuid::from_u128(0xdead_beef)),
            "Unnamed Characteristic"
        );
        let labels: Vec<&str> = catalog
            .characteristic_tables()
            .iter()
            .map(|t| t.label())
            .collect();
        assert_eq!(labels[0], "landing lights");
        assert_eq!(labels[1], "anti-collision lights");
    }

    #[test]
    fn test_device_profile_from_services() {
        assert_eq!(DeviceProfile::from_services(std::iter::empty::<&Uuid>()), DeviceProfile::Generic);
        assert_eq!(
            DeviceProfile::from_services(&[UUID_DEVICE_INFORMATION_SERVICE, UUID_BOARD_LED_SERVICE]),
            DeviceProfile::BoardLed
        );
        assert_eq!(
            DeviceProfile::from_services(&[UUID_LANDING_LIGHTS_SERVICE]),
            DeviceProfile::LandingLights
        );
        assert_eq!(
            DeviceProfile::from_services(&[UUID_ANTI_COLLISION_SERVICE, UUID_LANDING_LIGHTS_SERVICE]),
            DeviceProfile::LightingSuite
        );
    }
}
