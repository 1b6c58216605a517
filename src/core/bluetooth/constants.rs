//! Constants used throughout the application
//! UUIDs of the standard and vendor services the lighting modules expose,
//! timing defaults and the placeholder names used when nothing better is known.

use uuid::Uuid;

/// Standard Bluetooth Service UUIDs
pub const UUID_GENERIC_ACCESS_SERVICE: Uuid = Uuid::from_u128(0x00001800_0000_1000_8000_00805f9b34fb);
pub const UUID_DEVICE_INFORMATION_SERVICE: Uuid = Uuid::from_u128(0x0000180a_0000_1000_8000_00805f9b34fb);
pub const UUID_BATTERY_SERVICE: Uuid = Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb);

/// Standard Bluetooth Characteristic UUIDs
pub const UUID_DEVICE_NAME: Uuid = Uuid::from_u128(0x00002a00_0000_1000_8000_00805f9b34fb);
pub const UUID_BATTERY_LEVEL: Uuid = Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);
pub const UUID_MODEL_NUMBER: Uuid = Uuid::from_u128(0x00002a24_0000_1000_8000_00805f9b34fb);
pub const UUID_SERIAL_NUMBER: Uuid = Uuid::from_u128(0x00002a25_0000_1000_8000_00805f9b34fb);
pub const UUID_FIRMWARE_REVISION: Uuid = Uuid::from_u128(0x00002a26_0000_1000_8000_00805f9b34fb);
pub const UUID_HARDWARE_REVISION: Uuid = Uuid::from_u128(0x00002a27_0000_1000_8000_00805f9b34fb);
pub const UUID_SOFTWARE_REVISION: Uuid = Uuid::from_u128(0x00002a28_0000_1000_8000_00805f9b34fb);
pub const UUID_MANUFACTURER_NAME: Uuid = Uuid::from_u128(0x00002a29_0000_1000_8000_00805f9b34fb);

/// Characteristic User Description descriptor (0x2901)
pub const UUID_USER_DESCRIPTION_DESCRIPTOR: Uuid = Uuid::from_u128(0x00002901_0000_1000_8000_00805f9b34fb);

/// Development board LED service and its switch characteristic
pub const UUID_BOARD_LED_SERVICE: Uuid = Uuid::from_u128(0x19b10000_e8f2_537e_4f6c_d104768a1214);
pub const UUID_BOARD_LED_CHAR: Uuid = Uuid::from_u128(0x19b10001_e8f2_537e_4f6c_d104768a1214);

/// Landing light module service
pub const UUID_LANDING_LIGHTS_SERVICE: Uuid = Uuid::from_u128(0xa0e10000_7e5b_4c3a_9d1e_2f6b8a0c5d10);
pub const UUID_LANDING_LIGHT_CHAR: Uuid = Uuid::from_u128(0xa0e10001_7e5b_4c3a_9d1e_2f6b8a0c5d10);
pub const UUID_TAXI_LIGHT_CHAR: Uuid = Uuid::from_u128(0xa0e10002_7e5b_4c3a_9d1e_2f6b8a0c5d10);
pub const UUID_WIG_WAG_CHAR: Uuid = Uuid::from_u128(0xa0e10003_7e5b_4c3a_9d1e_2f6b8a0c5d10);
pub const UUID_RECOGNITION_LIGHT_CHAR: Uuid = Uuid::from_u128(0xa0e10004_7e5b_4c3a_9d1e_2f6b8a0c5d10);
pub const UUID_LANDING_BRIGHTNESS_CHAR: Uuid = Uuid::from_u128(0xa0e10005_7e5b_4c3a_9d1e_2f6b8a0c5d10);

/// Anti-collision light module service
pub const UUID_ANTI_COLLISION_SERVICE: Uuid = Uuid::from_u128(0xa0e20000_7e5b_4c3a_9d1e_2f6b8a0c5d10);
pub const UUID_STROBE_CHAR: Uuid = Uuid::from_u128(0xa0e20001_7e5b_4c3a_9d1e_2f6b8a0c5d10);
pub const UUID_BEACON_CHAR: Uuid = Uuid::from_u128(0xa0e20002_7e5b_4c3a_9d1e_2f6b8a0c5d10);
pub const UUID_POSITION_LIGHT_CHAR: Uuid = Uuid::from_u128(0xa0e20003_7e5b_4c3a_9d1e_2f6b8a0c5d10);
pub const UUID_STROBE_PATTERN_CHAR: Uuid = Uuid::from_u128(0xa0e20004_7e5b_4c3a_9d1e_2f6b8a0c5d10);
pub const UUID_ANTI_COLLISION_MASTER_CHAR: Uuid = Uuid::from_u128(0xa0e20005_7e5b_4c3a_9d1e_2f6b8a0c5d10);

/// Per-product light module services share this base; the product number sits in bits 96..112.
pub const LIGHT_PRODUCT_SERVICE_BASE: u128 = 0xa0e30000_7e5b_4c3a_9d1e_2f6b8a0c5d10;

/// Advertised names of the lighting products this app talks to.
pub const LIGHT_PRODUCT_NAMES: [&str; 20] = [
    "AVEO-ZTVL",
    "AVEO-ZTDL",
    "AVEO-ZTGA",
    "AVEO-PSTB",
    "AVEO-PSCL",
    "AVEO-PWBS",
    "AVEO-ULGA",
    "AVEO-ULDL",
    "AVEO-ENST",
    "AVEO-MCBS",
    "AVEO-BCNR",
    "AVEO-BCNW",
    "AVEO-TLST",
    "AVEO-WTLF",
    "AVEO-WTRT",
    "AVEO-TAXI",
    "AVEO-WGWG",
    "AVEO-LOGO",
    "AVEO-ICEL",
    "AVEO-CABN",
];

/// Name shown for a peripheral that advertises no name and has none cached.
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown Device";
pub const UNNAMED_SERVICE: &str = "Unnamed Service";
pub const UNNAMED_CHARACTERISTIC: &str = "Unnamed Characteristic";

/// Interval between forced scan restarts, in milliseconds
pub const DEFAULT_RESCAN_INTERVAL_MS: u64 = 2000;

/// Value written to switch a binary light characteristic on
pub const LIGHT_ON: u8 = 0x01;
/// Value written to switch a binary light characteristic off
pub const LIGHT_OFF: u8 = 0x00;
