//! Bluetooth functionality for LightLink
//! This module handles all bluetooth operations including scanning,
//! connecting, enumerating and controlling the lighting modules.

pub mod adapter;
pub mod bluest_platform;
pub mod catalog;
pub mod commands;
pub mod connection;
pub mod constants;
pub mod events;
pub mod handle;
pub mod manager;
pub mod mock;
pub mod notification;
pub mod platform;
pub mod scanner;
pub mod store;
pub mod timer;
pub mod topology;
pub mod types;

// Re-export types that should be publicly accessible
pub use bluest_platform::BluestPlatform;
pub use catalog::{DeviceProfile, classify, known_entities};
pub use commands::{LightCommand, ToggleController};
pub use connection::{ConnectionManager, ConnectionState};
pub use events::{AdapterEventSink, EventSender, PeripheralEventSink, PlatformEvent};
pub use handle::{
    LightingSession, SessionCommand, SessionHandle, SessionQueue, spawn_session,
    start_bluest_session,
};
pub use manager::BluetoothManager;
pub use platform::BlePlatform;
pub use scanner::BluetoothScanner;
pub use store::{SessionSnapshot, StateStore, StoreChange};
pub use timer::{RescanTimer, TokioRescanTimer};
pub use types::*;
