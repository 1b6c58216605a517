//! Core functionality for LightLink
//! This module contains the BLE session core for the lighting modules

pub mod bluetooth;

// Re-export commonly used types
pub use bluetooth::{BluetoothManager, SessionHandle};
