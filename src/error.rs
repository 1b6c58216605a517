//! Errors returned to callers of session commands.
//!
//! Asynchronous failures reported by the radio (connect failed, read or write
//! errors) never travel through this type. They are logged where they are
//! observed and the store is left in a defined state.

use thiserror::Error;

use crate::core::bluetooth::types::{CharacteristicHandle, PeripheralId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BleError {
    #[error("bluetooth radio is not powered on")]
    AdapterUnavailable,

    #[error("already connected to {0}")]
    AlreadyConnected(PeripheralId),

    #[error("unknown peripheral: {0}")]
    UnknownPeripheral(PeripheralId),

    #[error("no peripheral connected")]
    NotConnected,

    #[error("unknown characteristic: {0}")]
    UnknownCharacteristic(CharacteristicHandle),

    #[error("characteristic {0} is not writable")]
    WriteUnsupported(CharacteristicHandle),

    #[error("characteristic {0} does not support notifications")]
    NotifyUnsupported(CharacteristicHandle),

    #[error("session has shut down")]
    SessionClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ble_error_display() {
        let err = BleError::AlreadyConnected(PeripheralId::from("AA:BB"));
        assert_eq!(err.to_string(), "already connected to AA:BB");

        let err = BleError::UnknownCharacteristic(CharacteristicHandle(7));
        assert_eq!(err.to_string(), "unknown characteristic: #7");

        let err = BleError::WriteUnsupported(CharacteristicHandle(7));
        assert_eq!(err.to_string(), "characteristic #7 is not writable");

        assert_eq!(
            BleError::AdapterUnavailable.to_string(),
            "bluetooth radio is not powered on"
        );
    }
}
