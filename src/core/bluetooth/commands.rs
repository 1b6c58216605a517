//! Light module commands
//! Binary light characteristics take a single byte: 0x01 turns the light on,
//! 0x00 turns it off.

use log::{debug, info};

use crate::core::bluetooth::constants::{LIGHT_OFF, LIGHT_ON};
use crate::core::bluetooth::platform::BlePlatform;
use crate::core::bluetooth::store::StateStore;
use crate::core::bluetooth::types::{CharacteristicHandle, CharacteristicRecord, PeripheralId, WriteKind};
use crate::error::BleError;
use crate::utils::to_hex;

/// Light commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightCommand {
    /// Turn the light off (0x00)
    Off,
    /// Turn the light on (0x01)
    On,
}

impl LightCommand {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Off => vec![LIGHT_OFF],
            Self::On => vec![LIGHT_ON],
        }
    }

    /// The command that flips a light whose cached value is `read_value`.
    /// Anything other than "01", including a value never read, counts as off.
    pub fn toggled_from(read_value: &str) -> Self {
        if read_value == to_hex(&[LIGHT_ON]) {
            Self::Off
        } else {
            Self::On
        }
    }
}

/// Issues writes, reads and subscriptions on characteristics of the connected peripheral.
pub struct ToggleController {
    read_back: bool,
}

impl ToggleController {
    pub fn new(read_back: bool) -> Self {
        Self { read_back }
    }

    fn target<'a>(
        store: &'a StateStore,
        handle: CharacteristicHandle,
    ) -> Result<(PeripheralId, &'a CharacteristicRecord), BleError> {
        if !store.connected() {
            return Err(BleError::NotConnected);
        }
        let peripheral = store.active_peripheral().cloned().ok_or(BleError::NotConnected)?;
        let characteristic = store
            .characteristic(handle)
            .ok_or(BleError::UnknownCharacteristic(handle))?;
        Ok((peripheral, characteristic))
    }

    /// Writes the flipped value without acknowledgement, then optionally
    /// reads it back. The read-back may still observe the old value.
    pub fn toggle(
        &self,
        store: &StateStore,
        platform: &dyn BlePlatform,
        handle: CharacteristicHandle,
    ) -> Result<LightCommand, BleError> {
        let (peripheral, characteristic) = Self::target(store, handle)?;
        if !characteristic.capabilities.can_write() {
            return Err(BleError::WriteUnsupported(handle));
        }
        let command = LightCommand::toggled_from(&characteristic.read_value);

        info!("Sending {:?} to {} ({})", command, characteristic.name, handle);
        platform.write_characteristic(&peripheral, handle, command.to_bytes(), WriteKind::WithoutResponse);
        if self.read_back {
            platform.read_characteristic(&peripheral, handle);
        }
        Ok(command)
    }

    pub fn read_value(
        &self,
        store: &StateStore,
        platform: &dyn BlePlatform,
        handle: CharacteristicHandle,
    ) -> Result<(), BleError> {
        let (peripheral, _) = Self::target(store, handle)?;
        debug!("Reading {}", handle);
        platform.read_characteristic(&peripheral, handle);
        Ok(())
    }

    pub fn set_notify(
        &self,
        store: &StateStore,
        platform: &dyn BlePlatform,
        handle: CharacteristicHandle,
        enabled: bool,
    ) -> Result<(), BleError> {
        let (peripheral, characteristic) = Self::target(store, handle)?;
        if enabled && !characteristic.capabilities.can_subscribe() {
            return Err(BleError::NotifyUnsupported(handle));
        }
        platform.set_notify(&peripheral, handle, enabled);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::connection::ConnectionState;
    use crate::core::bluetooth::mock::{MockPlatform, PlatformCall};
    use crate::core::bluetooth::types::{CharacteristicCapabilities, ServiceHandle};

    fn connected_store(read_value: &str) -> StateStore {
        let mut store = StateStore::new();
        store.set_connection(ConnectionState::Connected(PeripheralId::from("x")));
        store.push_characteristic(CharacteristicRecord {
            handle: CharacteristicHandle(10),
            service: ServiceHandle(1),
            uuid: crate::core::bluetooth::constants::UUID_BOARD_LED_CHAR,
            name: "Board LED".to_string(),
            description: String::new(),
            read_value: read_value.to_string(),
            capabilities: CharacteristicCapabilities {
                read: true,
                write_without_response: true,
                ..Default::default()
            },
            notifying: false,
        });
        store
    }

    #[test]
    fn test_toggled_from() {
        assert_eq!(LightCommand::toggled_from("01"), LightCommand::Off);
        assert_eq!(LightCommand::toggled_from("00"), LightCommand::On);
        assert_eq!(LightCommand::toggled_from(""), LightCommand::On);
        assert_eq!(LightCommand::toggled_from("0001"), LightCommand::On);
        assert_eq!(LightCommand::On.to_bytes(), vec![0x01]);
        assert_eq!(LightCommand::Off.to_bytes(), vec![0x00]);
    }

    #[test]
    fn test_toggle_writes_then_reads_back() {
        let platform = MockPlatform::new();
        let store = connected_store("01");
        let controller = ToggleController::new(true);

        assert_eq!(
            controller.toggle(&store, &platform, CharacteristicHandle(10)),
            Ok(LightCommand::Off)
        );
        let x = PeripheralId::from("x");
        assert_eq!(
            platform.calls(),
            vec![
                PlatformCall::WriteCharacteristic(x.clone(), CharacteristicHandle(10), vec![0x00], WriteKind::WithoutResponse),
                PlatformCall::ReadCharacteristic(x, CharacteristicHandle(10)),
            ]
        );
    }

    #[test]
    fn test_toggle_without_read_back() {
        let platform = MockPlatform::new();
        let store = connected_store("");
        let controller = ToggleController::new(false);

        controller.toggle(&store, &platform, CharacteristicHandle(10)).unwrap();
        assert_eq!(
            platform.calls(),
            vec![PlatformCall::WriteCharacteristic(
                PeripheralId::from("x"),
                CharacteristicHandle(10),
                vec![0x01],
                WriteKind::WithoutResponse
            )]
        );
    }

    #[test]
    fn test_rejections() {
        let platform = MockPlatform::new();
        let controller = ToggleController::new(true);

        let store = StateStore::new();
        assert_eq!(
            controller.toggle(&store, &platform, CharacteristicHandle(10)),
            Err(BleError::NotConnected)
        );

        let mut connecting = StateStore::new();
        connecting.set_connection(ConnectionState::Connecting(PeripheralId::from("x")));
        assert_eq!(
            controller.read_value(&connecting, &platform, CharacteristicHandle(10)),
            Err(BleError::NotConnected)
        );

        let store = connected_store("00");
        assert_eq!(
            controller.read_value(&store, &platform, CharacteristicHandle(11)),
            Err(BleError::UnknownCharacteristic(CharacteristicHandle(11)))
        );
        assert_eq!(
            controller.set_notify(&store, &platform, CharacteristicHandle(10), true),
            Err(BleError::NotifyUnsupported(CharacteristicHandle(10)))
        );
        assert!(platform.calls().is_empty());
    }

    #[test]
    fn test_toggle_rejects_read_only_characteristic() {
        let platform = MockPlatform::new();
        let controller = ToggleController::new(true);
        let mut store = connected_store("01");
        store.push_characteristic(CharacteristicRecord {
            handle: CharacteristicHandle(11),
            service: ServiceHandle(1),
            uuid: crate::core::bluetooth::constants::UUID_BOARD_LED_CHAR,
            name: "Board LED".to_string(),
            description: String::new(),
            read_value: "01".to_string(),
            capabilities: CharacteristicCapabilities {
                read: true,
                notify: true,
                ..Default::default()
            },
            notifying: false,
        });

        assert_eq!(
            controller.toggle(&store, &platform, CharacteristicHandle(11)),
            Err(BleError::WriteUnsupported(CharacteristicHandle(11)))
        );
        assert!(platform.calls().is_empty());

        // a plain write capability is enough
        let mut write_only = connected_store("");
        write_only.push_characteristic(CharacteristicRecord {
            handle: CharacteristicHandle(12),
            service: ServiceHandle(1),
            uuid: crate::core::bluetooth::constants::UUID_BOARD_LED_CHAR,
            name: "Board LED".to_string(),
            description: String::new(),
            read_value: String::new(),
            capabilities: CharacteristicCapabilities {
                write: true,
                ..Default::default()
            },
            notifying: false,
        });
        assert_eq!(
            controller.toggle(&write_only, &platform, CharacteristicHandle(12)),
            Ok(LightCommand::On)
        );
    }
}
