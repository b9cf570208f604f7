//! GATT table as reported by service discovery.

use uuid::Uuid;

use crate::core::WriteMode;
use crate::core::constants::{
    CCCD_UUID, DEFAULT_NOTIFY_CHARACTERISTIC_UUID, DEFAULT_SERVICE_UUID,
    DEFAULT_WRITE_CHARACTERISTIC_UUID,
};

/// Identifiers the engine needs on the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GattProfile {
    /// Primary service.
    pub service: Uuid,
    /// Peer -> host characteristic.
    pub notify_characteristic: Uuid,
    /// Host -> peer characteristic.
    pub write_characteristic: Uuid,
    /// Notification configuration descriptor on the notify characteristic.
    pub cccd: Uuid,
}

impl Default for GattProfile {
    fn default() -> Self {
        Self {
            service: DEFAULT_SERVICE_UUID,
            notify_characteristic: DEFAULT_NOTIFY_CHARACTERISTIC_UUID,
            write_characteristic: DEFAULT_WRITE_CHARACTERISTIC_UUID,
            cccd: CCCD_UUID,
        }
    }
}

/// A discovered characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattCharacteristic {
    /// Characteristic UUID.
    pub uuid: Uuid,
    /// Supports write requests.
    pub write: bool,
    /// Supports write commands.
    pub write_without_response: bool,
    /// Supports notifications.
    pub notify: bool,
    /// Descriptor UUIDs.
    pub descriptors: Vec<Uuid>,
}

impl GattCharacteristic {
    /// Characteristic with no properties and no descriptors.
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            write: false,
            write_without_response: false,
            notify: false,
            descriptors: Vec::new(),
        }
    }

    /// Write mode to use on this characteristic.
    pub fn write_mode(&self) -> WriteMode {
        if self.write_without_response {
            WriteMode::NoAck
        } else {
            WriteMode::AckRequired
        }
    }

    /// Whether `descriptor` is present.
    pub fn has_descriptor(&self, descriptor: Uuid) -> bool {
        self.descriptors.contains(&descriptor)
    }
}

/// A discovered service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    /// Service UUID.
    pub uuid: Uuid,
    /// Its characteristics.
    pub characteristics: Vec<GattCharacteristic>,
}

impl GattService {
    /// Look up a characteristic.
    pub fn characteristic(&self, uuid: Uuid) -> Option<&GattCharacteristic> {
        self.characteristics.iter().find(|c| c.uuid == uuid)
    }

    /// The service a peer running `profile` exposes: a write characteristic
    /// (request and command) and a notify characteristic with its CCCD.
    pub fn for_profile(profile: &GattProfile) -> Self {
        let write = GattCharacteristic {
            write: true,
            write_without_response: true,
            ..GattCharacteristic::new(profile.write_characteristic)
        };
        let notify = GattCharacteristic {
            notify: true,
            descriptors: vec![profile.cccd],
            ..GattCharacteristic::new(profile.notify_characteristic)
        };
        Self {
            uuid: profile.service,
            characteristics: vec![write, notify],
        }
    }
}
