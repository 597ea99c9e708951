//! LED Controller Protocol
//!
//! Packet layout for the Triones-family LED controllers (advertised as
//! `QHM-xxxx`). Every command is a short fixed-size write to the control
//! characteristic:
//!
//! ```text
//! power on   CC 23 33
//! power off  CC 24 33
//! color      56 RR GG BB 00 F0 AA
//! mode       BB MM SS 44          (MM = mode, SS = speed)
//! ```

use crate::domain::led::PowerState;
use anyhow::Result;
use uuid::Uuid;

/// LED control service UUID
pub const SERVICE_UUID: &str = "0000ffd5-0000-1000-8000-00805f9b34fb";

/// Write characteristic UUID - where commands are sent
pub const WRITE_CHAR_UUID: &str = "0000ffd9-0000-1000-8000-00805f9b34fb";

/// Delay after connecting before the first write, in milliseconds
pub const SETTLE_DELAY_MS: u64 = 200;

pub fn power_packet(state: PowerState) -> [u8; 3] {
    match state {
        PowerState::On => [0xCC, 0x23, 0x33],
        PowerState::Off => [0xCC, 0x24, 0x33],
    }
}

/// Color components arrive unvalidated from the serial line; they are
/// clamped here, at the wire boundary.
pub fn color_packet(r: i32, g: i32, b: i32) -> [u8; 7] {
    [0x56, to_byte(r), to_byte(g), to_byte(b), 0x00, 0xF0, 0xAA]
}

pub fn mode_packet(mode: i32, speed: u8) -> [u8; 4] {
    [0xBB, to_byte(mode), speed, 0x44]
}

fn to_byte(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

/// Parse a UUID string from the settings file
pub fn parse_uuid(uuid_str: &str) -> Result<Uuid> {
    Uuid::parse_str(uuid_str.trim())
        .map_err(|e| anyhow::anyhow!("Invalid UUID format {:?}: {}", uuid_str, e))
}
