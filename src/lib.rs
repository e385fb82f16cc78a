#![no_std]
#![doc = include_str!("../README.md")]

mod bus;
mod command;
mod device;
#[cfg(feature = "ds18b20")]
pub mod ds18b20;
mod iowire;
mod result;
mod rom;
mod sensor;

pub use bus::OneWireBus;
pub use command::{OpCode, RomCommand};
pub use device::Device;
pub use iowire::{Inverted, IoWire};
pub use result::Error;
pub use rom::RomCode;
pub use sensor::Sensor;

/// CRC-8/MAXIM accumulator (polynomial 0x31, reflected).
///
/// Feeding a whole frame whose trailing byte is the CRC of the preceding
/// bytes yields `0`; that is how both ROM codes and scratchpads are
/// validated.
pub fn crc8(seed: u8, data: &[u8]) -> u8 {
    let mut crc = seed;
    for byte in data.iter() {
        let mut byte = *byte;
        for _ in 0..8 {
            let mix = (crc ^ byte) & 0x01;
            crc >>= 1;
            if mix != 0x00 {
                crc ^= 0x8C;
            }
            byte >>= 1;
        }
    }
    crc
}
