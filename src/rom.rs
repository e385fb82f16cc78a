use crate::{Error, IoWire, OneWireBus};
use core::{
    fmt::{Debug, Display, Formatter, Result as FmtResult},
    ops::{Deref, DerefMut},
    str::FromStr,
};
use embedded_hal::delay::DelayNs;

/// 64-bit ROM code burned into every 1-Wire device.
///
/// Byte 0 is the family code, bytes 1..=6 the serial number and byte 7 a
/// CRC-8 over the first seven bytes.
#[derive(Debug, Clone, Copy, PartialOrd, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct RomCode {
    raw: [u8; 8],
}

impl Default for RomCode {
    fn default() -> Self {
        Self::from([0u8; 8])
    }
}

impl From<[u8; 8]> for RomCode {
    fn from(raw: [u8; 8]) -> Self {
        RomCode { raw }
    }
}

impl From<RomCode> for [u8; 8] {
    fn from(rom: RomCode) -> [u8; 8] {
        rom.raw
    }
}

impl Deref for RomCode {
    type Target = [u8; 8];

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

impl DerefMut for RomCode {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.raw
    }
}

impl AsRef<[u8]> for RomCode {
    fn as_ref(&self) -> &[u8] {
        self.deref() as _
    }
}

impl RomCode {
    /// The length of a ROM code in bytes
    pub const BYTES: u8 = 8;

    /// The length of a ROM code in bits
    pub const BITS: u8 = Self::BYTES * 8;

    pub fn family_code(&self) -> u8 {
        self[0]
    }

    /// The 48-bit serial number part, bytes 1..=6.
    pub fn serial(&self) -> &[u8] {
        &self.raw[1..7]
    }

    /// The stored CRC byte.
    pub fn crc(&self) -> u8 {
        self[7]
    }

    /// Checks the stored CRC against a CRC-8 of the first seven bytes.
    pub fn validate<E: Debug>(&self) -> Result<(), Error<E>> {
        let computed = crate::crc8(0, &self.raw[..7]);
        if computed != self.crc() {
            Err(Error::CrcMismatch {
                computed,
                stored: self.crc(),
            })
        } else {
            Ok(())
        }
    }

    /// Reads the ROM code of the only device on the bus (READ-ROM) and
    /// validates its CRC.
    ///
    /// READ-ROM must not be issued with more than one device wired, the
    /// responses would collide.
    pub fn read_single<W: IoWire>(
        bus: &mut OneWireBus<W>,
        delay: &mut impl DelayNs,
    ) -> Result<Self, Error<W::Error>> {
        bus.read_rom(delay)
    }
}

/// Error type
#[derive(Debug)]
pub enum RomCodeParseError {
    NotEnough,
    Invalid,
}

fn hex_to_u8(c: char) -> Option<u8> {
    if c.is_ascii_digit() {
        Some((c as u32 - '0' as u32) as _)
    } else if ('a'..='f').contains(&c) {
        Some((c as u32 - 'a' as u32 + 10) as _)
    } else if ('A'..='F').contains(&c) {
        Some((c as u32 - 'A' as u32 + 10) as _)
    } else {
        None
    }
}

impl FromStr for RomCode {
    type Err = RomCodeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rom = RomCode::default();
        let mut chars = s.chars().filter(|c| !c.is_whitespace() && *c != ':');

        for i in 0..Self::BYTES as usize {
            match (chars.next(), chars.next()) {
                (Some(h), Some(l)) => match (hex_to_u8(h), hex_to_u8(l)) {
                    (Some(h), Some(l)) => {
                        rom[i] = (h << 4) | l;
                    }
                    _ => return Err(RomCodeParseError::Invalid),
                },
                _ => return Err(RomCodeParseError::NotEnough),
            }
        }

        Ok(rom)
    }
}

impl Display for RomCode {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self[0], self[1], self[2], self[3], self[4], self[5], self[6], self[7],
        )
    }
}
