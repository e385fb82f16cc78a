use crate::{Error, IoWire, OneWireBus, RomCode};
use core::fmt::Debug;
use embedded_hal::delay::DelayNs;

/// Generic device interface
pub trait Device: Sized {
    /// Device family code
    const FAMILY_CODE: u8;

    /// The ROM code this driver addresses with MATCH-ROM, or `None` when it
    /// broadcasts with SKIP-ROM
    fn rom_code(&self) -> Option<&RomCode>;

    /// Instantiate device using a ROM code without checks
    ///
    /// # Safety
    ///
    /// This is marked as unsafe because it does not check whether the given
    /// ROM code belongs to this device family. It assumes so.
    unsafe fn from_rom_code_unchecked(rom: RomCode) -> Self;

    /// Instantiate device from a ROM code, verifying the family code
    fn from_rom_code<E: Sized + Debug>(rom: RomCode) -> Result<Self, Error<E>> {
        if rom.family_code() != Self::FAMILY_CODE {
            Err(Error::FamilyCodeMismatch {
                expected: Self::FAMILY_CODE,
                found: rom.family_code(),
            })
        } else {
            Ok(unsafe { Self::from_rom_code_unchecked(rom) })
        }
    }

    /// Discover the single device on the bus via READ-ROM
    fn get_single<W: IoWire>(
        bus: &mut OneWireBus<W>,
        delay: &mut impl DelayNs,
    ) -> Result<Self, Error<W::Error>> {
        let rom = bus.read_rom(delay)?;
        Self::from_rom_code(rom)
    }
}
