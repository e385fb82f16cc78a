//! DS18B20 digital thermometer protocol on top of [`OneWireBus`].
//!
//! One temperature reading is the sequence reset, address, CONVERT-T, a
//! resolution-sized wait, then reset, address, READ-SCRATCHPAD and decode.
//! The driver never retries; transport and integrity failures surface as
//! [`Error`] values for the host loop to handle.

use byteorder::{ByteOrder, LittleEndian};
use embedded_hal::delay::DelayNs;

use crate::{Device, Error, IoWire, OneWireBus, OpCode, RomCode, Sensor};
use core::fmt::Debug;

/// DS18B20 function commands, valid after ROM-level addressing.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Command {
    ConvertT = 0x44,
    WriteScratchpad = 0x4E,
    ReadScratchpad = 0xBE,
}

impl OpCode for Command {
    fn op_code(&self) -> u8 {
        *self as _
    }
}

/// Conversion resolution, bits 5-6 of the configuration register.
///
/// Lower resolutions convert faster but leave the low bits of the raw
/// reading undefined; see [`Resolution::lsb_mask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Resolution {
    Bits9 = 0b00,
    Bits10 = 0b01,
    Bits11 = 0b10,
    Bits12 = 0b11,
}

impl Resolution {
    /// Resolution bit positions within the configuration register.
    pub const CONFIG_MASK: u8 = 0b0110_0000;

    /// Milliseconds a conversion takes, `ceil(93.75ms * 2^(bits - 9))`.
    ///
    /// Reading the scratchpad earlier than this after CONVERT-T yields the
    /// previous conversion's value.
    pub fn time_ms(&self) -> u16 {
        match self {
            Resolution::Bits9 => 94,
            Resolution::Bits10 => 188,
            Resolution::Bits11 => 375,
            Resolution::Bits12 => 750,
        }
    }

    /// Mask clearing the undefined low bits of the temperature LSB.
    pub fn lsb_mask(&self) -> u8 {
        match self {
            Resolution::Bits9 => 0xF8,
            Resolution::Bits10 => 0xFC,
            Resolution::Bits11 => 0xFE,
            Resolution::Bits12 => 0xFF,
        }
    }

    pub fn bits(&self) -> u8 {
        9 + *self as u8
    }

    /// Decodes the resolution stored in a configuration register byte.
    pub fn from_configuration(byte: u8) -> Self {
        match (byte & Self::CONFIG_MASK) >> 5 {
            0b00 => Resolution::Bits9,
            0b01 => Resolution::Bits10,
            0b10 => Resolution::Bits11,
            _ => Resolution::Bits12,
        }
    }

    /// Encodes this resolution into a configuration register byte,
    /// preserving the non-resolution bits of `configuration`.
    pub fn apply_to_configuration(&self, configuration: u8) -> u8 {
        (configuration & !Self::CONFIG_MASK) | ((*self as u8) << 5)
    }
}

/// One 9-byte scratchpad image, copied out of the device per read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct Scratchpad {
    raw: [u8; 9],
}

impl From<[u8; 9]> for Scratchpad {
    fn from(raw: [u8; 9]) -> Self {
        Scratchpad { raw }
    }
}

impl AsRef<[u8]> for Scratchpad {
    fn as_ref(&self) -> &[u8] {
        &self.raw
    }
}

impl Scratchpad {
    pub const BYTES: usize = 9;

    /// Raw temperature count exactly as transmitted, undefined low bits
    /// included.
    pub fn raw_temperature(&self) -> u16 {
        LittleEndian::read_u16(&self.raw[0..2])
    }

    /// Raw temperature count with the undefined low bits cleared according
    /// to the resolution the scratchpad itself reports.
    pub fn masked_temperature(&self) -> u16 {
        let masked = [self.raw[0] & self.resolution().lsb_mask(), self.raw[1]];
        LittleEndian::read_u16(&masked)
    }

    pub fn trigger_high(&self) -> u8 {
        self.raw[2]
    }

    pub fn trigger_low(&self) -> u8 {
        self.raw[3]
    }

    pub fn configuration(&self) -> u8 {
        self.raw[4]
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::from_configuration(self.configuration())
    }

    pub fn crc(&self) -> u8 {
        self.raw[8]
    }

    /// Checks the stored CRC against a CRC-8 of bytes 0..=7.
    pub fn validate<E: Debug>(&self) -> Result<(), Error<E>> {
        let computed = crate::crc8(0, &self.raw[..8]);
        if computed != self.crc() {
            Err(Error::CrcMismatch {
                computed,
                stored: self.crc(),
            })
        } else {
            Ok(())
        }
    }
}

/// DS18B20 driver, parameterized by addressing mode.
///
/// [`Ds18b20::solo`] broadcasts with SKIP-ROM and is only correct with a
/// single device wired; [`Device::get_single`] or
/// [`Device::from_rom_code`] bind to one ROM code with MATCH-ROM so more
/// devices can share the bus later.
#[derive(Debug, Clone, Copy)]
pub struct Ds18b20 {
    rom: Option<RomCode>,
    resolution: Resolution,
    crc_check: bool,
}

impl Ds18b20 {
    /// SKIP-ROM driver for a bus with exactly one device wired.
    pub fn solo() -> Self {
        Self {
            rom: None,
            resolution: Resolution::Bits12,
            crc_check: true,
        }
    }

    /// MATCH-ROM driver for the device with the given ROM code.
    pub fn new<E: Sized + Debug>(rom: RomCode) -> Result<Self, Error<E>> {
        Self::from_rom_code(rom)
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Whether scratchpad reads are CRC-gated.
    pub fn crc_check(&self) -> bool {
        self.crc_check
    }

    /// Toggles scratchpad CRC enforcement.
    ///
    /// Enabled (the default), a corrupted frame is a hard
    /// [`Error::CrcMismatch`]; disabled, frames are decoded as received.
    pub fn set_crc_check(&mut self, enabled: bool) {
        self.crc_check = enabled;
    }

    /// Issues CONVERT-T. The scratchpad must not be read for at least
    /// [`Resolution::time_ms`] milliseconds afterwards.
    pub fn start_conversion<W: IoWire>(
        &self,
        bus: &mut OneWireBus<W>,
        delay: &mut impl DelayNs,
    ) -> Result<Resolution, Error<W::Error>> {
        let cmd = [Command::ConvertT.op_code()];
        match &self.rom {
            Some(rom) => bus.reset_select_write_only(delay, rom, &cmd)?,
            None => bus.reset_skip_write_only(delay, &cmd)?,
        }
        Ok(self.resolution)
    }

    /// Reads the 9-byte scratchpad, CRC-gated when enabled.
    pub fn read_scratchpad<W: IoWire>(
        &self,
        bus: &mut OneWireBus<W>,
        delay: &mut impl DelayNs,
    ) -> Result<Scratchpad, Error<W::Error>> {
        let cmd = [Command::ReadScratchpad.op_code()];
        let mut raw = [0u8; Scratchpad::BYTES];
        match &self.rom {
            Some(rom) => bus.reset_select_write_read(delay, rom, &cmd, &mut raw)?,
            None => bus.reset_skip_write_read(delay, &cmd, &mut raw)?,
        }
        let scratchpad = Scratchpad::from(raw);
        if self.crc_check {
            scratchpad.validate()?;
        }
        Ok(scratchpad)
    }

    /// Raw temperature count in 1/16 degC units, low bits masked per the
    /// configured resolution.
    pub fn read_raw_temperature<W: IoWire>(
        &self,
        bus: &mut OneWireBus<W>,
        delay: &mut impl DelayNs,
    ) -> Result<u16, Error<W::Error>> {
        self.read_scratchpad(bus, delay)
            .map(|scratchpad| scratchpad.masked_temperature())
    }

    /// Last converted temperature in degrees Celsius.
    pub fn read_temperature<W: IoWire>(
        &self,
        bus: &mut OneWireBus<W>,
        delay: &mut impl DelayNs,
    ) -> Result<f32, Error<W::Error>> {
        self.read_raw_temperature(bus, delay).map(raw_to_celsius)
    }

    /// Runs one full reading: trigger, conversion-sized blocking wait, read.
    ///
    /// Holds the bus borrow for the whole span, so on a mutex-shared bus
    /// the conversion cannot be clobbered by another reset.
    pub fn measure_temperature<W: IoWire>(
        &self,
        bus: &mut OneWireBus<W>,
        delay: &mut impl DelayNs,
    ) -> Result<f32, Error<W::Error>> {
        let resolution = self.start_conversion(bus, delay)?;
        delay.delay_ms(resolution.time_ms() as u32);
        self.read_temperature(bus, delay)
    }

    /// Reconfigures the conversion resolution.
    ///
    /// WRITE-SCRATCHPAD only accepts the three writable bytes, so the
    /// current trigger thresholds are read back first and retransmitted
    /// unchanged.
    pub fn set_resolution<W: IoWire>(
        &mut self,
        bus: &mut OneWireBus<W>,
        delay: &mut impl DelayNs,
        resolution: Resolution,
    ) -> Result<(), Error<W::Error>> {
        let scratchpad = self.read_scratchpad(bus, delay)?;
        let configuration = resolution.apply_to_configuration(scratchpad.configuration());
        let cmd = [
            Command::WriteScratchpad.op_code(),
            scratchpad.trigger_high(),
            scratchpad.trigger_low(),
            configuration,
        ];
        match &self.rom {
            Some(rom) => bus.reset_select_write_only(delay, rom, &cmd)?,
            None => bus.reset_skip_write_only(delay, &cmd)?,
        }
        self.resolution = resolution;
        Ok(())
    }
}

impl Device for Ds18b20 {
    const FAMILY_CODE: u8 = 0x28;

    fn rom_code(&self) -> Option<&RomCode> {
        self.rom.as_ref()
    }

    unsafe fn from_rom_code_unchecked(rom: RomCode) -> Self {
        Self {
            rom: Some(rom),
            resolution: Resolution::Bits12,
            crc_check: true,
        }
    }
}

impl Sensor for Ds18b20 {
    fn start_measurement<W: IoWire>(
        &self,
        bus: &mut OneWireBus<W>,
        delay: &mut impl DelayNs,
    ) -> Result<u16, Error<W::Error>> {
        Ok(self.start_conversion(bus, delay)?.time_ms())
    }

    fn read_measurement<W: IoWire>(
        &self,
        bus: &mut OneWireBus<W>,
        delay: &mut impl DelayNs,
    ) -> Result<f32, Error<W::Error>> {
        self.read_temperature(bus, delay)
    }

    fn read_measurement_raw<W: IoWire>(
        &self,
        bus: &mut OneWireBus<W>,
        delay: &mut impl DelayNs,
    ) -> Result<u16, Error<W::Error>> {
        self.read_raw_temperature(bus, delay)
    }
}

/// Raw 1/16 degC two's-complement count to degrees Celsius.
pub fn raw_to_celsius(raw: u16) -> f32 {
    raw as i16 as f32 / 16.0
}

/// Split raw u16 value to two parts: integer and fraction N
/// Original value may be calculated as: integer + fraction/10000
pub fn split_temp(temperature: u16) -> (i16, i16) {
    if temperature < 0x8000 {
        (temperature as i16 >> 4, (temperature as i16 & 0xF) * 625)
    } else {
        let abs = -(temperature as i16);
        (-(abs >> 4), -625 * (abs & 0xF))
    }
}
