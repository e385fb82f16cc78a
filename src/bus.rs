use crate::{Error, IoWire, OpCode, RomCode, RomCommand};
use core::fmt::Debug;
use embedded_hal::delay::DelayNs;

/// Bit-banged 1-Wire bus master.
///
/// Owns its wire exclusively; every transaction takes `&mut self`, so two
/// logical transactions can never interleave on one bus. Device drivers
/// borrow the bus per call and must keep the borrow for the whole
/// reset-address-act span.
pub struct OneWireBus<W: IoWire> {
    wire: W,
}

impl<E: Debug, W: IoWire<Error = E>> OneWireBus<W> {
    pub fn new(wire: W) -> Self {
        OneWireBus { wire }
    }

    /// Releases the underlying wire, e.g. to reconfigure the pin.
    pub fn free(self) -> W {
        self.wire
    }

    /// Performs a reset and listens for a presence pulse.
    ///
    /// Returns `Err(WireFault)` if the wire never floats high beforehand
    /// (shortened or missing pull-up) and `Err(NoDevice)` if nothing
    /// answers the reset. Every transaction starts here.
    pub fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        self.set_high()?;
        self.ensure_wire_high(delay)?;

        self.set_low()?;
        delay.delay_us(480);
        self.set_high()?;

        // presence pulse arrives 15-60us after release and lasts 60-240us
        let mut presence = false;
        for _ in 0..7 {
            delay.delay_us(10);
            presence |= self.is_low()?;
        }
        delay.delay_us(410);
        if presence {
            Ok(())
        } else {
            Err(Error::NoDevice)
        }
    }

    /// Like [`reset`](Self::reset), but reports a missing presence pulse as
    /// `Ok(false)` instead of an error.
    pub fn reset_presence(&mut self, delay: &mut impl DelayNs) -> Result<bool, Error<E>> {
        self.reset(delay).map(|_| true).or_else(|error| {
            if matches!(error, Error::NoDevice) {
                Ok(false)
            } else {
                Err(error)
            }
        })
    }

    fn ensure_wire_high(&mut self, delay: &mut impl DelayNs) -> Result<(), Error<E>> {
        for _ in 0..125 {
            if self.is_high()? {
                return Ok(());
            }
            delay.delay_us(2);
        }
        Err(Error::WireFault)
    }

    /// SKIP-ROM, broadcast addressing for a single-device bus.
    pub fn skip(&mut self, delay: &mut impl DelayNs) -> Result<(), E> {
        self.write_command(delay, RomCommand::SkipRom)
    }

    /// MATCH-ROM, addresses the one device with the given ROM code.
    pub fn select(&mut self, delay: &mut impl DelayNs, rom: &RomCode) -> Result<(), E> {
        self.write_command(delay, RomCommand::MatchRom)?;
        self.write_rom_code(delay, rom)
    }

    /// Transmits the eight bytes of a ROM code.
    pub fn write_rom_code(&mut self, delay: &mut impl DelayNs, rom: &RomCode) -> Result<(), E> {
        self.write_bytes(delay, rom.as_ref())
    }

    /// Reads the ROM code of the only device present (READ-ROM) and
    /// validates its CRC.
    pub fn read_rom(&mut self, delay: &mut impl DelayNs) -> Result<RomCode, Error<E>> {
        let mut rom = RomCode::default();
        self.reset_write_read(delay, &[RomCommand::ReadRom.op_code()], rom.as_mut_slice())?;
        rom.validate()?;
        Ok(rom)
    }

    pub fn reset_write_read(
        &mut self,
        delay: &mut impl DelayNs,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Error<E>> {
        self.reset(delay)?;
        self.write_bytes(delay, write)?;
        self.read_bytes(delay, read)?;
        Ok(())
    }

    pub fn reset_skip_write_only(
        &mut self,
        delay: &mut impl DelayNs,
        write: &[u8],
    ) -> Result<(), Error<E>> {
        self.reset(delay)?;
        self.skip(delay)?;
        self.write_bytes(delay, write)?;
        Ok(())
    }

    pub fn reset_skip_write_read(
        &mut self,
        delay: &mut impl DelayNs,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Error<E>> {
        self.reset(delay)?;
        self.skip(delay)?;
        self.write_bytes(delay, write)?;
        self.read_bytes(delay, read)?;
        Ok(())
    }

    pub fn reset_select_write_only(
        &mut self,
        delay: &mut impl DelayNs,
        rom: &RomCode,
        write: &[u8],
    ) -> Result<(), Error<E>> {
        self.reset(delay)?;
        self.select(delay, rom)?;
        self.write_bytes(delay, write)?;
        Ok(())
    }

    pub fn reset_select_write_read(
        &mut self,
        delay: &mut impl DelayNs,
        rom: &RomCode,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), Error<E>> {
        self.reset(delay)?;
        self.select(delay, rom)?;
        self.write_bytes(delay, write)?;
        self.read_bytes(delay, read)?;
        Ok(())
    }

    pub fn write_command(&mut self, delay: &mut impl DelayNs, cmd: impl OpCode) -> Result<(), E> {
        self.write_byte(delay, cmd.op_code())
    }

    pub fn write_bytes(&mut self, delay: &mut impl DelayNs, bytes: &[u8]) -> Result<(), E> {
        for b in bytes {
            self.write_byte(delay, *b)?;
        }
        Ok(())
    }

    /// Transmits one byte, LSB first.
    pub fn write_byte(&mut self, delay: &mut impl DelayNs, byte: u8) -> Result<(), E> {
        let mut byte = byte;
        for _ in 0..8 {
            self.write_bit(delay, (byte & 0x01) == 0x01)?;
            byte >>= 1;
        }
        Ok(())
    }

    pub fn read_bytes(&mut self, delay: &mut impl DelayNs, dst: &mut [u8]) -> Result<(), E> {
        for d in dst {
            *d = self.read_byte(delay)?;
        }
        Ok(())
    }

    /// Samples one byte, LSB first.
    pub fn read_byte(&mut self, delay: &mut impl DelayNs) -> Result<u8, E> {
        let mut byte = 0_u8;
        for _ in 0..8 {
            byte >>= 1;
            if self.read_bit(delay)? {
                byte |= 0x80;
            }
        }
        Ok(byte)
    }

    // write slot: 60us minimum, low 10us for a one, low 65us for a zero
    pub(crate) fn write_bit(&mut self, delay: &mut impl DelayNs, high: bool) -> Result<(), E> {
        self.set_low()?;
        delay.delay_us(if high { 10 } else { 65 });
        self.set_high()?;
        delay.delay_us(if high { 55 } else { 5 });
        Ok(())
    }

    // read slot: request with a short low pulse, sample within 15us
    pub(crate) fn read_bit(&mut self, delay: &mut impl DelayNs) -> Result<bool, E> {
        self.set_low()?;
        delay.delay_us(3);
        self.set_high()?;
        delay.delay_us(2);
        let val = self.is_high();
        delay.delay_us(61);
        val
    }

    #[inline(always)]
    fn set_high(&mut self) -> Result<(), E> {
        self.wire.set_high()
    }

    #[inline(always)]
    fn set_low(&mut self) -> Result<(), E> {
        self.wire.set_low()
    }

    #[inline(always)]
    fn is_high(&mut self) -> Result<bool, E> {
        self.wire.is_high()
    }

    #[inline(always)]
    fn is_low(&mut self) -> Result<bool, E> {
        self.wire.is_low()
    }
}
