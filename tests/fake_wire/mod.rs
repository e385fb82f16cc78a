//! Virtual-time behavioral model of a DS18B20 hanging off a bit-banged
//! 1-Wire pin.
//!
//! The model sits behind [`IoWire`] and [`DelayNs`]: delays advance a
//! virtual clock, pin edges are decoded into reset pulses and read/write
//! time slots, and slots are decoded into ROM and function commands. Every
//! slot is also recorded in an event log so tests can assert on the exact
//! traffic a driver produced.

// not every test binary uses every helper
#![allow(dead_code)]

use onewire_ds18b20::{crc8, IoWire};

use core::convert::Infallible;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A valid DS18B20 (family 0x28) ROM code.
pub fn sample_rom() -> [u8; 8] {
    rom_with_family(0x28)
}

/// A valid ROM code from some other device family.
pub fn foreign_rom() -> [u8; 8] {
    rom_with_family(0x10)
}

pub fn rom_with_family(family: u8) -> [u8; 8] {
    let mut rom = [family, 0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0xF6, 0x00];
    rom[7] = crc8(0, &rom[..7]);
    rom
}

/// One decoded bus-level event, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Reset,
    /// Master wrote this bit in a write slot
    WriteBit(bool),
    /// Master sampled this bit in a read slot
    ReadBit(bool),
}

/// Splits an event log into transactions, one per reset pulse.
pub fn transactions(log: &[Event]) -> Vec<Vec<Event>> {
    let mut out: Vec<Vec<Event>> = Vec::new();
    for event in log {
        if *event == Event::Reset {
            out.push(vec![*event]);
        } else if let Some(current) = out.last_mut() {
            current.push(*event);
        }
    }
    out
}

/// Reassembles the bytes the master wrote within one transaction,
/// LSB-first like the wire.
pub fn written_bytes(events: &[Event]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut byte = 0u8;
    let mut bits = 0;
    for event in events {
        if let Event::WriteBit(bit) = event {
            byte |= (*bit as u8) << bits;
            bits += 1;
            if bits == 8 {
                out.push(byte);
                byte = 0;
                bits = 0;
            }
        }
    }
    out
}

// Slot decoding thresholds, all in virtual nanoseconds. A low pulse past
// the reset threshold is a reset; below it, short means a one.
const WRITE_ONE_MAX_NS: u64 = 20_000;
const RESET_MIN_NS: u64 = 240_000;
const PRESENCE_START_NS: u64 = 15_000;
const PRESENCE_END_NS: u64 = 75_000;
const TX_PULL_NS: u64 = 45_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviceState {
    /// Addressed by reset, expecting a ROM command
    Rom,
    /// Comparing an incoming MATCH-ROM code byte by byte
    MatchRom { index: usize },
    /// Addressed, expecting a function command
    Function,
    /// Receiving the three writable scratchpad bytes
    WriteScratchpad { index: usize },
    /// Answering read slots from the transmit queue
    Transmit,
    /// Ignoring traffic until the next reset
    Inactive,
}

pub struct DeviceModel {
    rom: [u8; 8],
    scratchpad: [u8; 9],
    corrupt_crc: bool,
    state: DeviceState,
    rx: u8,
    rx_bits: u8,
    tx: VecDeque<bool>,
    pull_from: u64,
    pull_until: u64,
    convert_done_at: Option<u64>,
    next_raw: u16,
}

impl DeviceModel {
    fn new(rom: [u8; 8]) -> Self {
        // power-on scratchpad: 85.0 degC, default triggers, 12-bit
        let mut scratchpad = [0x50, 0x05, 0x4B, 0x46, 0x7F, 0xFF, 0x00, 0x10, 0];
        scratchpad[8] = crc8(0, &scratchpad[..8]);
        DeviceModel {
            rom,
            scratchpad,
            corrupt_crc: false,
            state: DeviceState::Inactive,
            rx: 0,
            rx_bits: 0,
            tx: VecDeque::new(),
            pull_from: 0,
            pull_until: 0,
            convert_done_at: None,
            next_raw: 0x0550,
        }
    }

    fn refresh_crc(&mut self) {
        self.scratchpad[8] = crc8(0, &self.scratchpad[..8]);
        if self.corrupt_crc {
            self.scratchpad[8] ^= 0x5A;
        }
    }

    // datasheet maximum conversion time for the configured resolution
    fn conversion_time_ns(&self) -> u64 {
        match (self.scratchpad[4] >> 5) & 0b11 {
            0b00 => 93_750_000,
            0b01 => 187_500_000,
            0b10 => 375_000_000,
            _ => 750_000_000,
        }
    }

    fn load_tx_bytes(&mut self, bytes: &[u8]) {
        for byte in bytes {
            for bit in 0..8 {
                self.tx.push_back((byte >> bit) & 1 == 1);
            }
        }
    }

    fn on_byte(&mut self, byte: u8, now: u64) {
        match self.state {
            DeviceState::Rom => match byte {
                0xCC => self.state = DeviceState::Function,
                0x55 => self.state = DeviceState::MatchRom { index: 0 },
                0x33 => {
                    let rom = self.rom;
                    self.load_tx_bytes(&rom);
                    self.state = DeviceState::Transmit;
                }
                _ => self.state = DeviceState::Inactive,
            },
            DeviceState::MatchRom { index } => {
                if byte == self.rom[index] {
                    self.state = if index + 1 == 8 {
                        DeviceState::Function
                    } else {
                        DeviceState::MatchRom { index: index + 1 }
                    };
                } else {
                    self.state = DeviceState::Inactive;
                }
            }
            DeviceState::Function => match byte {
                0x44 => {
                    self.convert_done_at = Some(now + self.conversion_time_ns());
                    self.state = DeviceState::Inactive;
                }
                0xBE => {
                    self.refresh_crc();
                    let scratchpad = self.scratchpad;
                    self.load_tx_bytes(&scratchpad);
                    self.state = DeviceState::Transmit;
                }
                0x4E => self.state = DeviceState::WriteScratchpad { index: 0 },
                _ => self.state = DeviceState::Inactive,
            },
            DeviceState::WriteScratchpad { index } => {
                self.scratchpad[2 + index] = byte;
                if index + 1 == 3 {
                    self.refresh_crc();
                    self.state = DeviceState::Inactive;
                } else {
                    self.state = DeviceState::WriteScratchpad { index: index + 1 };
                }
            }
            DeviceState::Transmit | DeviceState::Inactive => {}
        }
    }
}

pub struct WireState {
    now: u64,
    master_low: bool,
    fell_at: u64,
    stuck_low: bool,
    device: Option<DeviceModel>,
    log: Vec<Event>,
}

impl WireState {
    fn advance(&mut self, ns: u64) {
        self.now += ns;
        if let Some(dev) = self.device.as_mut() {
            if let Some(done) = dev.convert_done_at {
                if self.now >= done {
                    let raw = dev.next_raw.to_le_bytes();
                    dev.scratchpad[0] = raw[0];
                    dev.scratchpad[1] = raw[1];
                    dev.refresh_crc();
                    dev.convert_done_at = None;
                }
            }
        }
    }

    fn on_release(&mut self) {
        let dur = self.now - self.fell_at;
        let now = self.now;
        let fell_at = self.fell_at;

        if dur >= RESET_MIN_NS {
            self.log.push(Event::Reset);
            if let Some(dev) = self.device.as_mut() {
                dev.state = DeviceState::Rom;
                dev.rx = 0;
                dev.rx_bits = 0;
                dev.tx.clear();
                dev.pull_from = now + PRESENCE_START_NS;
                dev.pull_until = now + PRESENCE_END_NS;
            }
            return;
        }

        match self.device.as_mut() {
            None => self.log.push(Event::WriteBit(dur < WRITE_ONE_MAX_NS)),
            Some(dev) => {
                if dev.state == DeviceState::Transmit {
                    let bit = dev.tx.pop_front().unwrap_or(true);
                    if !bit {
                        dev.pull_from = fell_at;
                        dev.pull_until = fell_at + TX_PULL_NS;
                    }
                    if dev.tx.is_empty() {
                        dev.state = DeviceState::Inactive;
                    }
                    self.log.push(Event::ReadBit(bit));
                } else {
                    let bit = dur < WRITE_ONE_MAX_NS;
                    self.log.push(Event::WriteBit(bit));
                    if dev.state != DeviceState::Inactive {
                        dev.rx |= (bit as u8) << dev.rx_bits;
                        dev.rx_bits += 1;
                        if dev.rx_bits == 8 {
                            let byte = dev.rx;
                            dev.rx = 0;
                            dev.rx_bits = 0;
                            dev.on_byte(byte, now);
                        }
                    }
                }
            }
        }
    }

    fn line_is_high(&self) -> bool {
        if self.stuck_low || self.master_low {
            return false;
        }
        if let Some(dev) = &self.device {
            if self.now >= dev.pull_from && self.now < dev.pull_until {
                return false;
            }
        }
        true
    }

    fn drive_low(&mut self) {
        if !self.master_low {
            self.master_low = true;
            self.fell_at = self.now;
        }
    }

    fn release(&mut self) {
        if self.master_low {
            self.master_low = false;
            self.on_release();
        }
    }
}

/// Handle to the shared wire, implementing [`IoWire`] directly.
#[derive(Clone)]
pub struct FakeWire {
    state: Arc<Mutex<WireState>>,
}

impl FakeWire {
    fn build(stuck_low: bool, device: Option<DeviceModel>) -> Self {
        FakeWire {
            state: Arc::new(Mutex::new(WireState {
                now: 0,
                master_low: false,
                fell_at: 0,
                stuck_low,
                device,
                log: Vec::new(),
            })),
        }
    }

    /// A wire with one modeled DS18B20 attached.
    pub fn with_device(rom: [u8; 8]) -> Self {
        Self::build(false, Some(DeviceModel::new(rom)))
    }

    /// A pulled-up wire with nothing attached.
    pub fn empty() -> Self {
        Self::build(false, None)
    }

    /// A shorted wire that never floats high.
    pub fn stuck_low() -> Self {
        Self::build(true, None)
    }

    /// A delay provider driving this wire's virtual clock.
    pub fn delay(&self) -> FakeDelay {
        FakeDelay {
            state: self.state.clone(),
        }
    }

    /// An embedded-hal pin view of the same wire, for the tuple adapters.
    pub fn pin(&self) -> FakePin {
        FakePin {
            state: self.state.clone(),
        }
    }

    pub fn log(&self) -> Vec<Event> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn clear_log(&self) {
        self.state.lock().unwrap().log.clear();
    }

    /// Raw value the next completed conversion will latch.
    pub fn set_next_temperature(&self, raw: u16) {
        self.state
            .lock()
            .unwrap()
            .device
            .as_mut()
            .expect("no device on wire")
            .next_raw = raw;
    }

    /// Makes the device emit scratchpad frames with a broken CRC byte.
    pub fn set_corrupt_crc(&self, corrupt: bool) {
        self.state
            .lock()
            .unwrap()
            .device
            .as_mut()
            .expect("no device on wire")
            .corrupt_crc = corrupt;
    }

    pub fn scratchpad(&self) -> [u8; 9] {
        self.state
            .lock()
            .unwrap()
            .device
            .as_ref()
            .expect("no device on wire")
            .scratchpad
    }
}

impl IoWire for FakeWire {
    type Error = Infallible;

    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.state.lock().unwrap().line_is_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.state.lock().unwrap().line_is_high())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.state.lock().unwrap().drive_low();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.state.lock().unwrap().release();
        Ok(())
    }
}

/// The same wire exposed as an embedded-hal input+output pin.
pub struct FakePin {
    state: Arc<Mutex<WireState>>,
}

impl ErrorType for FakePin {
    type Error = Infallible;
}

impl InputPin for FakePin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.state.lock().unwrap().line_is_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.state.lock().unwrap().line_is_high())
    }
}

impl OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.state.lock().unwrap().drive_low();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.state.lock().unwrap().release();
        Ok(())
    }
}

pub struct FakeDelay {
    state: Arc<Mutex<WireState>>,
}

impl DelayNs for FakeDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.state.lock().unwrap().advance(ns as u64);
    }
}
