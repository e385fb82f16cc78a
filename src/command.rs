/// Anything that serializes to a single command byte on the wire.
///
/// ROM-level commands and per-family function commands both implement this,
/// so the bus can transmit either without knowing device semantics.
pub trait OpCode {
    fn op_code(&self) -> u8;
}

/// ROM-level addressing commands, valid right after a reset.
///
/// SEARCH-ROM enumeration is intentionally absent; addressing is either
/// broadcast ([`RomCommand::SkipRom`]) or by known code
/// ([`RomCommand::MatchRom`]).
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum RomCommand {
    MatchRom = 0x55,
    SkipRom = 0xCC,
    ReadRom = 0x33,
}

impl OpCode for RomCommand {
    fn op_code(&self) -> u8 {
        *self as _
    }
}
