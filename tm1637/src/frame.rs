//! Display frames and the command sequence that puts them on the chip.
use crate::bus::Bus;
use crate::error::{Tm1637Result, TransactionStep};
use crate::font::{segment_code, SEG_BLANK, SEG_DP};
use log::debug;

/// Number of digits on the display.
pub const NUM_DIGITS: usize = 4;

/// Data command: write to the display registers, auto-incrementing the address.
pub const CMD_DATA_AUTO_INCREMENT: u8 = 0x40;
/// Address command for digit 0. Later digits follow through auto-increment.
pub const CMD_ADDRESS_BASE: u8 = 0xC0;
/// Display control command. The low three bits carry the brightness.
pub const CMD_DISPLAY_CONTROL: u8 = 0x80;
/// Display control bit that switches the display on.
pub const DISPLAY_ON: u8 = 0x08;

/// Builds the display control command byte.
///
/// `brightness` is masked to its three bits; clamping is up to the caller.
pub const fn display_control(on: bool, brightness: u8) -> u8 {
    let mut command = CMD_DISPLAY_CONTROL | (brightness & 0b111);
    if on {
        command |= DISPLAY_ON;
    }
    command
}

/// The four segment codes of one display update, digit 0 first.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Frame([u8; NUM_DIGITS]);

impl Frame {
    pub const BLANK: Frame = Frame([SEG_BLANK; NUM_DIGITS]);

    /// Uses raw segment codes as they are.
    pub const fn from_segments(segments: [u8; NUM_DIGITS]) -> Self {
        Frame(segments)
    }

    /// Renders one character per digit, with an optional decimal point each.
    ///
    /// A `.` character is a lone decimal point on a blank digit, lit whatever `dots` says for
    /// that position. Characters the font does not know render blank.
    pub fn from_chars(chars: [char; NUM_DIGITS], dots: [bool; NUM_DIGITS]) -> Self {
        let mut segments = [SEG_BLANK; NUM_DIGITS];
        for (i, (c, dot)) in chars.into_iter().zip(dots).enumerate() {
            segments[i] = match c {
                '.' => SEG_DP,
                c if dot => segment_code(c) | SEG_DP,
                c => segment_code(c),
            };
        }
        Frame(segments)
    }

    /// Renders text the way it reads, left-aligned.
    ///
    /// A `.` lights the decimal point of the character before it rather than taking a digit of
    /// its own, unless there is no such character (leading dot) or it already has one (`..`).
    /// Shorter text leaves the remaining digits blank, longer text is cut off.
    pub fn from_text(text: &str) -> Self {
        let mut segments = [SEG_BLANK; NUM_DIGITS];
        let mut used = 0;
        let mut can_take_dot = false;

        for c in text.chars() {
            if c == '.' && can_take_dot {
                segments[used - 1] |= SEG_DP;
                can_take_dot = false;
                continue;
            }
            if used == NUM_DIGITS {
                break;
            }
            segments[used] = segment_code(c);
            can_take_dot = c != '.';
            used += 1;
        }

        Frame(segments)
    }

    /// Lights the colon, which is wired to the decimal point of digit 1.
    pub const fn with_colon(mut self, colon: bool) -> Self {
        if colon {
            self.0[1] |= SEG_DP;
        }
        self
    }

    pub const fn segments(&self) -> [u8; NUM_DIGITS] {
        self.0
    }

    /// Sends the frame, then switches the display on at `brightness`.
    ///
    /// Three transactions: the data command, the start address followed by the four digits, and
    /// the display control command. Nothing is rolled back on failure, so digits written before
    /// the failing one keep their new contents.
    pub(crate) fn write(&self, bus: &mut Bus, brightness: u8) -> Tm1637Result<()> {
        debug!("Writing frame {:02x?}", self.0);

        bus.command(TransactionStep::DataCommand, CMD_DATA_AUTO_INCREMENT)?;

        bus.transaction(TransactionStep::AddressCommand, |bus| {
            bus.write_byte(CMD_ADDRESS_BASE)
                .map_err(TransactionStep::AddressCommand.failed())?;
            for (i, &segments) in self.0.iter().enumerate() {
                bus.write_byte(segments)
                    .map_err(TransactionStep::Digit(i).failed())?;
            }
            Ok(())
        })?;

        write_display_control(bus, true, brightness)
    }
}

pub(crate) fn write_display_control(bus: &mut Bus, on: bool, brightness: u8) -> Tm1637Result<()> {
    bus.command(TransactionStep::DisplayControl, display_control(on, brightness))
}
