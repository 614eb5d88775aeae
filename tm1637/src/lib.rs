//! Driver for TM1637 four-digit seven-segment LED displays on bit-banged GPIO.
//!
//! ```no_run
//! use tm1637::Tm1637;
//!
//! let display = Tm1637::initialize(23, 24)?;
//! display.set_colon(true);
//! display.display_characters(['1', '2', '3', '4'], [false; 4])?;
//! display.close()?;
//! # Ok::<(), tm1637::Tm1637Error>(())
//! ```
//!
//! All operations on a [Tm1637] are serialized by an internal lock, so a display can be shared
//! between threads behind an [std::sync::Arc].
pub mod bus;
pub mod error;
pub mod font;
pub mod frame;
#[cfg(test)]
mod testing;

pub use error::*;
pub use frame::{Frame, NUM_DIGITS};

use crate::bus::Bus;
use crate::frame::write_display_control;
use log::{debug, warn};
use std::fmt::{Debug, Formatter};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tm1637_gpio::shared::SharedGpio;
use tm1637_gpio::GpioDriver;

/// Brightest display setting.
pub const MAX_BRIGHTNESS: u8 = 7;
/// Brightness a display starts out with.
pub const DEFAULT_BRIGHTNESS: u8 = 2;
/// Delay after every pin transition. Comfortably above the chip's minimum timings.
pub const DEFAULT_DELAY: Duration = Duration::from_micros(5);

struct State {
    bus: Bus,
    brightness: u8,
    colon: bool,
}

/// One TM1637 display on a clock and a data pin.
pub struct Tm1637 {
    state: Mutex<State>,
    // Keeps the pin layer alive; for SharedGpio this is this display's share of the mapping.
    gpio: Box<dyn GpioDriver + Send + Sync>,
}

impl Debug for Tm1637 {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        write!(
            f,
            "Tm1637({:?}, brightness: {}, colon: {})",
            state.bus, state.brightness, state.colon
        )
    }
}

impl Tm1637 {
    /// Sets up a display on the given BCM pin numbers, using the process-wide GPIO mapping.
    ///
    /// The display ends up cleared and switched on at [DEFAULT_BRIGHTNESS].
    ///
    /// # Errors
    /// `Tm1637Error::Init` wrapping whatever went wrong: the GPIO registers could not be mapped,
    /// a pin could not be claimed, or the chip did not take the initial commands. Anything
    /// acquired up to that point is released again.
    pub fn initialize(clock_pin: usize, data_pin: usize) -> Tm1637Result<Self> {
        let gpio = SharedGpio::acquire().map_err(Tm1637Error::init)?;
        Self::initialize_with(gpio, clock_pin, data_pin, DEFAULT_DELAY)
    }

    /// Like [Self::initialize], but on an explicit pin layer and with a custom transition delay.
    pub fn initialize_with<G>(
        gpio: G,
        clock_pin: usize,
        data_pin: usize,
        delay: Duration,
    ) -> Tm1637Result<Self>
    where
        G: GpioDriver + Send + Sync + 'static,
    {
        debug!("Initializing TM1637 @ CLK: {}, DIO: {}", clock_pin, data_pin);

        let clock = gpio.get_pin(clock_pin).map_err(Tm1637Error::init)?;
        let data = gpio.get_pin(data_pin).map_err(Tm1637Error::init)?;
        let bus = Bus::new(clock, data, delay).map_err(Tm1637Error::init)?;

        let display = Tm1637 {
            state: Mutex::new(State {
                bus,
                brightness: DEFAULT_BRIGHTNESS,
                colon: false,
            }),
            gpio: Box::new(gpio),
        };

        display.set_brightness(DEFAULT_BRIGHTNESS).map_err(Tm1637Error::init)?;
        display.clear().map_err(Tm1637Error::init)?;

        debug!("{:?} initialized.", display);
        Ok(display)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Every field stays consistent even if a holder panicked mid-update
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the brightness and sends it to the display right away, without redrawing digits.
    ///
    /// Levels above [MAX_BRIGHTNESS] are clamped. The new level is kept even if sending fails.
    pub fn set_brightness(&self, level: u8) -> Tm1637Result<()> {
        let mut state = self.lock();

        let level = if level > MAX_BRIGHTNESS {
            warn!("Brightness {} out of range, using {}", level, MAX_BRIGHTNESS);
            MAX_BRIGHTNESS
        } else {
            level
        };
        state.brightness = level;

        write_display_control(&mut state.bus, true, level)
    }

    /// Gets the current brightness level.
    pub fn brightness(&self) -> u8 {
        self.lock().brightness
    }

    /// Turns the colon on or off for every following update. Sends nothing by itself.
    pub fn set_colon(&self, enabled: bool) {
        self.lock().colon = enabled;
    }

    /// Gets whether the colon is lit on updates.
    pub fn colon(&self) -> bool {
        self.lock().colon
    }

    fn show(&self, frame: Frame) -> Tm1637Result<()> {
        let mut state = self.lock();
        let frame = frame.with_colon(state.colon);
        let brightness = state.brightness;
        frame.write(&mut state.bus, brightness)
    }

    /// Shows one character per digit, each with an optional decimal point.
    ///
    /// See [Frame::from_chars] for how characters are rendered.
    pub fn display_characters(
        &self,
        chars: [char; NUM_DIGITS],
        dots: [bool; NUM_DIGITS],
    ) -> Tm1637Result<()> {
        self.show(Frame::from_chars(chars, dots))
    }

    /// Shows raw segment codes (`DP G F E D C B A`), for custom glyphs or animation frames.
    pub fn display_segments(&self, segments: [u8; NUM_DIGITS]) -> Tm1637Result<()> {
        self.show(Frame::from_segments(segments))
    }

    /// Shows a short piece of text, see [Frame::from_text].
    pub fn display_text(&self, text: &str) -> Tm1637Result<()> {
        self.show(Frame::from_text(text))
    }

    /// Blanks all digits. The colon stays lit if it is enabled.
    pub fn clear(&self) -> Tm1637Result<()> {
        self.show(Frame::BLANK)
    }

    /// Switches the display off at its current brightness and gives up the pins and this
    /// display's share of the GPIO mapping.
    ///
    /// Everything is released even when the off command fails.
    pub fn close(self) -> Tm1637Result<()> {
        let Tm1637 { state, gpio } = self;
        let mut state = state.into_inner().unwrap_or_else(PoisonError::into_inner);

        let result = write_display_control(&mut state.bus, false, state.brightness);

        drop(state);
        debug!("Releasing {:?}", gpio);
        drop(gpio);

        result
    }
}
