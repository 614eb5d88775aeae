//! Bit-banged TM1637 bus.
//!
//! The TM1637 talks something that looks like I²C from a distance: a start condition, bytes with
//! an ACK clock after each one, a stop condition. It is not I²C though. There is no addressing, no
//! clock stretching, and bytes go out LSB first. Everything is driven by hand on two pins, with a
//! fixed delay after every transition to stay inside the chip's timing.
use crate::error::{BusError, Tm1637Result, TransactionStep};
use log::{trace, warn};
use std::fmt::{Debug, Formatter};
use std::thread::sleep;
use std::time::Duration;
use tm1637_gpio::{GpioDirection, GpioError, GpioPin, GpioResult};

pub struct Bus {
    clock: Box<dyn GpioPin + Send>,
    data: Box<dyn GpioPin + Send>,
    delay: Duration,
}

impl Debug for Bus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bus(CLK: {:?}, DIO: {:?})", self.clock, self.data)
    }
}

impl Bus {
    /// Takes over both pins, configuring them as outputs driven low.
    pub fn new(
        mut clock: Box<dyn GpioPin + Send>,
        mut data: Box<dyn GpioPin + Send>,
        delay: Duration,
    ) -> GpioResult<Self> {
        clock.set_direction(GpioDirection::Output)?;
        clock.write(false)?;
        data.set_direction(GpioDirection::Output)?;
        data.write(false)?;

        Ok(Bus { clock, data, delay })
    }

    fn wait(&self) {
        if !self.delay.is_zero() {
            sleep(self.delay);
        }
    }

    fn set_clock(&mut self, high: bool) -> GpioResult<()> {
        self.clock.write(high)?;
        self.wait();
        Ok(())
    }

    fn set_data(&mut self, high: bool) -> GpioResult<()> {
        self.data.write(high)?;
        self.wait();
        Ok(())
    }

    /// Start condition: the data line falls while the clock is high.
    pub fn start(&mut self) -> GpioResult<()> {
        self.data.set_direction(GpioDirection::Output)?;
        self.set_data(true)?;
        self.set_clock(true)?;

        self.set_data(false)?;
        self.set_clock(false)?;
        Ok(())
    }

    /// Stop condition: the data line rises while the clock is high, leaving both lines high.
    pub fn stop(&mut self) -> GpioResult<()> {
        self.set_clock(false)?;
        self.data.set_direction(GpioDirection::Output)?;
        self.set_data(false)?;

        self.set_clock(true)?;
        self.set_data(true)?;
        Ok(())
    }

    /// Shifts one byte out, LSB first, then clocks the ACK slot.
    ///
    /// Does not touch the start or stop conditions; whoever called [Self::start] still has to
    /// call [Self::stop], also when this fails.
    ///
    /// # Errors
    /// - `BusError::Nack` if the chip left the data line high in the ACK slot.
    /// - `BusError::Gpio` if a pin could not be driven or read.
    pub fn write_byte(&mut self, value: u8) -> Result<(), BusError> {
        trace!("Sending byte: {:#04x} ({:08b})", value, value);

        for bit in 0..8 {
            self.set_clock(false)?;
            self.set_data((value >> bit) & 1 == 1)?;
            // The chip samples on this edge
            self.set_clock(true)?;
        }

        self.set_clock(false)?;
        self.data.set_direction(GpioDirection::Input)?;
        match self.data.enable_pull_up() {
            // Module boards carry their own pull-ups
            Ok(()) | Err(GpioError::NotSupported) => {}
            Err(err) => return Err(err.into()),
        }
        self.wait();

        // The chip pulls the line low for this clock to acknowledge
        self.set_clock(true)?;
        let ack_level = self.data.read();
        self.set_clock(false)?;

        self.data.set_direction(GpioDirection::Output)?;
        self.data.write(false)?;

        if ack_level? {
            warn!("No acknowledge after byte {:#04x}", value);
            return Err(BusError::Nack);
        }
        Ok(())
    }

    /// Runs `body` between a start and a stop condition.
    ///
    /// The stop condition is sent whatever `body` returns, so a failed write never leaves the
    /// bus asserted. The first error wins. A failing start is reported against `step`.
    pub fn transaction<F>(&mut self, step: TransactionStep, body: F) -> Tm1637Result<()>
    where
        F: FnOnce(&mut Self) -> Tm1637Result<()>,
    {
        let result = match self.start() {
            Ok(()) => body(self),
            Err(err) => Err(step.failed()(err)),
        };
        let stopped = self.stop().map_err(step.failed::<GpioError>());
        result.and(stopped)
    }

    /// Sends a transaction consisting of a single command byte.
    pub fn command(&mut self, step: TransactionStep, command: u8) -> Tm1637Result<()> {
        self.transaction(step, |bus| bus.write_byte(command).map_err(step.failed()))
    }
}
