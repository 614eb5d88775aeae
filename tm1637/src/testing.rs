//! Recording pin layer for tests.
//!
//! [MockGpio] hands out pins that log every call into a shared trace instead of touching
//! hardware. [MockGpio::transactions] plays the trace back the way the chip would see it:
//! start and stop conditions, bits sampled on rising clock edges, ACK slots.
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tm1637_gpio::{GpioBias, GpioDirection, GpioDriver, GpioError, GpioPin, GpioResult};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Event {
    Direction(usize, GpioDirection),
    Write(usize, bool),
    Bias(usize, GpioBias),
    Read(usize),
}

#[derive(Debug, Default)]
struct MockState {
    events: Vec<Event>,
    claimed: BTreeSet<usize>,
    unavailable: BTreeSet<usize>,
    /// Number of ACK reads answered low before the chip stops acknowledging.
    acks_before_nack: Option<usize>,
    acks: usize,
    /// Number of pin writes that succeed before the next one fails.
    writes_before_failure: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct MockGpio {
    clock: usize,
    data: usize,
    state: Arc<Mutex<MockState>>,
}

pub const CLOCK_PIN: usize = 23;
pub const DATA_PIN: usize = 24;

impl MockGpio {
    pub fn new() -> Self {
        MockGpio {
            clock: CLOCK_PIN,
            data: DATA_PIN,
            state: Arc::default(),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Makes claiming `index` fail as if another user held it.
    pub fn make_unavailable(&self, index: usize) {
        self.state().unavailable.insert(index);
    }

    /// Answers the next `acks` ACK slots, then leaves the data line high.
    pub fn nack_after(&self, acks: usize) {
        let mut state = self.state();
        state.acks = 0;
        state.acks_before_nack = Some(acks);
    }

    /// Lets `writes` more pin writes through, then fails exactly one.
    pub fn fail_write_after(&self, writes: usize) {
        self.state().writes_before_failure = Some(writes);
    }

    /// Another view on the same pins and trace, decoding the bus on different pin numbers.
    pub fn on_pins(&self, clock: usize, data: usize) -> MockGpio {
        MockGpio {
            clock,
            data,
            state: Arc::clone(&self.state),
        }
    }

    pub fn always_ack(&self) {
        self.state().acks_before_nack = None;
    }

    pub fn claimed(&self) -> Vec<usize> {
        self.state().claimed.iter().copied().collect()
    }

    pub fn events(&self) -> Vec<Event> {
        self.state().events.clone()
    }

    pub fn clear_events(&self) {
        self.state().events.clear();
    }

    /// Decodes the recorded trace into the bytes of each complete transaction.
    pub fn transactions(&self) -> Vec<Vec<u8>> {
        self.decode().transactions
    }

    /// Whether both lines ended high with the data line driven, which is the bus idle state.
    pub fn idle(&self) -> bool {
        let decoded = self.decode();
        decoded.clock && decoded.data && decoded.data_output && !decoded.open
    }

    fn decode(&self) -> Decoded {
        let mut decoded = Decoded::default();
        let mut bits = Vec::new();
        let mut current = Vec::new();

        for event in self.events() {
            match event {
                Event::Direction(pin, direction) if pin == self.data => {
                    decoded.data_output = direction == GpioDirection::Output;
                }
                Event::Write(pin, level) if pin == self.clock => {
                    let rising = level && !decoded.clock;
                    decoded.clock = level;
                    if rising && decoded.open && decoded.data_output {
                        bits.push(decoded.data);
                        if bits.len() == 8 {
                            let byte = bits
                                .drain(..)
                                .enumerate()
                                .fold(0u8, |byte, (i, bit)| byte | (u8::from(bit) << i));
                            current.push(byte);
                        }
                    }
                }
                Event::Write(pin, level) if pin == self.data => {
                    let previous = decoded.data;
                    decoded.data = level;
                    if decoded.clock && decoded.data_output && previous != level {
                        if !level {
                            decoded.open = true;
                            bits.clear();
                            current.clear();
                        } else if decoded.open {
                            decoded.open = false;
                            decoded.transactions.push(std::mem::take(&mut current));
                        }
                    }
                }
                _ => {}
            }
        }

        decoded
    }
}

#[derive(Debug, Default)]
struct Decoded {
    clock: bool,
    data: bool,
    data_output: bool,
    open: bool,
    transactions: Vec<Vec<u8>>,
}

impl GpioDriver for MockGpio {
    fn count(&self) -> GpioResult<usize> {
        Ok(58)
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + Send>> {
        let mut state = self.state();
        if state.unavailable.contains(&index) || !state.claimed.insert(index) {
            return Err(GpioError::AlreadyInUse);
        }
        Ok(Box::new(MockPin {
            index,
            direction: GpioDirection::Input,
            bias: GpioBias::None,
            state: Arc::clone(&self.state),
        }))
    }
}

/// A [MockGpio] behind a process-wide style mapping, counting how often it was torn down.
#[derive(Debug)]
pub struct MockMapping {
    gpio: MockGpio,
    released: Arc<AtomicUsize>,
}

impl MockMapping {
    pub fn new(gpio: MockGpio, released: Arc<AtomicUsize>) -> Self {
        MockMapping { gpio, released }
    }
}

impl Drop for MockMapping {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// One user's handle on a shared [MockMapping].
#[derive(Debug, Clone)]
pub struct MappingHandle(pub Arc<MockMapping>);

impl GpioDriver for MappingHandle {
    fn count(&self) -> GpioResult<usize> {
        self.0.gpio.count()
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + Send>> {
        self.0.gpio.get_pin(index)
    }
}

#[derive(Debug)]
struct MockPin {
    index: usize,
    direction: GpioDirection,
    bias: GpioBias,
    state: Arc<Mutex<MockState>>,
}

impl MockPin {
    fn record(&self, event: Event) {
        self.state.lock().unwrap().events.push(event);
    }
}

impl GpioPin for MockPin {
    fn index(&self) -> usize {
        self.index
    }

    fn direction(&self) -> GpioDirection {
        self.direction
    }

    fn set_direction(&mut self, direction: GpioDirection) -> GpioResult<()> {
        self.direction = direction;
        self.record(Event::Direction(self.index, direction));
        Ok(())
    }

    fn write(&mut self, value: bool) -> GpioResult<()> {
        let mut state = self.state.lock().unwrap();
        match state.writes_before_failure {
            Some(0) => {
                state.writes_before_failure = None;
                return Err(GpioError::Io(ErrorKind::BrokenPipe));
            }
            Some(left) => state.writes_before_failure = Some(left - 1),
            None => {}
        }
        state.events.push(Event::Write(self.index, value));
        Ok(())
    }

    fn read(&self) -> GpioResult<bool> {
        let mut state = self.state.lock().unwrap();
        state.events.push(Event::Read(self.index));
        let nack = state.acks_before_nack.is_some_and(|limit| state.acks >= limit);
        state.acks += 1;
        Ok(nack)
    }

    fn supports_bias(&self) -> bool {
        true
    }

    fn bias(&self) -> GpioBias {
        self.bias
    }

    fn set_bias(&mut self, bias: GpioBias) -> GpioResult<()> {
        self.bias = bias;
        self.record(Event::Bias(self.index, bias));
        Ok(())
    }
}

impl Drop for MockPin {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.claimed.remove(&self.index);
        }
    }
}
