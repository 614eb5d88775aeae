use crate::{GpioBias, GpioDirection, GpioDriver, GpioError, GpioPin, GpioResult};
use bitvec::vec::BitVec;
use log::trace;
use memmap2::{MmapOptions, MmapRaw};
use std::fmt::{Debug, Formatter};
use std::fs::OpenOptions;
use std::sync::atomic::AtomicU8;
use std::sync::{Arc, Mutex, PoisonError};

/// Direct access to the BCM GPIO register block through a memory mapping.
///
/// Pins are handed out as [RawGpioPin]s, which hold an [Arc] to the driver, so the mapping stays
/// alive for as long as any pin does. Use [crate::shared::SharedGpio] to get a driver that is
/// shared by the whole process instead of mapping the registers several times.
pub struct RawGpioDriver {
    mmap: MmapRaw,
    used_pins: BitVec<AtomicU8>,
    // Serializes read-modify-write cycles on GPFSELn, the pull registers and pin claims.
    rmw_lock: Mutex<()>,
}

impl RawGpioDriver {
    // 0x7e200000 on the bus, 0xFE200000 on the BCM2711
    const GPIO_BASE: u64 = 0x3F200000;

    const PIN_COUNT: usize = 58;

    const FUNCTION_INPUT: u32 = 0b000;
    const FUNCTION_OUTPUT: u32 = 0b001;

    fn create(path: &str, offset: u64) -> GpioResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)?;

        let mmap = MmapOptions::new()
                .offset(offset)
                .len(4096)
                .map_raw(&file)?;

        trace!("Mapped GPIO registers from {} at {:#x}", path, offset);

        Ok(RawGpioDriver {
            mmap,
            used_pins: BitVec::repeat(false, Self::PIN_COUNT),
            rmw_lock: Mutex::new(()),
        })
    }

    /// Maps the registers through `/dev/gpiomem`, which does not require root.
    ///
    /// The kernel always maps the GPIO block for this device, so no offset is needed.
    pub fn new_gpiomem() -> GpioResult<Self> {
        Self::create("/dev/gpiomem", 0)
    }

    /// Maps the registers through `/dev/mem`. Requires root.
    pub fn new_mem() -> GpioResult<Self> {
        Self::create("/dev/mem", Self::GPIO_BASE)
    }

    fn check_index(pin_index: usize) -> GpioResult<()> {
        if pin_index >= Self::PIN_COUNT {
            return Err(GpioError::InvalidArgument);
        }
        Ok(())
    }

    fn register(&self, word: usize) -> *mut u32 {
        let mmap = self.mmap.as_mut_ptr() as *mut u32;
        // All offsets used here stay within the first 4 KiB page that was mapped.
        unsafe { mmap.add(word) }
    }

    fn modify_register(&self, word: usize, mask: u32, value: u32) {
        let _guard = self.rmw_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let register_ptr = self.register(word);
        let mut register_value = unsafe { register_ptr.read_volatile() };
        register_value &= !mask;
        register_value |= value & mask;
        unsafe { register_ptr.write_volatile(register_value) };
    }

    pub(crate) fn raw_set_pin_function(&self, pin_index: usize, function: u32) -> GpioResult<()> {
        if function > 0b111 {
            return Err(GpioError::InvalidArgument);
        }
        Self::check_index(pin_index)?;

        // GPFSELn register
        let shift = (pin_index % 10) * 3;
        self.modify_register(pin_index / 10, 0b111 << shift, function << shift);

        Ok(())
    }

    pub(crate) fn raw_get_pin_function(&self, pin_index: usize) -> GpioResult<u32> {
        Self::check_index(pin_index)?;

        // GPFSELn register
        let register_value = unsafe { self.register(pin_index / 10).read_volatile() };
        let shift = (pin_index % 10) * 3;
        Ok((register_value >> shift) & 0b111)
    }

    pub(crate) fn raw_set_pin_output(&self, pin_index: usize, high: bool) -> GpioResult<()> {
        Self::check_index(pin_index)?;

        // GPSETn/GPCLRn register, write-one-to-act so no locking needed
        let word = if high { 0x1c / 4 } else { 0x28 / 4 } + pin_index / 32;
        let shift = pin_index % 32;
        unsafe { self.register(word).write_volatile(1 << shift) };

        Ok(())
    }

    pub(crate) fn raw_get_pin_level(&self, pin_index: usize) -> GpioResult<bool> {
        Self::check_index(pin_index)?;

        // GPLEVn register
        let register_value = unsafe { self.register(0x34 / 4 + pin_index / 32).read_volatile() };
        let level = (register_value >> (pin_index % 32)) & 1;
        Ok(level != 0)
    }

    pub(crate) fn raw_set_bias(&self, pin_index: usize, bias: GpioBias) -> GpioResult<()> {
        Self::check_index(pin_index)?;

        let bias_value = match bias {
            GpioBias::None => 0b00,
            GpioBias::PullUp => 0b01,
            GpioBias::PullDown => 0b10,
        };

        // GPIO_PUP_PDN_CNTRL_REGn register (yes that is a long name)
        let shift = (pin_index % 16) * 2;
        self.modify_register(0xE4 / 4 + pin_index / 16, 0b11 << shift, bias_value << shift);

        Ok(())
    }

    pub(crate) fn raw_get_bias(&self, pin_index: usize) -> GpioResult<GpioBias> {
        Self::check_index(pin_index)?;

        // GPIO_PUP_PDN_CNTRL_REGn register
        let register_value = unsafe { self.register(0xE4 / 4 + pin_index / 16).read_volatile() };
        let bias_value = (register_value >> ((pin_index % 16) * 2)) & 0b11;

        let bias = match bias_value {
            0b00 => GpioBias::None,
            0b01 => GpioBias::PullUp,
            0b10 => GpioBias::PullDown,
            _ => return Err(GpioError::NotSupported),
        };
        Ok(bias)
    }

    pub(crate) fn raw_reset(&self, pin_index: usize) -> GpioResult<()> {
        self.raw_set_pin_function(pin_index, Self::FUNCTION_INPUT)?;
        self.raw_set_bias(pin_index, GpioBias::None)?;
        self.raw_set_pin_output(pin_index, false)?;
        Ok(())
    }

    /// Claims a pin on a shared driver, resetting it to a floating input.
    pub fn claim(driver: &Arc<Self>, index: usize) -> GpioResult<RawGpioPin> {
        Self::check_index(index)?;

        {
            let _guard = driver.rmw_lock.lock().unwrap_or_else(PoisonError::into_inner);
            if driver.used_pins[index] {
                return Err(GpioError::AlreadyInUse);
            }
            driver.used_pins.set_aliased(index, true);
        }

        if let Err(err) = driver.raw_reset(index) {
            driver.used_pins.set_aliased(index, false);
            return Err(err);
        }

        trace!("Claimed pin {}", index);

        Ok(RawGpioPin {
            driver: Arc::clone(driver),
            pin_index: index,
        })
    }
}

impl Debug for RawGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "RawGpioDriver({:?})", self.mmap.as_ptr().addr())
    }
}

impl GpioDriver for Arc<RawGpioDriver> {
    fn count(&self) -> GpioResult<usize> {
        Ok(RawGpioDriver::PIN_COUNT)
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + Send>> {
        Ok(Box::new(RawGpioDriver::claim(self, index)?))
    }
}

/// A claimed pin on a [RawGpioDriver].
///
/// Dropping the pin puts it back into input mode and releases the claim.
pub struct RawGpioPin {
    driver: Arc<RawGpioDriver>,
    pin_index: usize,
}

impl Debug for RawGpioPin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}]", self.driver, self.pin_index)
    }
}

impl GpioPin for RawGpioPin {
    fn index(&self) -> usize {
        self.pin_index
    }

    fn direction(&self) -> GpioDirection {
        match self.driver.raw_get_pin_function(self.pin_index) {
            Ok(RawGpioDriver::FUNCTION_OUTPUT) => GpioDirection::Output,
            _ => GpioDirection::Input,
        }
    }

    fn set_direction(&mut self, direction: GpioDirection) -> GpioResult<()> {
        let function = match direction {
            GpioDirection::Input => RawGpioDriver::FUNCTION_INPUT,
            GpioDirection::Output => RawGpioDriver::FUNCTION_OUTPUT,
        };
        self.driver.raw_set_pin_function(self.pin_index, function)
    }

    fn write(&mut self, value: bool) -> GpioResult<()> {
        self.driver.raw_set_pin_output(self.pin_index, value)
    }

    fn read(&self) -> GpioResult<bool> {
        self.driver.raw_get_pin_level(self.pin_index)
    }

    fn supports_bias(&self) -> bool {
        true
    }

    fn bias(&self) -> GpioBias {
        self.driver.raw_get_bias(self.pin_index).unwrap_or(GpioBias::None)
    }

    fn set_bias(&mut self, bias: GpioBias) -> GpioResult<()> {
        self.driver.raw_set_bias(self.pin_index, bias)
    }
}

impl Drop for RawGpioPin {
    fn drop(&mut self) {
        _ = self.driver.raw_set_pin_function(self.pin_index, RawGpioDriver::FUNCTION_INPUT);
        _ = self.driver.raw_set_bias(self.pin_index, GpioBias::None);
        self.driver.used_pins.set_aliased(self.pin_index, false);
        trace!("Released pin {}", self.pin_index);
    }
}
