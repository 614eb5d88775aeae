//! Process-wide, reference-counted access to the GPIO registers.
//!
//! Every display (or anything else) that needs the GPIO block calls [SharedGpio::acquire]. The
//! first call maps the registers; later calls get another handle on the same mapping. The
//! mapping is released once the last handle, and every pin claimed through it, has been dropped,
//! so releasing one user never pulls the registers out from under another.
use crate::raw::RawGpioDriver;
use crate::{GpioDriver, GpioPin, GpioResult};
use log::debug;
use std::fmt::Debug;
use std::sync::{Arc, Mutex, PoisonError, Weak};

/// A lazily opened resource shared by reference count.
///
/// Holds only a weak reference, so the resource is closed as soon as the last [Arc] handed out
/// by [Shared::acquire_with] goes away, and reopened by the next acquisition.
#[derive(Debug)]
pub struct Shared<T> {
    slot: Mutex<Weak<T>>,
}

impl<T> Shared<T> {
    pub const fn new() -> Self {
        Shared {
            slot: Mutex::new(Weak::new()),
        }
    }

    /// Returns the live resource, or opens a new one with `open` if there is none.
    ///
    /// A failing `open` leaves the slot empty, so the next call tries again.
    pub fn acquire_with<F>(&self, open: F) -> GpioResult<Arc<T>>
    where
        F: FnOnce() -> GpioResult<T>,
    {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = slot.upgrade() {
            return Ok(existing);
        }

        let fresh = Arc::new(open()?);
        *slot = Arc::downgrade(&fresh);
        Ok(fresh)
    }

    /// Gets the number of live handles on the resource.
    pub fn users(&self) -> usize {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).strong_count()
    }
}

impl<T> Default for Shared<T> {
    fn default() -> Self {
        Self::new()
    }
}

static RAW_GPIO: Shared<RawGpioDriver> = Shared::new();

/// A handle on the process-wide GPIO mapping.
///
/// Cloning the handle or claiming pins through it keeps the mapping alive. Dropping the last
/// handle and pin releases it.
#[derive(Debug, Clone)]
pub struct SharedGpio {
    driver: Arc<RawGpioDriver>,
}

impl SharedGpio {
    /// Acquires the mapping, opening `/dev/gpiomem` if nobody holds it yet.
    pub fn acquire() -> GpioResult<Self> {
        Self::acquire_from(RawGpioDriver::new_gpiomem)
    }

    /// Acquires the mapping, opening `/dev/mem` if nobody holds it yet.
    ///
    /// If the mapping is already open, the existing one is shared whichever device it came from.
    pub fn acquire_mem() -> GpioResult<Self> {
        Self::acquire_from(RawGpioDriver::new_mem)
    }

    fn acquire_from(open: fn() -> GpioResult<RawGpioDriver>) -> GpioResult<Self> {
        let driver = RAW_GPIO.acquire_with(open)?;
        debug!("GPIO acquired, {} user(s)", Arc::strong_count(&driver));
        Ok(SharedGpio { driver })
    }

    /// Gets the number of live references to the process-wide mapping.
    pub fn users() -> usize {
        RAW_GPIO.users()
    }
}

impl GpioDriver for SharedGpio {
    fn count(&self) -> GpioResult<usize> {
        self.driver.count()
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + Send>> {
        self.driver.get_pin(index)
    }
}
