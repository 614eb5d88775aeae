//! GPIO access for Raspberry Pi class boards.
//!
//! The [GpioDriver] and [GpioPin] traits describe the pin layer the display driver is written
//! against. [raw::RawGpioDriver] implements them on top of the memory-mapped BCM GPIO registers,
//! and [shared::SharedGpio] hands out one reference-counted mapping to every user in the process.
pub mod raw;
pub mod shared;

use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("pin already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

pub trait GpioDriver: Debug {
    /// Gets the amount of GPIO pins available.
    fn count(&self) -> GpioResult<usize>;

    /// Claims the GPIO pin at the given index.
    ///
    /// The returned pin keeps whatever it needs from the driver alive, so it can outlive the
    /// borrow used to obtain it.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the index is out of range.
    /// - `GpioError::AlreadyInUse` if the pin is already claimed.
    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + Send>>;
}

/// Specifies whether the pin is read from or driven.
///
/// Pins start out as inputs, which is also the state they are left in when released.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioDirection {
    #[default] Input,
    Output,
}

/// Specifies the bias of the GPIO pin.
///
/// You can use this to enable pull-up or pull-down resistors.
/// These should work in both input and output modes.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioBias {
    #[default] None,
    PullUp,
    PullDown,
}

pub trait GpioPin: Debug {
    /// Gets the index of the pin on its driver.
    fn index(&self) -> usize;

    /// Gets the current direction of the pin.
    fn direction(&self) -> GpioDirection;
    /// Switches the pin between input and output.
    fn set_direction(&mut self, direction: GpioDirection) -> GpioResult<()>;

    /// Drives the pin to the given level. Only meaningful in output mode.
    fn write(&mut self, value: bool) -> GpioResult<()>;
    /// Reads the level currently present on the pin.
    fn read(&self) -> GpioResult<bool>;

    /// Gets whether the GPIO pin supports bias (pull-up/pull-down resistors).
    fn supports_bias(&self) -> bool {
        false
    }
    /// Gets the bias of the GPIO pin.
    fn bias(&self) -> GpioBias {
        GpioBias::None
    }
    /// Sets the bias of the GPIO pin.
    ///
    /// # Errors
    /// - `GpioError::NotSupported` if the pin does not support bias.
    fn set_bias(&mut self, _bias: GpioBias) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }

    /// Enables the pull-up resistor on the pin.
    fn enable_pull_up(&mut self) -> GpioResult<()> {
        self.set_bias(GpioBias::PullUp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct PlainPin {
        direction: GpioDirection,
    }

    impl GpioPin for PlainPin {
        fn index(&self) -> usize {
            0
        }

        fn direction(&self) -> GpioDirection {
            self.direction
        }

        fn set_direction(&mut self, direction: GpioDirection) -> GpioResult<()> {
            self.direction = direction;
            Ok(())
        }

        fn write(&mut self, _value: bool) -> GpioResult<()> {
            Ok(())
        }

        fn read(&self) -> GpioResult<bool> {
            Ok(false)
        }
    }

    #[test]
    fn io_errors_keep_their_kind() {
        let err: GpioError = std::io::Error::from(std::io::ErrorKind::PermissionDenied).into();
        assert_eq!(err, GpioError::Io(std::io::ErrorKind::PermissionDenied));
    }

    #[test]
    fn pull_up_without_bias_support_is_rejected() {
        let mut pin = PlainPin::default();
        assert!(!pin.supports_bias());
        assert_eq!(pin.enable_pull_up(), Err(GpioError::NotSupported));
        assert_eq!(pin.bias(), GpioBias::None);
    }

    #[test]
    fn pins_default_to_input() {
        assert_eq!(GpioDirection::default(), GpioDirection::Input);
        assert_eq!(PlainPin::default().direction(), GpioDirection::Input);
    }
}
