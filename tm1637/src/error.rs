use std::fmt::{Display, Formatter};
use thiserror::Error;
use tm1637_gpio::GpioError;

/// Failure while moving one byte over the bus.
#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum BusError {
    /// The chip did not pull the data line low after the byte. Usually means it is not wired
    /// up or not powered.
    #[error("no acknowledge from the display")]
    Nack,
    #[error("GPIO error: {0}")]
    Gpio(#[from] GpioError),
}

/// The part of a display update that was being sent when something failed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TransactionStep {
    DataCommand,
    AddressCommand,
    /// A segment byte, by digit index.
    Digit(usize),
    DisplayControl,
}

impl Display for TransactionStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStep::DataCommand => write!(f, "data command"),
            TransactionStep::AddressCommand => write!(f, "address command"),
            TransactionStep::Digit(index) => write!(f, "segment data for digit {}", index),
            TransactionStep::DisplayControl => write!(f, "display control command"),
        }
    }
}

impl TransactionStep {
    /// Attaches this step to a bus error, for use with `map_err`.
    pub(crate) fn failed<E: Into<BusError>>(self) -> impl FnOnce(E) -> Tm1637Error {
        move |err| Tm1637Error::Transaction {
            step: self,
            source: err.into(),
        }
    }
}

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum Tm1637Error {
    #[error("GPIO error: {0}")]
    Gpio(#[from] GpioError),
    #[error("failed to send {step}: {source}")]
    Transaction {
        step: TransactionStep,
        source: BusError,
    },
    #[error("failed to initialize display: {0}")]
    Init(#[source] Box<Tm1637Error>),
}

impl Tm1637Error {
    /// Whether the failure comes down to the chip not acknowledging a byte.
    pub fn is_nack(&self) -> bool {
        match self {
            Tm1637Error::Transaction { source, .. } => *source == BusError::Nack,
            Tm1637Error::Init(inner) => inner.is_nack(),
            Tm1637Error::Gpio(_) => false,
        }
    }

    /// Gets the step a transaction failure happened in.
    pub fn step(&self) -> Option<TransactionStep> {
        match self {
            Tm1637Error::Transaction { step, .. } => Some(*step),
            Tm1637Error::Init(inner) => inner.step(),
            Tm1637Error::Gpio(_) => None,
        }
    }

    pub(crate) fn init(err: impl Into<Tm1637Error>) -> Self {
        Tm1637Error::Init(Box::new(err.into()))
    }
}

pub type Tm1637Result<T> = Result<T, Tm1637Error>;
