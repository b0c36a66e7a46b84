//! Error taxonomy shared by both protocol drivers.
//!
//! Every failing operation maps to exactly one [`ErrorKind`]; a successful
//! operation is simply `Ok`.
use crate::protocol::{Mode, Temperature};

/// Coarse classification of a failed thermostat operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid input or a local failure, the request was not (fully) attempted.
    GenericFailure,
    /// A requested field does not fit into the extraction buffer.
    ReadBufferOverflow,
    /// The thermostat never presented a single byte.
    ResponseTimeout,
    /// Bytes were received but never formed the expected marker.
    ResponseMismatch,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "Temperature {0} is outside the settable range {min}..={max}",
        min = Temperature::MIN,
        max = Temperature::MAX
    )]
    TemperatureOutOfRange(Temperature),

    #[error("Mode {0} cannot be sent to the thermostat")]
    InvalidMode(Mode),

    #[error("Register address {0:#05X} does not fit into 12 bits")]
    AddressOutOfRange(u16),

    #[error("{0} is not supported by this protocol variant")]
    Unsupported(&'static str),

    #[error("Field of {requested} bytes exceeds the buffer capacity of {capacity} bytes")]
    ReadBufferOverflow { requested: usize, capacity: usize },

    #[error("No response from thermostat")]
    ResponseTimeout,

    #[error("Unexpected response from thermostat")]
    ResponseMismatch,

    #[error("Serial transport error: {0}")]
    Transport(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::TemperatureOutOfRange(_)
            | Error::InvalidMode(_)
            | Error::AddressOutOfRange(_)
            | Error::Unsupported(_)
            | Error::Transport(_) => ErrorKind::GenericFailure,
            Error::ReadBufferOverflow { .. } => ErrorKind::ReadBufferOverflow,
            Error::ResponseTimeout => ErrorKind::ResponseTimeout,
            Error::ResponseMismatch => ErrorKind::ResponseMismatch,
        }
    }
}

/// The result type for thermostat operations.
pub type Result<T> = std::result::Result<T, Error>;
