use std::{
    error,
    fmt::Display,
    io::{self},
    str::Utf8Error,
};

use crate::protocol::DeviceError;

/// Errors that may occur while framing, exchanging or decoding SSP messages.
#[derive(Debug)]
pub enum Error {
    IoError(io::Error),
    /// No complete frame arrived before the transaction deadline.
    Timeout,
    CrcMismatch { computed: u16, received: u16 },
    /// The device answered with a status other than OK.
    Device(DeviceError),
    /// A payload or caller referenced a channel the loaded table does not have.
    ChannelIndexOutOfRange { channel: usize, available: usize },
    PayloadTooLong(usize),
    InvalidFormat(String),
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error::IoError(value)
    }
}

impl From<Utf8Error> for Error {
    fn from(value: Utf8Error) -> Self {
        Error::InvalidFormat(format!("Invalid UTF8: {}", value))
    }
}

impl From<DeviceError> for Error {
    fn from(value: DeviceError) -> Self {
        Error::Device(value)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(error) => write!(f, "{}", error),
            Error::Timeout => write!(f, "Timeout"),
            Error::CrcMismatch { computed, received } => write!(
                f,
                "CRC mismatch: computed {:#06x}, received {:#06x}",
                computed, received
            ),
            Error::Device(error) => write!(f, "{}", error),
            Error::ChannelIndexOutOfRange { channel, available } => write!(
                f,
                "Channel {} out of range, {} channels available",
                channel, available
            ),
            Error::PayloadTooLong(len) => {
                write!(f, "Payload of {} bytes does not fit into a frame", len)
            }
            Error::InvalidFormat(format) => write!(f, "{}", format),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::IoError(error) => Some(error),
            _ => None,
        }
    }
}
