use std::{
    io::{self, Read, Write},
    time::Duration,
};

use serialport::SerialPort;
use ssp_protocol::error::Error;

use crate::{Biller, transaction::Transactor};

/// Baud rate of the NV9USB serial interface
pub const BAUD_RATE: u32 = 9600;

/// Deadline for a single transaction, also used as the serial read timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct Config {
    pub timeout: Duration,
    pub baud_rate: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            baud_rate: BAUD_RATE,
        }
    }
}

/// Builder to create a [Biller] session and modify configuration options
///
/// # Example
///
/// ```ignore
/// use ssp_client::config::Builder;
/// use std::time::Duration;
///
/// let biller = Builder::new()
///     .timeout(Duration::from_millis(500))
///     .open("/dev/ttyACM0")?;
/// ```
#[derive(Default)]
pub struct Builder {
    config: Config,
}

impl Builder {
    pub fn new() -> Builder {
        Builder::default()
    }

    /// Set the deadline for receiving a complete response.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the serial baud rate. Only used by [`Builder::open`].
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.config.baud_rate = baud_rate;
        self
    }

    /// Opens the serial port and establishes a session on it.
    pub fn open(self, path: &str) -> Result<Biller<Box<dyn SerialPort>>, Error> {
        log::debug!(
            "Opening serial port {} at {} baud",
            path,
            self.config.baud_rate
        );
        let port = serialport::new(path, self.config.baud_rate)
            .timeout(self.config.timeout)
            .open()
            .map_err(io::Error::from)?;
        self.establish(port)
    }

    /// Establishes a session on an already opened transport.
    pub fn establish<T: Read + Write>(self, transport: T) -> Result<Biller<T>, Error> {
        Biller::with_transactor(Transactor::new(transport, self.config.timeout))
    }
}
