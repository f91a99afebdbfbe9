//! # SSP Client
//!
//! A blocking host-side driver for bill validators speaking the Smiley Secure Protocol (SSP),
//! such as the Innovative Technology NV9USB.
//!
//! ## Overview
//!
//! The driver owns a byte transport (normally a serial port) and exchanges one command frame
//! and one response frame at a time. On top of the transaction handling in [`transaction`],
//! [`Biller`] offers the operations of the validator:
//!
//! - **Session setup**: synchronization, serial number, firmware version, channel table
//! - **Acceptance**: enable/disable the validator and individual channels
//! - **Display**: switch the bezel LEDs on and off
//! - **Escrow**: hold or reject the note currently read
//! - **Counters**: read and reset the note counters
//! - **Poll**: fetch the events since the previous poll
//!
//! For the frame format and payload decoding, see the `ssp-protocol` crate.
//!
//! ## Basic Usage
//!
//! ```ignore
//! use ssp_client::Biller;
//! use ssp_protocol::command::ChannelMask;
//!
//! let mut biller = Biller::open("/dev/ttyACM0")?;
//! println!("SN: {:08X}", biller.serial());
//!
//! biller.set_channel_mask(ChannelMask::ALL)?;
//! biller.display_enable()?;
//! biller.enable()?;
//!
//! loop {
//!     for event in biller.poll()? {
//!         println!("{}", event);
//!     }
//!     std::thread::sleep(std::time::Duration::from_millis(500));
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns [`Error`]. Nothing is retried: a failed transaction leaves the
//! sequence bit unchanged and callers decide whether to [`Biller::synchronize`] and try again.
//!
//! ## Logging
//!
//! This crate uses the `log` crate. Transactions are logged at `debug` level and raw frames
//! at `trace` level.
//!
//! ## Thread Model
//!
//! A session is used from one thread at a time. Wrap it in a mutex to share it.
use std::io::{Read, Write};

use serialport::SerialPort;
use ssp_protocol::{
    command::{
        ChannelMask, Counters, Disable, DisplayDisable, DisplayEnable, Enable, GetCounters,
        GetSerial, Hold, Poll, Reject, ResetCounters, SetChannelInhibits, SetupRequest,
    },
    event::{Channel, Event},
};

pub use ssp_protocol::error::Error;

pub mod config;
pub mod transaction;

use config::Builder;
use transaction::Transactor;

/// Device information loaded while establishing the session.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionConfig {
    serial: u32,
    firmware_version: String,
    channels: Vec<Channel>,
}

impl SessionConfig {
    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn firmware_version(&self) -> &str {
        &self.firmware_version
    }

    /// The channel table. Channel number `n` in events is entry `n - 1`.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }
}

/// A session with a bill validator.
#[derive(Debug)]
pub struct Biller<T> {
    transactor: Transactor<T>,
    config: SessionConfig,
}

impl Biller<Box<dyn SerialPort>> {
    /// Opens the serial port with the default configuration and establishes a session.
    pub fn open(path: &str) -> Result<Self, Error> {
        Builder::new().open(path)
    }
}

impl<T: Read + Write> Biller<T> {
    /// Establishes a session with the default configuration on a freshly opened transport.
    pub fn establish(transport: T) -> Result<Self, Error> {
        Builder::new().establish(transport)
    }

    pub(crate) fn with_transactor(mut transactor: Transactor<T>) -> Result<Self, Error> {
        transactor.synchronize()?;
        let serial = transactor.execute(&GetSerial)?;
        let setup = transactor.execute(&SetupRequest)?;
        log::info!(
            "Connected to validator SN {:08X}, firmware {}, {} channels",
            serial,
            setup.firmware_version,
            setup.channels.len()
        );
        for channel in &setup.channels {
            log::debug!("Channel {}: {}", channel.index() + 1, channel);
        }

        Ok(Biller {
            transactor,
            config: SessionConfig {
                serial,
                firmware_version: setup.firmware_version,
                channels: setup.channels,
            },
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn serial(&self) -> u32 {
        self.config.serial
    }

    pub fn firmware_version(&self) -> &str {
        &self.config.firmware_version
    }

    pub fn channels(&self) -> &[Channel] {
        &self.config.channels
    }

    pub fn transactor(&self) -> &Transactor<T> {
        &self.transactor
    }

    pub fn into_inner(self) -> T {
        self.transactor.into_inner()
    }

    /// Resynchronizes the link after a failed transaction.
    pub fn synchronize(&mut self) -> Result<(), Error> {
        self.transactor.synchronize()
    }

    /// Enables exactly the given zero based channels. An empty set disables all channels.
    pub fn set_channel_inhibits(
        &mut self,
        channels: impl IntoIterator<Item = u8>,
    ) -> Result<(), Error> {
        self.set_channel_mask(ChannelMask::from_channels(channels)?)
    }

    pub fn set_channel_mask(&mut self, mask: ChannelMask) -> Result<(), Error> {
        log::debug!("Setting channel mask {:#06x}", mask.bits());
        self.transactor.execute(&SetChannelInhibits(mask))
    }

    pub fn enable(&mut self) -> Result<(), Error> {
        self.transactor.execute(&Enable)
    }

    pub fn disable(&mut self) -> Result<(), Error> {
        self.transactor.execute(&Disable)
    }

    pub fn display_enable(&mut self) -> Result<(), Error> {
        self.transactor.execute(&DisplayEnable)
    }

    pub fn display_disable(&mut self) -> Result<(), Error> {
        self.transactor.execute(&DisplayDisable)
    }

    /// Returns the note in escrow.
    pub fn reject(&mut self) -> Result<(), Error> {
        self.transactor.execute(&Reject)
    }

    /// Keeps the note in escrow until the next poll.
    pub fn hold(&mut self) -> Result<(), Error> {
        self.transactor.execute(&Hold)
    }

    pub fn counters(&mut self) -> Result<Counters, Error> {
        self.transactor.execute(&GetCounters)
    }

    pub fn reset_counters(&mut self) -> Result<(), Error> {
        self.transactor.execute(&ResetCounters)
    }

    /// Fetches the events that occurred since the previous poll.
    pub fn poll(&mut self) -> Result<Vec<Event>, Error> {
        let events = self
            .transactor
            .execute(&Poll::new(&self.config.channels))?;
        for event in &events {
            log::debug!("Event: {}", event);
        }
        Ok(events)
    }
}
