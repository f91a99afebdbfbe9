//! Typed descriptors for the commands of the validator.
//!
//! Every command is a [`Request`]: it names its [`CommandCode`], produces the request payload
//! and knows how to turn the response payload into a value. The transaction layer only needs
//! a single generic entry point to drive all of them.
use std::str;

use crate::{
    error::Error,
    event::{Channel, Event, decode_events},
    protocol::{CommandCode, MAX_CHANNELS},
};

pub trait Request {
    const COMMAND: CommandCode;
    type Response;

    /// The request payload. Most commands send none.
    fn payload(&self) -> Vec<u8> {
        Vec::new()
    }

    fn parse_response(&self, payload: &[u8]) -> Result<Self::Response, Error>;
}

fn ensure_len(payload: &[u8], required: usize, what: &str) -> Result<(), Error> {
    if payload.len() < required {
        return Err(Error::InvalidFormat(format!(
            "{} response too short: expected at least {} bytes, got {}",
            what,
            required,
            payload.len()
        )));
    }
    Ok(())
}

macro_rules! unit_requests {
    ($($(#[$meta:meta])* $name:ident => $command:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
            pub struct $name;

            impl Request for $name {
                const COMMAND: CommandCode = CommandCode::$command;
                type Response = ();

                fn parse_response(&self, _payload: &[u8]) -> Result<(), Error> {
                    Ok(())
                }
            }
        )*
    };
}

unit_requests! {
    /// Resets the sequence handshake of the device.
    Synchronize => Sync,
    Enable => Enable,
    Disable => Disable,
    /// Turns the bezel LEDs on.
    DisplayEnable => DisplayEnable,
    DisplayDisable => DisplayDisable,
    /// Returns the note held in escrow to the customer.
    Reject => Reject,
    /// Keeps the note in escrow for another poll interval.
    Hold => Hold,
    ResetCounters => CountersReset,
}

/// Requests the 32 bit serial number.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct GetSerial;

impl Request for GetSerial {
    const COMMAND: CommandCode = CommandCode::GetSerial;
    type Response = u32;

    fn parse_response(&self, payload: &[u8]) -> Result<u32, Error> {
        ensure_len(payload, 4, "Serial number")?;
        Ok(u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]))
    }
}

/// The parts of the setup response the driver keeps.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Setup {
    pub firmware_version: String,
    pub channels: Vec<Channel>,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SetupRequest;

impl SetupRequest {
    const FIRMWARE_OFFSET: usize = 1;
    const MULTIPLIER_OFFSET: usize = 8;
    const CHANNEL_COUNT_OFFSET: usize = 11;
    const CHANNEL_VALUES_OFFSET: usize = 12;
    /// Start of the currency codes when there are no channels. Each channel adds two bytes before it.
    const CURRENCY_BASE_OFFSET: usize = 16;
}

impl Request for SetupRequest {
    const COMMAND: CommandCode = CommandCode::SetupRequest;
    type Response = Setup;

    fn parse_response(&self, payload: &[u8]) -> Result<Setup, Error> {
        ensure_len(payload, Self::CHANNEL_COUNT_OFFSET + 1, "Setup")?;

        let firmware_version =
            str::from_utf8(&payload[Self::FIRMWARE_OFFSET..Self::FIRMWARE_OFFSET + 4])?.to_string();
        let multiplier = u32::from_be_bytes([
            0,
            payload[Self::MULTIPLIER_OFFSET],
            payload[Self::MULTIPLIER_OFFSET + 1],
            payload[Self::MULTIPLIER_OFFSET + 2],
        ]);

        let count = payload[Self::CHANNEL_COUNT_OFFSET] as usize;
        if count > MAX_CHANNELS {
            return Err(Error::ChannelIndexOutOfRange {
                channel: count,
                available: MAX_CHANNELS,
            });
        }
        let currency_offset = Self::CURRENCY_BASE_OFFSET + count * 2;
        ensure_len(payload, currency_offset + count * 3, "Setup")?;

        let channels = (0..count)
            .map(|index| -> Result<Channel, Error> {
                let value = payload[Self::CHANNEL_VALUES_OFFSET + index] as u32 * multiplier;
                let offset = currency_offset + index * 3;
                let currency = str::from_utf8(&payload[offset..offset + 3])?;
                Ok(Channel::new(index as u8, value, currency))
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(Setup {
            firmware_version,
            channels,
        })
    }
}

/// Bit `i` set enables channel `i`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct ChannelMask(u16);

impl ChannelMask {
    pub const NONE: ChannelMask = ChannelMask(0);
    pub const ALL: ChannelMask = ChannelMask(u16::MAX);

    pub fn from_bits(bits: u16) -> ChannelMask {
        ChannelMask(bits)
    }

    /// Builds a mask from zero based channel indices.
    pub fn from_channels(channels: impl IntoIterator<Item = u8>) -> Result<ChannelMask, Error> {
        channels.into_iter().try_fold(ChannelMask::NONE, |mask, channel| {
            if channel as usize >= MAX_CHANNELS {
                return Err(Error::ChannelIndexOutOfRange {
                    channel: channel as usize,
                    available: MAX_CHANNELS,
                });
            }
            Ok(ChannelMask(mask.0 | 1 << channel))
        })
    }

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn contains(self, channel: u8) -> bool {
        (channel as usize) < MAX_CHANNELS && self.0 & (1 << channel) != 0
    }
}

/// Enables exactly the channels of the mask.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SetChannelInhibits(pub ChannelMask);

impl Request for SetChannelInhibits {
    const COMMAND: CommandCode = CommandCode::ChannelInhibits;
    type Response = ();

    fn payload(&self) -> Vec<u8> {
        self.0.bits().to_le_bytes().to_vec()
    }

    fn parse_response(&self, _payload: &[u8]) -> Result<(), Error> {
        Ok(())
    }
}

/// Note counters kept by the device
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Counters {
    pub stacked: u32,
    pub stored: u32,
    pub dispensed: u32,
    pub transferred: u32,
    pub rejected: u32,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct GetCounters;

impl Request for GetCounters {
    const COMMAND: CommandCode = CommandCode::CountersGet;
    type Response = Counters;

    fn parse_response(&self, payload: &[u8]) -> Result<Counters, Error> {
        // The first byte holds the number of counters that follow.
        ensure_len(payload, 1 + 5 * 4, "Counters")?;
        let counter = |offset: usize| {
            u32::from_le_bytes([
                payload[offset],
                payload[offset + 1],
                payload[offset + 2],
                payload[offset + 3],
            ])
        };
        Ok(Counters {
            stacked: counter(1),
            stored: counter(5),
            dispensed: counter(9),
            transferred: counter(13),
            rejected: counter(17),
        })
    }
}

/// Fetches the events since the last poll, resolving channels against the given table.
#[derive(Copy, Clone, Debug)]
pub struct Poll<'a> {
    channels: &'a [Channel],
}

impl<'a> Poll<'a> {
    pub fn new(channels: &'a [Channel]) -> Poll<'a> {
        Poll { channels }
    }
}

impl Request for Poll<'_> {
    const COMMAND: CommandCode = CommandCode::Poll;
    type Response = Vec<Event>;

    fn parse_response(&self, payload: &[u8]) -> Result<Vec<Event>, Error> {
        decode_events(payload, self.channels)
    }
}
