use std::fmt::Display;

use crate::error::Error;

/// A note channel as reported by the setup request.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Channel {
    index: u8,
    value: u32,
    currency: String,
}

impl Channel {
    pub fn new(index: u8, value: u32, currency: impl Into<String>) -> Channel {
        Channel {
            index,
            value,
            currency: currency.into(),
        }
    }

    /// Zero based position in the channel table, also the bit in a [`ChannelMask`](crate::command::ChannelMask).
    pub fn index(&self) -> u8 {
        self.index
    }

    /// The note value, already scaled by the value multiplier
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Three letter currency code
    pub fn currency(&self) -> &str {
        &self.currency
    }
}

impl Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}

/// Event codes reported in the poll response.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EventCode {
    Reset,
    Read,
    Credit,
    Rejecting,
    Rejected,
    Stacking,
    Stacked,
    SafeJam,
    UnsafeJam,
    Disabled,
    StackerFull,
    ClearedToFront,
    ClearedToCashbox,
    ChannelsDisabled,
    Initializing,
    TicketInBezel,
    PrintedToCashbox,
    /// A code this driver does not know. It is assumed to carry no data.
    Unrecognized(u8),
}

impl EventCode {
    pub fn from_code(code: u8) -> EventCode {
        match code {
            0xF1 => EventCode::Reset,
            0xEF => EventCode::Read,
            0xEE => EventCode::Credit,
            0xED => EventCode::Rejecting,
            0xEC => EventCode::Rejected,
            0xCC => EventCode::Stacking,
            0xEB => EventCode::Stacked,
            0xEA => EventCode::SafeJam,
            0xE9 => EventCode::UnsafeJam,
            0xE8 => EventCode::Disabled,
            0xE7 => EventCode::StackerFull,
            0xE1 => EventCode::ClearedToFront,
            0xE2 => EventCode::ClearedToCashbox,
            0xB5 => EventCode::ChannelsDisabled,
            0xB6 => EventCode::Initializing,
            0xAD => EventCode::TicketInBezel,
            0xAF => EventCode::PrintedToCashbox,
            other => EventCode::Unrecognized(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            EventCode::Reset => 0xF1,
            EventCode::Read => 0xEF,
            EventCode::Credit => 0xEE,
            EventCode::Rejecting => 0xED,
            EventCode::Rejected => 0xEC,
            EventCode::Stacking => 0xCC,
            EventCode::Stacked => 0xEB,
            EventCode::SafeJam => 0xEA,
            EventCode::UnsafeJam => 0xE9,
            EventCode::Disabled => 0xE8,
            EventCode::StackerFull => 0xE7,
            EventCode::ClearedToFront => 0xE1,
            EventCode::ClearedToCashbox => 0xE2,
            EventCode::ChannelsDisabled => 0xB5,
            EventCode::Initializing => 0xB6,
            EventCode::TicketInBezel => 0xAD,
            EventCode::PrintedToCashbox => 0xAF,
            EventCode::Unrecognized(code) => code,
        }
    }

    /// Whether the code is followed by a channel byte
    pub fn has_channel(self) -> bool {
        matches!(
            self,
            EventCode::Read
                | EventCode::Credit
                | EventCode::ClearedToFront
                | EventCode::ClearedToCashbox
        )
    }

    pub fn description(self) -> &'static str {
        match self {
            EventCode::Reset => "Reset",
            EventCode::Read => "Read",
            EventCode::Credit => "Credit",
            EventCode::Rejecting => "Rejecting",
            EventCode::Rejected => "Rejected",
            EventCode::Stacking => "Stacking",
            EventCode::Stacked => "Stacked",
            EventCode::SafeJam => "Safe jam",
            EventCode::UnsafeJam => "Unsafe jam",
            EventCode::Disabled => "Disabled",
            EventCode::StackerFull => "Stacker full",
            EventCode::ClearedToFront => "Cleared to front",
            EventCode::ClearedToCashbox => "Cleared to cashbox",
            EventCode::ChannelsDisabled => "Channels disabled",
            EventCode::Initializing => "Initializing",
            EventCode::TicketInBezel => "Ticket in bezel",
            EventCode::PrintedToCashbox => "Printed to cashbox",
            EventCode::Unrecognized(_) => "Unrecognized event",
        }
    }
}

/// A single entry of a poll response.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Event {
    code: EventCode,
    channel: Option<Channel>,
}

impl Event {
    pub fn new(code: EventCode, channel: Option<Channel>) -> Event {
        Event { code, channel }
    }

    pub fn code(&self) -> EventCode {
        self.code
    }

    /// The channel the event refers to, if the device reported one.
    pub fn channel(&self) -> Option<&Channel> {
        self.channel.as_ref()
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            EventCode::Unrecognized(code) => write!(f, "{} ({:#04x})", self.code.description(), code)?,
            code => write!(f, "{}", code.description())?,
        }
        if let Some(channel) = &self.channel {
            write!(f, " -> {}", channel)?;
        }
        Ok(())
    }
}

/// Decodes the payload of a poll response into its events, in the order reported.
///
/// Channel numbers are 1-based; 0 means no channel.
pub fn decode_events(data: &[u8], channels: &[Channel]) -> Result<Vec<Event>, Error> {
    let mut events = Vec::new();
    let mut rest = data;
    while let Some((&byte, tail)) = rest.split_first() {
        let code = EventCode::from_code(byte);
        rest = tail;
        let channel = if code.has_channel() {
            let (&number, tail) = rest.split_first().ok_or_else(|| {
                Error::InvalidFormat(format!(
                    "Missing channel byte after event {:#04x}",
                    byte
                ))
            })?;
            rest = tail;
            resolve_channel(number, channels)?
        } else {
            None
        };
        events.push(Event::new(code, channel));
    }
    Ok(events)
}

fn resolve_channel(number: u8, channels: &[Channel]) -> Result<Option<Channel>, Error> {
    match number {
        0 => Ok(None),
        n => channels
            .get(n as usize - 1)
            .cloned()
            .map(Some)
            .ok_or(Error::ChannelIndexOutOfRange {
                channel: n as usize,
                available: channels.len(),
            }),
    }
}
