use std::fmt::Display;

/// Marks the beginning of every frame. Inside a frame the value is doubled.
pub const STX: u8 = 0x7F;

/// Bit of the sequence byte that alternates between transactions.
pub const SEQUENCE_FLAG: u8 = 0x80;

/// Status code of a successful response.
pub const STATUS_OK: u8 = 0xF0;

/// Largest payload that still fits the one byte length field next to the code byte.
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize - 1;

/// Number of channels a validator can report.
pub const MAX_CHANNELS: usize = 16;

/// The alternating sequence bit that pairs a request with its response.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Sequence(bool);

impl Sequence {
    /// The state after synchronization
    pub const ZERO: Sequence = Sequence(false);
    pub const ONE: Sequence = Sequence(true);

    /// Decodes the sequence bit; the lower bits carry the slave address.
    pub fn from_byte(byte: u8) -> Sequence {
        Sequence(byte & SEQUENCE_FLAG != 0)
    }

    pub fn to_byte(self) -> u8 {
        if self.0 { SEQUENCE_FLAG } else { 0x00 }
    }

    pub fn toggled(self) -> Sequence {
        Sequence(!self.0)
    }

    pub fn is_set(self) -> bool {
        self.0
    }
}

impl Display for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0 as u8)
    }
}

/// Command codes understood by the validator.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum CommandCode {
    ChannelInhibits = 0x02,
    DisplayEnable = 0x03,
    DisplayDisable = 0x04,
    SetupRequest = 0x05,
    Poll = 0x07,
    Reject = 0x08,
    Disable = 0x09,
    Enable = 0x0A,
    GetSerial = 0x0C,
    Sync = 0x11,
    Hold = 0x18,
    CountersGet = 0x58,
    CountersReset = 0x59,
}

impl CommandCode {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<CommandCode> {
        let command = match code {
            0x02 => CommandCode::ChannelInhibits,
            0x03 => CommandCode::DisplayEnable,
            0x04 => CommandCode::DisplayDisable,
            0x05 => CommandCode::SetupRequest,
            0x07 => CommandCode::Poll,
            0x08 => CommandCode::Reject,
            0x09 => CommandCode::Disable,
            0x0A => CommandCode::Enable,
            0x0C => CommandCode::GetSerial,
            0x11 => CommandCode::Sync,
            0x18 => CommandCode::Hold,
            0x58 => CommandCode::CountersGet,
            0x59 => CommandCode::CountersReset,
            _ => return None,
        };
        Some(command)
    }
}

/// A non-OK status returned by the device in place of a response.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum DeviceError {
    CommandNotKnown,
    WrongParameterCount,
    ParameterOutOfRange,
    CannotProcess,
    SoftwareError,
    GeneralFailure,
    KeysNotNegotiated,
    /// A status byte outside the documented table
    Unrecognized(u8),
}

impl DeviceError {
    pub fn from_code(code: u8) -> DeviceError {
        match code {
            0xF2 => DeviceError::CommandNotKnown,
            0xF3 => DeviceError::WrongParameterCount,
            0xF4 => DeviceError::ParameterOutOfRange,
            0xF5 => DeviceError::CannotProcess,
            0xF6 => DeviceError::SoftwareError,
            0xF8 => DeviceError::GeneralFailure,
            0xFA => DeviceError::KeysNotNegotiated,
            other => DeviceError::Unrecognized(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            DeviceError::CommandNotKnown => 0xF2,
            DeviceError::WrongParameterCount => 0xF3,
            DeviceError::ParameterOutOfRange => 0xF4,
            DeviceError::CannotProcess => 0xF5,
            DeviceError::SoftwareError => 0xF6,
            DeviceError::GeneralFailure => 0xF8,
            DeviceError::KeysNotNegotiated => 0xFA,
            DeviceError::Unrecognized(code) => code,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            DeviceError::CommandNotKnown => "Command not known",
            DeviceError::WrongParameterCount => "Incorrect number of parameters",
            DeviceError::ParameterOutOfRange => "One of the parameters is out of range",
            DeviceError::CannotProcess => "Command could not be processed",
            DeviceError::SoftwareError => "Software error",
            DeviceError::GeneralFailure => "General failure",
            DeviceError::KeysNotNegotiated => "Encryption keys not negotiated",
            DeviceError::Unrecognized(_) => "Unrecognized status",
        }
    }
}

impl Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:#04x})", self.description(), self.code())
    }
}

#[test]
fn device_error_codes_round_trip_through_table() {
    for code in [0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF8, 0xFA] {
        let error = DeviceError::from_code(code);
        assert!(!matches!(error, DeviceError::Unrecognized(_)));
        assert_eq!(error.code(), code);
    }
    assert_eq!(DeviceError::from_code(0xF7), DeviceError::Unrecognized(0xF7));
    assert_eq!(
        DeviceError::from_code(0xF4).to_string(),
        "One of the parameters is out of range (0xf4)"
    );
}

/// A single frame, without start byte, stuffing and checksum.
///
/// The `code` is a [`CommandCode`] for requests and a status byte for responses.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Frame {
    sequence: Sequence,
    code: u8,
    payload: Box<[u8]>,
}

impl Frame {
    pub fn new(sequence: Sequence, code: u8, payload: impl Into<Box<[u8]>>) -> Frame {
        Frame {
            sequence,
            code,
            payload: payload.into(),
        }
    }

    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    pub fn code(&self) -> u8 {
        self.code
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Interprets the frame as a response: the payload for an OK status, the device error otherwise.
    pub fn into_response(self) -> Result<Box<[u8]>, DeviceError> {
        if self.code == STATUS_OK {
            Ok(self.payload)
        } else {
            Err(DeviceError::from_code(self.code))
        }
    }
}

#[test]
fn sequence_wire_values() {
    assert_eq!(Sequence::ZERO.to_byte(), 0x00);
    assert_eq!(Sequence::ONE.to_byte(), 0x80);
    assert_eq!(Sequence::from_byte(0x80), Sequence::ONE);
    assert_eq!(Sequence::from_byte(0x00), Sequence::ZERO);
    assert_eq!(Sequence::ZERO.toggled().toggled(), Sequence::ZERO);
}
