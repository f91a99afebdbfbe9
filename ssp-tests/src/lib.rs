//! A simulated NV9 bill validator for exercising the driver without hardware.
//!
//! [`SimulatedBiller`] is the transport handed to the driver. Bytes written to it are decoded
//! as request frames and answered the way a validator would; the answers become readable
//! immediately. [`DeviceHandle`] shares the device state so tests can queue events, inject
//! failures and inspect what the driver sent.
use std::{
    collections::VecDeque,
    io::{self, Read, Write},
    sync::{Arc, Mutex, MutexGuard},
};

use ssp_protocol::{
    CommandCode, Frame, STATUS_OK, Sequence,
    codec::{FrameReceiver, encode_frame},
    command::{ChannelMask, Counters},
};

const STATUS_COMMAND_NOT_KNOWN: u8 = 0xF2;
const STATUS_WRONG_PARAMETER_COUNT: u8 = 0xF3;

/// Observable state of the simulated device.
#[derive(Debug, Clone)]
pub struct DeviceState {
    pub serial: u32,
    pub firmware_version: [u8; 4],
    pub multiplier: u32,
    /// Raw channel values and currencies, in channel order
    pub channels: Vec<(u8, [u8; 3])>,
    pub enabled: bool,
    pub display_enabled: bool,
    pub mask: ChannelMask,
    pub counters: Counters,
    /// Raw poll payload bytes delivered on the next poll
    pub pending_events: Vec<u8>,
    /// Every request frame received, in order
    pub requests: Vec<Frame>,
    /// Status to answer the next request with instead of processing it
    pub inject_status: Option<u8>,
    pub corrupt_next_response: bool,
    /// Swallow requests without answering
    pub silent: bool,
    /// Bytes sent before every response
    pub line_noise: Vec<u8>,
}

impl Default for DeviceState {
    fn default() -> Self {
        DeviceState {
            serial: 0x0012_D687,
            firmware_version: *b"0380",
            multiplier: 1,
            channels: vec![(5, *b"EUR"), (10, *b"EUR"), (20, *b"EUR")],
            enabled: false,
            display_enabled: false,
            mask: ChannelMask::NONE,
            counters: Counters::default(),
            pending_events: Vec::new(),
            requests: Vec::new(),
            inject_status: None,
            corrupt_next_response: false,
            silent: false,
            line_noise: Vec::new(),
        }
    }
}

impl DeviceState {
    /// Builds the setup response: unit type, firmware, country, multiplier, channel values,
    /// channel security, real value multiplier, protocol version, channel currencies.
    fn setup_payload(&self) -> Vec<u8> {
        let count = self.channels.len();
        let mut payload = vec![0x00];
        payload.extend_from_slice(&self.firmware_version);
        payload.extend_from_slice(self.channels.first().map_or(b"EUR", |(_, c)| c));
        payload.extend_from_slice(&self.multiplier.to_be_bytes()[1..]);
        payload.push(count as u8);
        payload.extend(self.channels.iter().map(|(value, _)| *value));
        payload.extend(std::iter::repeat_n(2, count));
        payload.extend_from_slice(&[0x00, 0x00, 0x64]);
        payload.push(6);
        for (_, currency) in &self.channels {
            payload.extend_from_slice(currency);
        }
        payload
    }

    fn counters_payload(&self) -> Vec<u8> {
        let counters = &self.counters;
        let mut payload = vec![5];
        for value in [
            counters.stacked,
            counters.stored,
            counters.dispensed,
            counters.transferred,
            counters.rejected,
        ] {
            payload.extend_from_slice(&value.to_le_bytes());
        }
        payload
    }

    /// Processes one request, returning status and response payload.
    fn process(&mut self, request: &Frame) -> (u8, Vec<u8>) {
        if let Some(status) = self.inject_status.take() {
            return (status, Vec::new());
        }
        let Some(command) = CommandCode::from_code(request.code()) else {
            return (STATUS_COMMAND_NOT_KNOWN, Vec::new());
        };
        log::debug!("Simulated device received {:?}", command);
        match command {
            CommandCode::Sync | CommandCode::Reject | CommandCode::Hold => (STATUS_OK, Vec::new()),
            CommandCode::GetSerial => (STATUS_OK, self.serial.to_be_bytes().to_vec()),
            CommandCode::SetupRequest => (STATUS_OK, self.setup_payload()),
            CommandCode::ChannelInhibits => match request.payload() {
                [low, high] => {
                    self.mask = ChannelMask::from_bits(u16::from_le_bytes([*low, *high]));
                    (STATUS_OK, Vec::new())
                }
                _ => (STATUS_WRONG_PARAMETER_COUNT, Vec::new()),
            },
            CommandCode::Enable => {
                self.enabled = true;
                (STATUS_OK, Vec::new())
            }
            CommandCode::Disable => {
                self.enabled = false;
                (STATUS_OK, Vec::new())
            }
            CommandCode::DisplayEnable => {
                self.display_enabled = true;
                (STATUS_OK, Vec::new())
            }
            CommandCode::DisplayDisable => {
                self.display_enabled = false;
                (STATUS_OK, Vec::new())
            }
            CommandCode::Poll => (STATUS_OK, std::mem::take(&mut self.pending_events)),
            CommandCode::CountersGet => (STATUS_OK, self.counters_payload()),
            CommandCode::CountersReset => {
                self.counters = Counters::default();
                (STATUS_OK, Vec::new())
            }
        }
    }
}

/// Shared access to the state of a [`SimulatedBiller`].
#[derive(Debug, Clone, Default)]
pub struct DeviceHandle {
    state: Arc<Mutex<DeviceState>>,
}

impl DeviceHandle {
    pub fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Queues raw event bytes for the next poll.
    pub fn queue_events(&self, events: &[u8]) {
        self.state().pending_events.extend_from_slice(events);
    }

    /// Sequence bits of all requests received so far.
    pub fn request_sequences(&self) -> Vec<Sequence> {
        self.state().requests.iter().map(Frame::sequence).collect()
    }

    /// Command codes of all requests received so far.
    pub fn request_codes(&self) -> Vec<u8> {
        self.state().requests.iter().map(Frame::code).collect()
    }
}

/// Transport end of the simulated validator.
#[derive(Debug)]
pub struct SimulatedBiller {
    handle: DeviceHandle,
    receiver: FrameReceiver,
    outgoing: VecDeque<u8>,
}

impl SimulatedBiller {
    pub fn new() -> (SimulatedBiller, DeviceHandle) {
        SimulatedBiller::with_state(DeviceState::default())
    }

    pub fn with_state(state: DeviceState) -> (SimulatedBiller, DeviceHandle) {
        let handle = DeviceHandle {
            state: Arc::new(Mutex::new(state)),
        };
        let device = SimulatedBiller {
            handle: handle.clone(),
            receiver: FrameReceiver::new(),
            outgoing: VecDeque::new(),
        };
        (device, handle)
    }

    fn respond(&mut self, request: Frame) -> io::Result<()> {
        let mut state = self.handle.state();
        state.requests.push(request.clone());
        if state.silent {
            return Ok(());
        }
        let (status, payload) = state.process(&request);
        let mut response =
            encode_frame(request.sequence(), status, &payload).map_err(io::Error::other)?;
        if std::mem::take(&mut state.corrupt_next_response) {
            let last = response.len() - 1;
            response[last] ^= 0x01;
        }
        self.outgoing.extend(state.line_noise.iter().copied());
        self.outgoing.extend(response);
        Ok(())
    }
}

impl Write for SimulatedBiller {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            if let Some(request) = self.receiver.push(byte).map_err(io::Error::other)? {
                self.respond(request)?;
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for SimulatedBiller {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.outgoing.is_empty() {
            // Like a serial port whose read timeout elapsed
            std::thread::sleep(std::time::Duration::from_millis(1));
            return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
        }
        let count = buf.len().min(self.outgoing.len());
        for (slot, byte) in buf.iter_mut().zip(self.outgoing.drain(..count)) {
            *slot = byte;
        }
        Ok(count)
    }
}
