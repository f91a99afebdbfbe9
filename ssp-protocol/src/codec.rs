//! Framing, byte stuffing and checksum handling for SSP frames
use std::io::Read;

use crc::{CRC_16_IBM_3740, Crc};

use crate::{
    error::Error,
    protocol::{Frame, MAX_PAYLOAD_LEN, STX, Sequence},
};

/// CRC-16 with polynomial 0x1021, initial value 0xFFFF and no reflection.
const SSP_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

const CRC_LEN: u8 = 2;

/// Computes the frame checksum over the unstuffed bytes from the sequence byte up to the end of the payload.
pub fn checksum(data: &[u8]) -> u16 {
    SSP_CRC.checksum(data)
}

#[test]
fn checksum_check_value() {
    assert_eq!(checksum(b"123456789"), 0x29B1);
}

fn push_stuffed(out: &mut Vec<u8>, bytes: &[u8]) {
    for &byte in bytes {
        out.push(byte);
        if byte == STX {
            out.push(STX);
        }
    }
}

/// Encodes a frame into its wire representation, including start byte, stuffing and checksum.
pub fn encode_frame(sequence: Sequence, code: u8, payload: &[u8]) -> Result<Vec<u8>, Error> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(Error::PayloadTooLong(payload.len()));
    }

    let mut body = Vec::with_capacity(payload.len() + 5);
    body.push(sequence.to_byte());
    body.push(payload.len() as u8 + 1);
    body.push(code);
    body.extend_from_slice(payload);
    let crc = checksum(&body);
    body.extend_from_slice(&crc.to_le_bytes());

    let mut out = Vec::with_capacity(body.len() * 2 + 1);
    out.push(STX);
    push_stuffed(&mut out, &body);
    Ok(out)
}

impl Frame {
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        encode_frame(self.sequence(), self.code(), self.payload())
    }

    /// Reads bytes until one complete and valid frame has been received.
    ///
    /// Bytes preceding the start byte are discarded.
    /// Running out of input before the frame completes yields an I/O error.
    pub fn from_reader(reader: &mut impl Read) -> Result<Frame, Error> {
        let mut receiver = FrameReceiver::new();
        let mut byte = [0u8; 1];
        loop {
            reader.read_exact(&mut byte)?;
            if let Some(frame) = receiver.push(byte[0])? {
                return Ok(frame);
            }
        }
    }
}

/// Frame field the next unstuffed byte belongs to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Field {
    Seq,
    Length,
    /// Code byte and payload, `remaining` bytes left
    Data { remaining: u8 },
    Crc { remaining: u8 },
}

/// States of the frame reception.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RxState {
    /// Discarding noise until a start byte appears
    WaitStart,
    /// Inside a frame, expecting a byte of the given field
    Wait(Field),
    /// A start byte arrived inside a frame. A second start byte is a literal byte of the
    /// field; anything else begins a new frame.
    Escaped(Field),
    /// A frame was just completed. Behaves like `WaitStart` for the next byte.
    Done,
}

/// Byte-wise receive state machine.
///
/// Bytes are pushed one at a time and the next state depends only on the current [`RxState`]
/// and the byte. Inside a frame, a doubled start byte is a single data byte while a lone start
/// byte opens a new frame, dropping whatever was collected so far.
#[derive(Debug, Clone)]
pub struct FrameReceiver {
    state: RxState,
    buffer: Vec<u8>,
}

impl Default for FrameReceiver {
    fn default() -> Self {
        FrameReceiver::new()
    }
}

impl FrameReceiver {
    pub fn new() -> FrameReceiver {
        FrameReceiver {
            state: RxState::WaitStart,
            buffer: Vec::with_capacity(32),
        }
    }

    pub fn state(&self) -> RxState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = RxState::WaitStart;
        self.buffer.clear();
    }

    /// Advances the state machine by one byte.
    ///
    /// Returns the frame once its last checksum byte arrived.
    pub fn push(&mut self, byte: u8) -> Result<Option<Frame>, Error> {
        match self.state {
            RxState::WaitStart | RxState::Done => {
                if byte == STX {
                    self.restart();
                }
                Ok(None)
            }
            RxState::Wait(field) if byte == STX => {
                self.state = RxState::Escaped(field);
                Ok(None)
            }
            RxState::Wait(field) => self.accept(field, byte),
            RxState::Escaped(field) if byte == STX => self.accept(field, byte),
            RxState::Escaped(_) => {
                log::warn!("Unstuffed start byte inside frame, restarting reception");
                self.restart();
                self.accept(Field::Seq, byte)
            }
        }
    }

    fn restart(&mut self) {
        self.buffer.clear();
        self.state = RxState::Wait(Field::Seq);
    }

    fn accept(&mut self, field: Field, byte: u8) -> Result<Option<Frame>, Error> {
        self.buffer.push(byte);
        let next = match field {
            Field::Seq => RxState::Wait(Field::Length),
            Field::Length if byte == 0 => {
                self.reset();
                return Err(Error::InvalidFormat(
                    "Frame length must include the code byte".to_string(),
                ));
            }
            Field::Length => RxState::Wait(Field::Data { remaining: byte }),
            Field::Data { remaining: 1 } => RxState::Wait(Field::Crc {
                remaining: CRC_LEN,
            }),
            Field::Data { remaining } => RxState::Wait(Field::Data {
                remaining: remaining - 1,
            }),
            Field::Crc { remaining: 1 } => RxState::Done,
            Field::Crc { remaining } => RxState::Wait(Field::Crc {
                remaining: remaining - 1,
            }),
        };
        self.state = next;

        if next == RxState::Done {
            self.finish().map(Some)
        } else {
            Ok(None)
        }
    }

    fn finish(&mut self) -> Result<Frame, Error> {
        let (body, crc) = self.buffer.split_at(self.buffer.len() - CRC_LEN as usize);
        let computed = checksum(body);
        let received = u16::from_le_bytes([crc[0], crc[1]]);
        if computed != received {
            return Err(Error::CrcMismatch { computed, received });
        }
        Ok(Frame::new(Sequence::from_byte(body[0]), body[2], &body[3..]))
    }
}

#[cfg(feature = "tokio")]
mod framed {
    use bytes::{Buf, BufMut, BytesMut};
    use tokio_util::codec::{Decoder, Encoder};

    use super::FrameReceiver;
    use crate::{error::Error, protocol::Frame};

    /// [`tokio_util`] codec for SSP frames, sharing the byte-wise [`FrameReceiver`].
    #[derive(Debug, Default, Clone)]
    pub struct SspCodec {
        receiver: FrameReceiver,
    }

    impl SspCodec {
        pub fn new() -> SspCodec {
            SspCodec::default()
        }
    }

    impl Decoder for SspCodec {
        type Item = Frame;
        type Error = Error;

        fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, Error> {
            while src.has_remaining() {
                let byte = src.get_u8();
                if let Some(frame) = self.receiver.push(byte)? {
                    return Ok(Some(frame));
                }
            }
            Ok(None)
        }
    }

    impl Encoder<Frame> for SspCodec {
        type Error = Error;

        fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Error> {
            let bytes = item.encode()?;
            dst.reserve(bytes.len());
            dst.put_slice(&bytes);
            Ok(())
        }
    }
}

#[cfg(feature = "tokio")]
pub use framed::SspCodec;
