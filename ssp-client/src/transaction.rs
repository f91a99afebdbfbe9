use std::{
    io::{ErrorKind, Read, Write},
    time::{Duration, Instant},
};

use ssp_protocol::{
    CommandCode, Frame, Sequence,
    codec::{FrameReceiver, encode_frame},
    command::{Request, Synchronize},
    error::Error,
};

/// Runs request/response exchanges over a byte transport.
///
/// Only one transaction is in flight at a time. The sequence bit is toggled after every
/// successful transaction and left untouched when a transaction fails; only
/// [`Transactor::synchronize`] brings it back to a known state.
#[derive(Debug)]
pub struct Transactor<T> {
    transport: T,
    sequence: Sequence,
    timeout: Duration,
}

impl<T: Read + Write> Transactor<T> {
    pub fn new(transport: T, timeout: Duration) -> Transactor<T> {
        Transactor {
            transport,
            sequence: Sequence::ZERO,
            timeout,
        }
    }

    /// The sequence bit the next request is sent with.
    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn get_ref(&self) -> &T {
        &self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Sends one command and waits for its response.
    ///
    /// Returns the response payload without the status byte.
    pub fn transact(&mut self, command: CommandCode, payload: &[u8]) -> Result<Box<[u8]>, Error> {
        let request = encode_frame(self.sequence, command.code(), payload)?;
        log::debug!("Sending {:?} (seq={})", command, self.sequence);
        log::trace!("TX frame: {:02x?}", &request[..]);
        self.transport.write_all(&request)?;
        self.transport.flush()?;

        let frame = self.receive()?;
        log::trace!(
            "RX frame: seq={}, status={:#04x}, payload={:02x?}",
            frame.sequence(),
            frame.code(),
            frame.payload()
        );
        if frame.sequence() != self.sequence {
            log::warn!(
                "Response to {:?} echoes seq={}, expected seq={}",
                command,
                frame.sequence(),
                self.sequence
            );
        }

        let response = frame.into_response().inspect_err(|err| {
            log::debug!("{:?} rejected by device: {}", command, err);
        })?;
        self.sequence = self.sequence.toggled();
        Ok(response)
    }

    /// Sends a typed request and decodes its response.
    pub fn execute<R: Request>(&mut self, request: &R) -> Result<R::Response, Error> {
        let payload = self.transact(R::COMMAND, &request.payload())?;
        request.parse_response(&payload)
    }

    /// Sends the sync command and resets the sequence bit to zero, whatever the device answered.
    pub fn synchronize(&mut self) -> Result<(), Error> {
        let result = self.execute(&Synchronize);
        self.sequence = Sequence::ZERO;
        result
    }

    /// Collects bytes until a complete frame is received or the deadline passes.
    fn receive(&mut self) -> Result<Frame, Error> {
        let mut receiver = FrameReceiver::new();
        let deadline = Instant::now() + self.timeout;
        let mut byte = [0u8; 1];

        loop {
            if Instant::now() >= deadline {
                log::debug!(
                    "No complete frame within {:?}, receiver in state {:?}",
                    self.timeout,
                    receiver.state()
                );
                return Err(Error::Timeout);
            }
            match self.transport.read(&mut byte) {
                Ok(0) => continue,
                Ok(_) => {
                    if let Some(frame) = receiver.push(byte[0])? {
                        return Ok(frame);
                    }
                }
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) =>
                {
                    continue;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::Transactor;
    use ssp_protocol::{
        CommandCode, Sequence, codec::encode_frame, error::Error, protocol::DeviceError,
    };
    use std::{
        collections::VecDeque,
        io::{self, Read, Write},
        time::{Duration, Instant},
    };

    /// Plays back canned bytes and records everything written.
    #[derive(Default)]
    struct Scripted {
        incoming: VecDeque<u8>,
        written: Vec<u8>,
    }

    impl Scripted {
        fn respond(&mut self, sequence: Sequence, status: u8, payload: &[u8]) {
            self.incoming
                .extend(encode_frame(sequence, status, payload).unwrap());
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.incoming.pop_front() {
                Some(byte) if !buf.is_empty() => {
                    buf[0] = byte;
                    Ok(1)
                }
                Some(byte) => {
                    self.incoming.push_front(byte);
                    Ok(0)
                }
                None => Err(io::Error::new(io::ErrorKind::TimedOut, "no data")),
            }
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    const TIMEOUT: Duration = Duration::from_millis(100);

    #[test]
    fn transact_returns_payload_and_toggles() {
        let mut transport = Scripted::default();
        transport.respond(Sequence::ZERO, 0xF0, &[0x00, 0x00, 0x30, 0x39]);
        let mut transactor = Transactor::new(transport, TIMEOUT);

        let payload = transactor.transact(CommandCode::GetSerial, &[]).unwrap();
        assert_eq!(&payload[..], &[0x00, 0x00, 0x30, 0x39]);
        assert_eq!(transactor.sequence(), Sequence::ONE);
        assert_eq!(
            transactor.get_ref().written,
            vec![0x7F, 0x00, 0x01, 0x0C, 0x21, 0x3E]
        );
    }

    #[test]
    fn sequence_follows_transaction_count() {
        let mut transport = Scripted::default();
        for _ in 0..5 {
            transport.respond(Sequence::ZERO, 0xF0, &[]);
        }
        let mut transactor = Transactor::new(transport, TIMEOUT);
        for n in 1..=5 {
            transactor.transact(CommandCode::Poll, &[]).unwrap();
            assert_eq!(transactor.sequence().is_set(), n % 2 == 1);
        }
    }

    #[test]
    fn device_error_keeps_sequence() {
        let mut transport = Scripted::default();
        transport.respond(Sequence::ZERO, 0xF0, &[]);
        transport.respond(Sequence::ONE, 0xF2, &[]);
        let mut transactor = Transactor::new(transport, TIMEOUT);

        transactor.transact(CommandCode::Enable, &[]).unwrap();
        match transactor.transact(CommandCode::Hold, &[]) {
            Err(Error::Device(DeviceError::CommandNotKnown)) => {}
            other => panic!("expected CommandNotKnown, got {:?}", other),
        }
        assert_eq!(transactor.sequence(), Sequence::ONE);
    }

    #[test]
    fn crc_mismatch_keeps_sequence() {
        let mut transport = Scripted::default();
        let mut frame = encode_frame(Sequence::ZERO, 0xF0, &[0x01]).unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0x01;
        transport.incoming.extend(frame);
        let mut transactor = Transactor::new(transport, TIMEOUT);

        match transactor.transact(CommandCode::Poll, &[]) {
            Err(Error::CrcMismatch { .. }) => {}
            other => panic!("expected CrcMismatch, got {:?}", other),
        }
        assert_eq!(transactor.sequence(), Sequence::ZERO);
    }

    #[test]
    fn synchronize_resets_sequence() {
        let mut transport = Scripted::default();
        transport.respond(Sequence::ZERO, 0xF0, &[]);
        // the device echoes a set bit, which must not matter
        transport.respond(Sequence::ONE, 0xF0, &[]);
        let mut transactor = Transactor::new(transport, TIMEOUT);

        transactor.transact(CommandCode::Enable, &[]).unwrap();
        assert_eq!(transactor.sequence(), Sequence::ONE);
        transactor.synchronize().unwrap();
        assert_eq!(transactor.sequence(), Sequence::ZERO);
    }

    #[test]
    fn failed_synchronize_still_resets_sequence() {
        let mut transport = Scripted::default();
        transport.respond(Sequence::ZERO, 0xF0, &[]);
        transport.respond(Sequence::ONE, 0xF2, &[]);
        let mut transactor = Transactor::new(transport, TIMEOUT);

        transactor.transact(CommandCode::Enable, &[]).unwrap();
        assert_eq!(transactor.sequence(), Sequence::ONE);
        match transactor.synchronize() {
            Err(Error::Device(DeviceError::CommandNotKnown)) => {}
            other => panic!("expected CommandNotKnown, got {:?}", other),
        }
        assert_eq!(transactor.sequence(), Sequence::ZERO);
    }

    #[test]
    fn silent_transport_times_out() {
        let mut transactor = Transactor::new(Scripted::default(), TIMEOUT);
        let start = Instant::now();
        match transactor.transact(CommandCode::Poll, &[]) {
            Err(Error::Timeout) => {}
            other => panic!("expected Timeout, got {:?}", other),
        }
        assert!(start.elapsed() >= TIMEOUT);
        assert_eq!(transactor.sequence(), Sequence::ZERO);
    }

    #[test]
    fn noise_before_frame_is_ignored() {
        let mut transport = Scripted::default();
        transport.incoming.extend([0x00, 0xFF, 0x13]);
        transport.respond(Sequence::ZERO, 0xF0, &[0x7F]);
        let mut transactor = Transactor::new(transport, TIMEOUT);
        let payload = transactor.transact(CommandCode::Poll, &[]).unwrap();
        assert_eq!(&payload[..], &[0x7F]);
    }
}
