use std::io::{Read, Write};

use bytes::BytesMut;
use ssp_protocol::{
    CommandCode, Frame, STATUS_OK, Sequence,
    codec::{SspCodec, encode_frame},
};
use ssp_tests::SimulatedBiller;
use tokio_util::codec::{Decoder, Encoder};

/// Reads whatever the simulated device has queued.
fn drain(device: &mut SimulatedBiller) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 16];
    while let Ok(count) = device.read(&mut buf) {
        out.extend_from_slice(&buf[..count]);
    }
    out
}

#[test]
fn codec_frames_are_understood_by_device() {
    let (mut device, handle) = SimulatedBiller::new();
    let mut codec = SspCodec::new();

    let mut request = BytesMut::new();
    codec
        .encode(
            Frame::new(Sequence::ONE, CommandCode::GetSerial.code(), Vec::new()),
            &mut request,
        )
        .unwrap();
    device.write_all(&request).unwrap();
    assert_eq!(handle.request_codes(), vec![0x0C]);

    let mut response = BytesMut::from(&drain(&mut device)[..]);
    let frame = codec.decode(&mut response).unwrap().unwrap();
    assert_eq!(frame.sequence(), Sequence::ONE);
    assert_eq!(frame.code(), STATUS_OK);
    assert_eq!(frame.payload(), &0x0012_D687u32.to_be_bytes());
}

#[test]
fn codec_decodes_byte_by_byte() {
    let mut codec = SspCodec::new();
    let encoded = encode_frame(Sequence::ZERO, STATUS_OK, &[0x7F, 0x7F, 0x01]).unwrap();
    let (last, head) = encoded.split_last().unwrap();
    for byte in head {
        let mut buf = BytesMut::from(&[*byte][..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
    }
    let mut buf = BytesMut::from(&[*last][..]);
    let frame = codec.decode(&mut buf).unwrap().unwrap();
    assert_eq!(frame.payload(), &[0x7F, 0x7F, 0x01]);
}
