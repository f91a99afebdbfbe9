use std::time::{Duration, Instant};

use ssp_client::{Biller, Error, config::Builder};
use ssp_protocol::{
    Sequence,
    command::{ChannelMask, Counters},
    event::{Channel, Event, EventCode},
    protocol::DeviceError,
};
use ssp_tests::{DeviceHandle, DeviceState, SimulatedBiller};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn establish() -> (Biller<SimulatedBiller>, DeviceHandle) {
    init_logging();
    let (device, handle) = SimulatedBiller::new();
    let biller = Builder::new()
        .timeout(Duration::from_millis(200))
        .establish(device)
        .expect("Session should establish");
    (biller, handle)
}

#[test]
fn establish_loads_configuration() {
    let (biller, handle) = establish();
    assert_eq!(biller.serial(), 0x0012_D687);
    assert_eq!(biller.firmware_version(), "0380");
    assert_eq!(
        biller.channels(),
        &[
            Channel::new(0, 5, "EUR"),
            Channel::new(1, 10, "EUR"),
            Channel::new(2, 20, "EUR"),
        ]
    );
    // sync, get serial, setup request
    assert_eq!(handle.request_codes(), vec![0x11, 0x0C, 0x05]);
    assert_eq!(
        handle.request_sequences(),
        vec![Sequence::ZERO, Sequence::ZERO, Sequence::ONE]
    );
    assert_eq!(biller.transactor().sequence(), Sequence::ZERO);
}

#[test]
fn establish_scales_channel_values() {
    init_logging();
    let state = DeviceState {
        multiplier: 100,
        channels: vec![(5, *b"GBP"), (10, *b"GBP")],
        ..DeviceState::default()
    };
    let (device, _handle) = SimulatedBiller::with_state(state);
    let biller = Biller::establish(device).unwrap();
    assert_eq!(biller.channels()[0].value(), 500);
    assert_eq!(biller.channels()[1].value(), 1000);
    assert_eq!(biller.channels()[1].currency(), "GBP");
}

#[test]
fn establish_propagates_device_error() {
    init_logging();
    let (device, handle) = SimulatedBiller::new();
    handle.state().inject_status = Some(0xF5);
    match Biller::establish(device) {
        Err(Error::Device(DeviceError::CannotProcess)) => {}
        Err(other) => panic!("expected CannotProcess, got {:?}", other),
        Ok(_) => panic!("expected CannotProcess, got a session"),
    }
    // no retry
    assert_eq!(handle.request_codes(), vec![0x11]);
}

#[test]
fn channel_inhibits_mask() {
    let (mut biller, handle) = establish();
    biller.set_channel_inhibits([0, 1, 15]).unwrap();
    assert_eq!(handle.state().mask.bits(), 0x8003);
    let last = handle.state().requests.last().cloned().unwrap();
    assert_eq!(last.code(), 0x02);
    assert_eq!(last.payload(), &[0x03, 0x80]);

    biller.set_channel_inhibits([]).unwrap();
    assert_eq!(handle.state().mask, ChannelMask::NONE);
    let last = handle.state().requests.last().cloned().unwrap();
    assert_eq!(last.payload(), &[0x00, 0x00]);
}

#[test]
fn channel_inhibits_rejects_invalid_channel_before_sending() {
    let (mut biller, handle) = establish();
    let sent = handle.state().requests.len();
    match biller.set_channel_inhibits([16]) {
        Err(Error::ChannelIndexOutOfRange { channel: 16, .. }) => {}
        other => panic!("expected ChannelIndexOutOfRange, got {:?}", other),
    }
    assert_eq!(handle.state().requests.len(), sent);
}

#[test]
fn enable_and_display() {
    let (mut biller, handle) = establish();
    biller.set_channel_mask(ChannelMask::ALL).unwrap();
    biller.display_enable().unwrap();
    biller.enable().unwrap();
    {
        let state = handle.state();
        assert!(state.enabled);
        assert!(state.display_enabled);
        assert_eq!(state.mask, ChannelMask::ALL);
    }

    biller.disable().unwrap();
    biller.display_disable().unwrap();
    let state = handle.state();
    assert!(!state.enabled);
    assert!(!state.display_enabled);
}

#[test]
fn escrow_commands() {
    let (mut biller, handle) = establish();
    biller.hold().unwrap();
    biller.reject().unwrap();
    let codes = handle.request_codes();
    assert_eq!(&codes[codes.len() - 2..], &[0x18, 0x08]);
}

#[test]
fn poll_decodes_events() {
    let (mut biller, handle) = establish();
    assert!(biller.poll().unwrap().is_empty());

    handle.queue_events(&[0xEF, 0x02, 0xCC, 0xEB, 0xEE, 0x02, 0xE8]);
    let events = biller.poll().unwrap();
    let ten_euro = biller.channels()[1].clone();
    assert_eq!(
        events,
        vec![
            Event::new(EventCode::Read, Some(ten_euro.clone())),
            Event::new(EventCode::Stacking, None),
            Event::new(EventCode::Stacked, None),
            Event::new(EventCode::Credit, Some(ten_euro)),
            Event::new(EventCode::Disabled, None),
        ]
    );
    assert_eq!(events[3].to_string(), "Credit -> 10 EUR");

    // events are not replayed
    assert!(biller.poll().unwrap().is_empty());
}

#[test]
fn poll_with_unknown_channel() {
    let (mut biller, handle) = establish();
    handle.queue_events(&[0xEE, 0x04]);
    match biller.poll() {
        Err(Error::ChannelIndexOutOfRange { channel, available }) => {
            assert_eq!(channel, 4);
            assert_eq!(available, 3);
        }
        other => panic!("expected ChannelIndexOutOfRange, got {:?}", other),
    }
}

#[test]
fn counters_round_trip() {
    let (mut biller, handle) = establish();
    handle.state().counters = Counters {
        stacked: 12,
        stored: 3,
        dispensed: 1,
        transferred: 0,
        rejected: 7,
    };
    assert_eq!(biller.counters().unwrap(), handle.state().counters);

    biller.reset_counters().unwrap();
    assert_eq!(biller.counters().unwrap(), Counters::default());
}

#[test]
fn sequence_alternates_between_requests() {
    let (mut biller, handle) = establish();
    for _ in 0..4 {
        biller.poll().unwrap();
    }
    let sequences = handle.request_sequences();
    assert_eq!(
        &sequences[3..],
        &[Sequence::ZERO, Sequence::ONE, Sequence::ZERO, Sequence::ONE]
    );
}

#[test]
fn failed_transaction_keeps_sequence_until_resync() {
    let (mut biller, handle) = establish();
    biller.enable().unwrap();
    assert_eq!(biller.transactor().sequence(), Sequence::ONE);

    handle.state().inject_status = Some(0xF8);
    match biller.poll() {
        Err(Error::Device(DeviceError::GeneralFailure)) => {}
        other => panic!("expected GeneralFailure, got {:?}", other),
    }
    assert_eq!(biller.transactor().sequence(), Sequence::ONE);

    handle.state().corrupt_next_response = true;
    match biller.poll() {
        Err(Error::CrcMismatch { .. }) => {}
        other => panic!("expected CrcMismatch, got {:?}", other),
    }
    assert_eq!(biller.transactor().sequence(), Sequence::ONE);

    biller.synchronize().unwrap();
    assert_eq!(biller.transactor().sequence(), Sequence::ZERO);
    biller.poll().unwrap();
    assert_eq!(handle.request_sequences().last(), Some(&Sequence::ZERO));
}

#[test]
fn silent_device_times_out() {
    let (mut biller, handle) = establish();
    handle.state().silent = true;
    let start = Instant::now();
    match biller.poll() {
        Err(Error::Timeout) => {}
        other => panic!("expected Timeout, got {:?}", other),
    }
    assert!(start.elapsed() >= Duration::from_millis(200));
    assert_eq!(biller.transactor().sequence(), Sequence::ZERO);
}

#[test]
fn line_noise_is_discarded() {
    init_logging();
    let state = DeviceState {
        line_noise: vec![0x00, 0x13, 0xF0],
        ..DeviceState::default()
    };
    let (device, handle) = SimulatedBiller::with_state(state);
    let mut biller = Biller::establish(device).unwrap();
    handle.queue_events(&[0xF1]);
    assert_eq!(
        biller.poll().unwrap(),
        vec![Event::new(EventCode::Reset, None)]
    );
}

#[test]
fn stuffed_serial_number() {
    init_logging();
    let state = DeviceState {
        serial: 0x7F7F_007F,
        ..DeviceState::default()
    };
    let (device, _handle) = SimulatedBiller::with_state(state);
    let biller = Biller::establish(device).unwrap();
    assert_eq!(biller.serial(), 0x7F7F_007F);
}
