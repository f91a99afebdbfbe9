//! # SSP Protocol Library
//!
//! This crate implements the framing layer and the payload formats of the Smiley Secure
//! Protocol (SSP) spoken by Innovative Technology bill validators such as the NV9USB.
//!
//! ## Overview
//!
//! SSP is a half-duplex master/slave protocol. The host sends one command frame and waits for
//! the matching response frame before sending the next one. This library provides:
//!
//! - Encoding of frames with start byte, byte stuffing and CRC
//! - A byte-wise receive state machine ([`codec::FrameReceiver`]) that can be driven by any I/O
//! - Typed command descriptors ([`command::Request`]) with their payload decoders
//! - Decoding of poll responses into [`event::Event`]s
//!
//! The blocking transaction handling lives in the `ssp-client` crate.
//!
//! ## Frame Format
//!
//! ```text
//! 0x7F | seq | len | code | payload (len - 1 bytes) | crc (2 bytes, little endian)
//! ```
//!
//! - `seq` alternates between `0x00` and `0x80` for every successful transaction
//! - `code` is the command code in requests and the status in responses (`0xF0` is OK)
//! - the CRC uses polynomial 0x1021 with initial value 0xFFFF and covers `seq` to the end of the payload
//! - every `0x7F` after the leading start byte is sent twice
//!
//! ## Basic Usage
//!
//! ### Encoding a Request
//!
//! ```
//! use ssp_protocol::{CommandCode, Frame, Sequence};
//!
//! let frame = Frame::new(Sequence::ZERO, CommandCode::Sync.code(), Vec::new());
//! let bytes = frame.encode().expect("Empty payloads always fit");
//! assert_eq!(bytes, [0x7F, 0x00, 0x01, 0x11, 0xBD, 0xFD]);
//! ```
//!
//! ### Decoding a Response
//!
//! ```
//! use ssp_protocol::{Frame, Sequence};
//! use std::io::Cursor;
//!
//! let mut reader = Cursor::new([0x7F, 0x00, 0x01, 0xF0, 0xB2, 0x10]);
//! let frame = Frame::from_reader(&mut reader).expect("Frame should decode");
//! assert_eq!(frame.sequence(), Sequence::ZERO);
//! assert!(frame.into_response().expect("Status is OK").is_empty());
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`error::Error`].
//!
//! ## Features
//!
//! - `tokio`: provides [`codec::SspCodec`], a `tokio-util` codec for frames
pub mod protocol;
pub use protocol::*;
pub mod codec;
pub mod command;
pub mod error;
pub mod event;
