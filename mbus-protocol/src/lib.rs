//! Alpine M-BUS Frame Protocol
//!
//! This crate turns the hex-digit frames seen on the M-BUS into structured
//! packets and back. It knows nothing about pulse timing; the bit layer
//! hands it one ASCII hex character per received nibble.
//!
//! # Frame Overview
//!
//! ```text
//! ┌────────┬──────────────────────┬──────────┬────┐
//! │ SOURCE │ BODY                 │ CHECKSUM │ CR │
//! │ 1 hex  │ 1–14 hex             │ 1 hex    │    │
//! └────────┴──────────────────────┴──────────┴────┘
//! ```
//!
//! The source digit is `1` for the head unit and `9` for the changer. The
//! checksum is the XOR of every nibble before it, plus one, modulo 16.
//!
//! Commands are identified by matching the body against a table of fixed
//! width templates. Uppercase hex digits in a template are literals, the
//! lowercase letters `d t i m s f` are placeholders for the disk, track,
//! index, minute, second and flag fields.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod codec;
pub mod codetable;
pub mod frame;
pub mod hex;
pub mod packet;

pub use codec::{decode, encode, encode_command, DecodeError, EncodeError};
pub use codetable::{CodeTableEntry, Command, Template, Token, CODE_TABLE};
pub use frame::{RawFrame, FRAME_END, MAX_BODY_LEN, MAX_FRAME_LEN};
pub use packet::{FieldKind, FieldMask, Fields, Packet, Source};
