//! Wire format for the Distributed Co-Simulation Protocol (DCP).
//!
//! A PDU is a 5-byte [`PduHeader`] (type tag, little-endian payload length)
//! followed by a type-specific payload. All multi-byte fields are
//! little-endian; strings are UTF-8 with a `u16` length prefix.
//!
//! # Invariants
//!
//! - Round trip: `Pdu::decode(&pdu.to_bytes()?) == Ok(pdu)` for every PDU
//!   that encodes successfully.
//! - Total decode: [`Pdu::decode`] returns an error for any malformed input
//!   and never panics.
//! - Exact framing: the header length must equal the number of payload bytes
//!   and every payload byte must be consumed.
//!
//! Decoding is pure. It never touches state machines, so a buffer that fails
//! to decode can always be dropped without side effects.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod codec;
pub mod error_code;
pub mod errors;
pub mod header;
pub mod log;
pub mod mode;
pub mod payloads;
pub mod pdu;
pub mod pdu_type;
pub mod state;
pub mod value;

pub use codec::MAX_FIELD_LEN;
pub use error_code::ErrorCode;
pub use errors::{DecodeError, EncodeError};
pub use header::PduHeader;
pub use log::{LogEntry, LogLevel, LogMode};
pub use mode::{OpMode, Scope};
pub use payloads::Configuration;
pub use pdu::Pdu;
pub use pdu_type::PduType;
pub use state::ProtocolState;
pub use value::{DataType, NamedValue, Value};

/// Largest payload accepted by encoder and decoder (1 MiB).
pub const MAX_PAYLOAD_SIZE: usize = 1 << 20;

/// Protocol major version sent in `STC_register`.
pub const PROTOCOL_VERSION_MAJOR: u8 = 1;

/// Protocol minor version sent in `STC_register`.
pub const PROTOCOL_VERSION_MINOR: u8 = 0;

/// Data id of the `DAT_input_output` stream carrying a slave's inputs.
///
/// `CFG_set_steps` and `CFG_set_scope` for this id govern input handling.
pub const INPUT_DATA_ID: u16 = 0;

/// Slave identifier assigned by the master at registration.
pub type SlaveId = u8;
