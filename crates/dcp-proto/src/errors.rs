//! Codec error types.

use thiserror::Error;

use crate::PduType;

/// Errors produced while decoding a PDU from bytes.
///
/// Decoding never mutates protocol state, so every variant is recoverable:
/// the receiver drops the buffer and carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Buffer ended before a field could be read.
    #[error("truncated PDU: needed {needed} bytes, {available} available")]
    Truncated {
        /// Bytes required by the field being read.
        needed: usize,
        /// Bytes left in the buffer.
        available: usize,
    },

    /// Header length field disagrees with the received byte count.
    #[error("length mismatch: header declares {declared} payload bytes, received {actual}")]
    LengthMismatch {
        /// Payload length from the header.
        declared: usize,
        /// Payload bytes actually present.
        actual: usize,
    },

    /// Declared payload exceeds [`crate::MAX_PAYLOAD_SIZE`].
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Declared payload size.
        size: usize,
        /// Maximum accepted size.
        max: usize,
    },

    /// Type tag is not part of this protocol version.
    #[error("unsupported PDU type: 0x{0:02x}")]
    Unsupported(u8),

    /// Fixed-size PDU carried the wrong number of payload bytes.
    #[error("invalid length for {pdu_type:?}: expected {expected}, got {actual}")]
    InvalidLength {
        /// Type whose layout was violated.
        pdu_type: PduType,
        /// Exact payload length for this type.
        expected: usize,
        /// Payload length received.
        actual: usize,
    },

    /// An enumerated field held a value outside its domain.
    #[error("invalid {field}: {value}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Raw value found on the wire.
        value: u64,
    },

    /// A string field was not valid UTF-8.
    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    /// Bytes remained after the payload was fully parsed.
    #[error("{count} trailing bytes after payload")]
    TrailingBytes {
        /// Number of unconsumed bytes.
        count: usize,
    },
}

impl DecodeError {
    /// Returns true if the buffer was well framed but carried an unknown type.
    ///
    /// Forward-compatible receivers skip these instead of treating them as
    /// corruption.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(_))
    }
}

/// Errors produced while encoding a PDU.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// String or binary field longer than its `u16` length prefix allows.
    #[error("{field} is {len} bytes, limit is {max}")]
    FieldTooLong {
        /// Field name.
        field: &'static str,
        /// Actual length.
        len: usize,
        /// Maximum length.
        max: usize,
    },

    /// Collection with more entries than its `u16` count prefix allows.
    #[error("{field} has {count} entries, limit is {max}")]
    TooManyItems {
        /// Field name.
        field: &'static str,
        /// Actual count.
        count: usize,
        /// Maximum count.
        max: usize,
    },

    /// Encoded payload exceeds [`crate::MAX_PAYLOAD_SIZE`].
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Encoded payload size.
        size: usize,
        /// Maximum accepted size.
        max: usize,
    },
}
