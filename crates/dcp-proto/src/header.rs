//! Fixed PDU header.
//!
//! Every PDU starts with a 5-byte header: a one byte type tag followed by the
//! payload length as a little-endian `u32`. The header is read in place with
//! `zerocopy`; the struct is `Unaligned` so any byte offset is valid.

use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::{LittleEndian, U32},
};

use crate::DecodeError;

/// Wire header preceding every payload.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned,
)]
#[repr(C)]
pub struct PduHeader {
    type_id: u8,
    length: U32<LittleEndian>,
}

impl PduHeader {
    /// Encoded header size in bytes.
    pub const SIZE: usize = 5;

    /// Build a header for a payload of `length` bytes.
    pub fn new(type_id: u8, length: u32) -> Self {
        Self { type_id, length: U32::new(length) }
    }

    /// Parse the header at the start of `bytes`.
    ///
    /// Returns the header and the bytes that follow it.
    pub fn parse(bytes: &[u8]) -> Result<(&Self, &[u8]), DecodeError> {
        if bytes.len() < Self::SIZE {
            return Err(DecodeError::Truncated { needed: Self::SIZE, available: bytes.len() });
        }

        let (head, rest) = bytes.split_at(Self::SIZE);
        let header = Self::ref_from_bytes(head)
            .map_err(|_| DecodeError::Truncated { needed: Self::SIZE, available: head.len() })?;
        Ok((header, rest))
    }

    /// Raw type tag.
    pub fn type_id(&self) -> u8 {
        self.type_id
    }

    /// Declared payload length.
    pub fn length(&self) -> u32 {
        self.length.get()
    }
}
