//! Field-level encoding helpers shared by all payloads.
//!
//! Integers and floats are little-endian. Strings and blobs carry a `u16`
//! length prefix, collections a `u16` count prefix. Reads are bounds checked
//! before touching the buffer so malformed input surfaces as
//! [`DecodeError::Truncated`] rather than a panic.

use bytes::{Buf, BufMut, BytesMut};

use crate::{DecodeError, EncodeError};

/// Largest string, blob or collection a `u16` prefix can describe.
pub const MAX_FIELD_LEN: usize = u16::MAX as usize;

/// Payload types with a self-describing wire layout.
pub(crate) trait Wire: Sized {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError>;
    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError>;
}

/// Cursor over a payload slice.
pub(crate) struct PayloadReader<'a> {
    buf: &'a [u8],
}

macro_rules! read_fixed {
    ($($name:ident => $ty:ty, $get:ident;)*) => {
        $(
            pub fn $name(&mut self) -> Result<$ty, DecodeError> {
                self.ensure(size_of::<$ty>())?;
                Ok(self.buf.$get())
            }
        )*
    };
}

impl<'a> PayloadReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), DecodeError> {
        if self.buf.remaining() < needed {
            return Err(DecodeError::Truncated { needed, available: self.buf.remaining() });
        }
        Ok(())
    }

    read_fixed! {
        u8 => u8, get_u8;
        u16 => u16, get_u16_le;
        u32 => u32, get_u32_le;
        u64 => u64, get_u64_le;
        u128 => u128, get_u128_le;
        i8 => i8, get_i8;
        i16 => i16, get_i16_le;
        i32 => i32, get_i32_le;
        i64 => i64, get_i64_le;
        f32 => f32, get_f32_le;
        f64 => f64, get_f64_le;
    }

    /// Length-prefixed blob.
    pub fn blob(&mut self) -> Result<Vec<u8>, DecodeError> {
        let len = usize::from(self.u16()?);
        self.ensure(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head.to_vec())
    }

    /// Length-prefixed UTF-8 string.
    pub fn string(&mut self) -> Result<String, DecodeError> {
        String::from_utf8(self.blob()?).map_err(|_| DecodeError::InvalidUtf8)
    }

    /// Count prefix of a collection.
    ///
    /// The count is untrusted; callers cap preallocation with
    /// [`Self::remaining`].
    pub fn count(&mut self) -> Result<usize, DecodeError> {
        Ok(usize::from(self.u16()?))
    }

    /// Read `count` items with `read_one`.
    pub fn list<T>(
        &mut self,
        mut read_one: impl FnMut(&mut Self) -> Result<T, DecodeError>,
    ) -> Result<Vec<T>, DecodeError> {
        let count = self.count()?;
        let mut items = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            items.push(read_one(self)?);
        }
        Ok(items)
    }

    /// Fail if any bytes were left unread.
    pub fn finish(self) -> Result<(), DecodeError> {
        match self.buf.remaining() {
            0 => Ok(()),
            count => Err(DecodeError::TrailingBytes { count }),
        }
    }
}

pub(crate) fn put_blob(
    buf: &mut BytesMut,
    field: &'static str,
    bytes: &[u8],
) -> Result<(), EncodeError> {
    let len = u16::try_from(bytes.len()).map_err(|_| EncodeError::FieldTooLong {
        field,
        len: bytes.len(),
        max: MAX_FIELD_LEN,
    })?;
    buf.put_u16_le(len);
    buf.put_slice(bytes);
    Ok(())
}

pub(crate) fn put_string(
    buf: &mut BytesMut,
    field: &'static str,
    value: &str,
) -> Result<(), EncodeError> {
    put_blob(buf, field, value.as_bytes())
}

pub(crate) fn put_list<T>(
    buf: &mut BytesMut,
    field: &'static str,
    items: &[T],
    mut write_one: impl FnMut(&mut BytesMut, &T) -> Result<(), EncodeError>,
) -> Result<(), EncodeError> {
    let count = u16::try_from(items.len()).map_err(|_| EncodeError::TooManyItems {
        field,
        count: items.len(),
        max: MAX_FIELD_LEN,
    })?;
    buf.put_u16_le(count);
    for item in items {
        write_one(buf, item)?;
    }
    Ok(())
}
