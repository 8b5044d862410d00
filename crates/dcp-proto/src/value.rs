//! Typed values exchanged in data, parameter and configuration PDUs.
//!
//! Each value is written as a one byte [`DataType`] tag followed by its
//! little-endian representation. Strings and binary blobs are length
//! prefixed.

use bytes::{BufMut, BytesMut};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::{
    DecodeError, EncodeError,
    codec::{PayloadReader, Wire, put_blob, put_string},
};

/// Wire tag of a [`Value`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum DataType {
    /// `u8`
    Uint8 = 0,
    /// `u16`
    Uint16 = 1,
    /// `u32`
    Uint32 = 2,
    /// `u64`
    Uint64 = 3,
    /// `i8`
    Int8 = 4,
    /// `i16`
    Int16 = 5,
    /// `i32`
    Int32 = 6,
    /// `i64`
    Int64 = 7,
    /// `f32`
    Float32 = 8,
    /// `f64`
    Float64 = 9,
    /// UTF-8 string
    String = 10,
    /// Opaque bytes
    Binary = 11,
}

impl DataType {
    /// Convert a raw tag.
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Uint8,
            1 => Self::Uint16,
            2 => Self::Uint32,
            3 => Self::Uint64,
            4 => Self::Int8,
            5 => Self::Int16,
            6 => Self::Int32,
            7 => Self::Int64,
            8 => Self::Float32,
            9 => Self::Float64,
            10 => Self::String,
            11 => Self::Binary,
            _ => return None,
        })
    }
}

/// A single typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `u8` value.
    Uint8(u8),
    /// `u16` value.
    Uint16(u16),
    /// `u32` value.
    Uint32(u32),
    /// `u64` value.
    Uint64(u64),
    /// `i8` value.
    Int8(i8),
    /// `i16` value.
    Int16(i16),
    /// `i32` value.
    Int32(i32),
    /// `i64` value.
    Int64(i64),
    /// `f32` value.
    Float32(f32),
    /// `f64` value.
    Float64(f64),
    /// `String` value.
    String(String),
    /// `Vec<u8>` value.
    Binary(Vec<u8>),
}

impl Value {
    /// Wire tag for this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Uint8(_) => DataType::Uint8,
            Self::Uint16(_) => DataType::Uint16,
            Self::Uint32(_) => DataType::Uint32,
            Self::Uint64(_) => DataType::Uint64,
            Self::Int8(_) => DataType::Int8,
            Self::Int16(_) => DataType::Int16,
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::Float32(_) => DataType::Float32,
            Self::Float64(_) => DataType::Float64,
            Self::String(_) => DataType::String,
            Self::Binary(_) => DataType::Binary,
        }
    }

    /// Numeric view of the value, if it has one.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::Uint8(v) => Some(f64::from(v)),
            Self::Uint16(v) => Some(f64::from(v)),
            Self::Uint32(v) => Some(f64::from(v)),
            Self::Uint64(v) => Some(v as f64),
            Self::Int8(v) => Some(f64::from(v)),
            Self::Int16(v) => Some(f64::from(v)),
            Self::Int32(v) => Some(f64::from(v)),
            Self::Int64(v) => Some(v as f64),
            Self::Float32(v) => Some(f64::from(v)),
            Self::Float64(v) => Some(v),
            Self::String(_) | Self::Binary(_) => None,
        }
    }
}

impl Wire for Value {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.data_type() as u8);
        match self {
            Self::Uint8(v) => buf.put_u8(*v),
            Self::Uint16(v) => buf.put_u16_le(*v),
            Self::Uint32(v) => buf.put_u32_le(*v),
            Self::Uint64(v) => buf.put_u64_le(*v),
            Self::Int8(v) => buf.put_i8(*v),
            Self::Int16(v) => buf.put_i16_le(*v),
            Self::Int32(v) => buf.put_i32_le(*v),
            Self::Int64(v) => buf.put_i64_le(*v),
            Self::Float32(v) => buf.put_f32_le(*v),
            Self::Float64(v) => buf.put_f64_le(*v),
            Self::String(v) => put_string(buf, "string value", v)?,
            Self::Binary(v) => put_blob(buf, "binary value", v)?,
        }
        Ok(())
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        let tag = reader.u8()?;
        let data_type = DataType::from_u8(tag)
            .ok_or(DecodeError::InvalidField { field: "data type", value: u64::from(tag) })?;

        Ok(match data_type {
            DataType::Uint8 => Self::Uint8(reader.u8()?),
            DataType::Uint16 => Self::Uint16(reader.u16()?),
            DataType::Uint32 => Self::Uint32(reader.u32()?),
            DataType::Uint64 => Self::Uint64(reader.u64()?),
            DataType::Int8 => Self::Int8(reader.i8()?),
            DataType::Int16 => Self::Int16(reader.i16()?),
            DataType::Int32 => Self::Int32(reader.i32()?),
            DataType::Int64 => Self::Int64(reader.i64()?),
            DataType::Float32 => Self::Float32(reader.f32()?),
            DataType::Float64 => Self::Float64(reader.f64()?),
            DataType::String => Self::String(reader.string()?),
            DataType::Binary => Self::Binary(reader.blob()?),
        })
    }
}

/// A value together with the variable or parameter name it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedValue {
    /// Variable or parameter name.
    pub name: String,
    /// Current value.
    pub value: Value,
}

impl NamedValue {
    /// Pair a name with a value.
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self { name: name.into(), value }
    }
}

impl Wire for NamedValue {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        put_string(buf, "value name", &self.name)?;
        self.value.write(buf)
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.string()?;
        let value = Value::read(reader)?;
        Ok(Self { name, value })
    }
}
