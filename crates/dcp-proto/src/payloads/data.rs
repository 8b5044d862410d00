//! Data PDUs: `DAT_input_output` and `DAT_parameter`.
//!
//! Both directions use the same layout. From master to slave `slave_id` is the
//! receiver, from slave to master it is the sender.

use bytes::{BufMut, BytesMut};

use crate::{
    DecodeError, EncodeError, NamedValue,
    codec::{PayloadReader, Wire, put_list},
};

/// `DAT_input_output`, sequenced by step number.
#[derive(Debug, Clone, PartialEq)]
pub struct InputOutput {
    /// Slave the values belong to.
    pub slave_id: u8,
    /// Step counter the values were produced at.
    pub step: u32,
    /// Variable values.
    pub values: Vec<NamedValue>,
}

impl Wire for InputOutput {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.slave_id);
        buf.put_u32_le(self.step);
        put_list(buf, "values", &self.values, |buf, v| v.write(buf))
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            slave_id: reader.u8()?,
            step: reader.u32()?,
            values: reader.list(NamedValue::read)?,
        })
    }
}

/// `DAT_parameter`, sequenced by its own counter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    /// Slave the values belong to.
    pub slave_id: u8,
    /// Parameter sequence number.
    pub seq: u32,
    /// Parameter values.
    pub values: Vec<NamedValue>,
}

impl Wire for Parameters {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.slave_id);
        buf.put_u32_le(self.seq);
        put_list(buf, "values", &self.values, |buf, v| v.write(buf))
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            slave_id: reader.u8()?,
            seq: reader.u32()?,
            values: reader.list(NamedValue::read)?,
        })
    }
}
