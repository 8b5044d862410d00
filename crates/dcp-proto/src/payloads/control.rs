//! Master-to-slave commands: `STC_*`, `CFG_*` and `INF_*`.
//!
//! Every command starts with the addressed slave id and the master's control
//! sequence number for that slave. Commands without further fields share the
//! [`Command`] payload.

use bytes::{BufMut, BytesMut};

use crate::{
    Configuration, DecodeError, EncodeError, LogLevel, LogMode, NamedValue, OpMode, Scope,
    codec::{PayloadReader, Wire},
    log::{read_level, read_mode},
    mode::{read_op_mode, read_scope},
};

/// Payload of commands that carry only addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    /// Addressed slave.
    pub receiver: u8,
    /// Control sequence number.
    pub seq: u32,
}

impl Command {
    /// Address slave `receiver` with sequence number `seq`.
    pub fn new(receiver: u8, seq: u32) -> Self {
        Self { receiver, seq }
    }
}

impl Wire for Command {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.receiver);
        buf.put_u32_le(self.seq);
        Ok(())
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self { receiver: reader.u8()?, seq: reader.u32()? })
    }
}

/// `STC_register`: assign `receiver` as the id of the slave with
/// `slave_uuid` and select its operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    /// Id the slave adopts.
    pub receiver: u8,
    /// Control sequence number.
    pub seq: u32,
    /// Identity of the slave being registered.
    pub slave_uuid: u128,
    /// Master protocol major version.
    pub major_version: u8,
    /// Master protocol minor version.
    pub minor_version: u8,
    /// Operating mode the slave runs in.
    pub op_mode: OpMode,
}

impl Wire for Register {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.receiver);
        buf.put_u32_le(self.seq);
        buf.put_u128_le(self.slave_uuid);
        buf.put_u8(self.major_version);
        buf.put_u8(self.minor_version);
        buf.put_u8(self.op_mode as u8);
        Ok(())
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            receiver: reader.u8()?,
            seq: reader.u32()?,
            slave_uuid: reader.u128()?,
            major_version: reader.u8()?,
            minor_version: reader.u8()?,
            op_mode: read_op_mode(reader)?,
        })
    }
}

/// `STC_configure`.
#[derive(Debug, Clone, PartialEq)]
pub struct Configure {
    /// Addressed slave.
    pub receiver: u8,
    /// Control sequence number.
    pub seq: u32,
    /// Configuration to apply.
    pub configuration: Configuration,
}

impl Wire for Configure {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.receiver);
        buf.put_u32_le(self.seq);
        self.configuration.write(buf)
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            receiver: reader.u8()?,
            seq: reader.u32()?,
            configuration: Configuration::read(reader)?,
        })
    }
}

/// `STC_run`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Run {
    /// Addressed slave.
    pub receiver: u8,
    /// Control sequence number.
    pub seq: u32,
    /// Simulation time at which running starts.
    pub start_time: f64,
}

impl Wire for Run {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.receiver);
        buf.put_u32_le(self.seq);
        buf.put_f64_le(self.start_time);
        Ok(())
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self { receiver: reader.u8()?, seq: reader.u32()?, start_time: reader.f64()? })
    }
}

/// `STC_do_step`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoStep {
    /// Addressed slave.
    pub receiver: u8,
    /// Control sequence number.
    pub seq: u32,
    /// Simulation time to advance by.
    pub step_size: f64,
}

impl Wire for DoStep {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.receiver);
        buf.put_u32_le(self.seq);
        buf.put_f64_le(self.step_size);
        Ok(())
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self { receiver: reader.u8()?, seq: reader.u32()?, step_size: reader.f64()? })
    }
}

/// `CFG_set_time_res`: one time unit is `numerator / denominator` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetTimeResolution {
    /// Addressed slave.
    pub receiver: u8,
    /// Control sequence number.
    pub seq: u32,
    /// Resolution numerator.
    pub numerator: u32,
    /// Resolution denominator, never zero on a valid command.
    pub denominator: u32,
}

impl Wire for SetTimeResolution {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.receiver);
        buf.put_u32_le(self.seq);
        buf.put_u32_le(self.numerator);
        buf.put_u32_le(self.denominator);
        Ok(())
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            receiver: reader.u8()?,
            seq: reader.u32()?,
            numerator: reader.u32()?,
            denominator: reader.u32()?,
        })
    }
}

/// `CFG_set_steps`: outputs of stream `data_id` are exchanged every
/// `steps` base steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetSteps {
    /// Addressed slave.
    pub receiver: u8,
    /// Control sequence number.
    pub seq: u32,
    /// Data stream the setting applies to.
    pub data_id: u16,
    /// Base steps per exchange, never zero on a valid command.
    pub steps: u32,
}

impl Wire for SetSteps {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.receiver);
        buf.put_u32_le(self.seq);
        buf.put_u16_le(self.data_id);
        buf.put_u32_le(self.steps);
        Ok(())
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            receiver: reader.u8()?,
            seq: reader.u32()?,
            data_id: reader.u16()?,
            steps: reader.u32()?,
        })
    }
}

/// `CFG_set_scope`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetScope {
    /// Addressed slave.
    pub receiver: u8,
    /// Control sequence number.
    pub seq: u32,
    /// Data stream the setting applies to.
    pub data_id: u16,
    /// States in which the stream is exchanged.
    pub scope: Scope,
}

impl Wire for SetScope {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.receiver);
        buf.put_u32_le(self.seq);
        buf.put_u16_le(self.data_id);
        buf.put_u8(self.scope as u8);
        Ok(())
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            receiver: reader.u8()?,
            seq: reader.u32()?,
            data_id: reader.u16()?,
            scope: read_scope(reader)?,
        })
    }
}

/// `CFG_set_parameter`: preset one parameter before configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SetParameter {
    /// Addressed slave.
    pub receiver: u8,
    /// Control sequence number.
    pub seq: u32,
    /// Parameter name and value.
    pub parameter: NamedValue,
}

impl Wire for SetParameter {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.receiver);
        buf.put_u32_le(self.seq);
        self.parameter.write(buf)
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            receiver: reader.u8()?,
            seq: reader.u32()?,
            parameter: NamedValue::read(reader)?,
        })
    }
}

/// `CFG_set_logging`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetLogging {
    /// Addressed slave.
    pub receiver: u8,
    /// Control sequence number.
    pub seq: u32,
    /// Category the setting applies to, 0 for all.
    pub category: u8,
    /// Least severe level still reported.
    pub level: LogLevel,
    /// Delivery mode.
    pub mode: LogMode,
}

impl Wire for SetLogging {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.receiver);
        buf.put_u32_le(self.seq);
        buf.put_u8(self.category);
        buf.put_u8(self.level as u8);
        buf.put_u8(self.mode as u8);
        Ok(())
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            receiver: reader.u8()?,
            seq: reader.u32()?,
            category: reader.u8()?,
            level: read_level(reader)?,
            mode: read_mode(reader)?,
        })
    }
}

/// `INF_log`: fetch buffered log entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLog {
    /// Addressed slave.
    pub receiver: u8,
    /// Control sequence number.
    pub seq: u32,
    /// Category to fetch, 0 for all.
    pub category: u8,
    /// Upper bound on returned entries.
    pub max_entries: u8,
}

impl Wire for QueryLog {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.receiver);
        buf.put_u32_le(self.seq);
        buf.put_u8(self.category);
        buf.put_u8(self.max_entries);
        Ok(())
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            receiver: reader.u8()?,
            seq: reader.u32()?,
            category: reader.u8()?,
            max_entries: reader.u8()?,
        })
    }
}
