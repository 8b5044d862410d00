//! Slave responses: `RSP_*`.
//!
//! A response echoes the command's sequence number in `resp_seq`; `seq` is the
//! slave's own outbound control sequence. `RSP_ack` and `RSP_nack` also echo
//! the command type so a stale response cannot resolve a different command.

use bytes::{BufMut, BytesMut};

use crate::{
    DecodeError, EncodeError, ErrorCode, LogEntry, PduType, ProtocolState,
    codec::{PayloadReader, Wire, put_list, put_string},
};

/// `RSP_ack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Responding slave.
    pub sender: u8,
    /// Slave outbound sequence number.
    pub seq: u32,
    /// Sequence number of the acknowledged command.
    pub resp_seq: u32,
    /// Type of the acknowledged command.
    pub command: PduType,
}

impl Wire for Ack {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.sender);
        buf.put_u32_le(self.seq);
        buf.put_u32_le(self.resp_seq);
        buf.put_u8(self.command.to_u8());
        Ok(())
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            sender: reader.u8()?,
            seq: reader.u32()?,
            resp_seq: reader.u32()?,
            command: read_command(reader)?,
        })
    }
}

/// `RSP_nack`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nack {
    /// Responding slave.
    pub sender: u8,
    /// Slave outbound sequence number.
    pub seq: u32,
    /// Sequence number of the rejected command.
    pub resp_seq: u32,
    /// Type of the rejected command.
    pub command: PduType,
    /// Reason code.
    pub code: ErrorCode,
    /// Free-form explanation, possibly empty.
    pub detail: String,
}

impl Wire for Nack {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.sender);
        buf.put_u32_le(self.seq);
        buf.put_u32_le(self.resp_seq);
        buf.put_u8(self.command.to_u8());
        buf.put_u16_le(self.code.to_u16());
        put_string(buf, "nack detail", &self.detail)
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            sender: reader.u8()?,
            seq: reader.u32()?,
            resp_seq: reader.u32()?,
            command: read_command(reader)?,
            code: read_error_code(reader)?,
            detail: reader.string()?,
        })
    }
}

/// `RSP_state_ack`: answer to `INF_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateAck {
    /// Responding slave.
    pub sender: u8,
    /// Slave outbound sequence number.
    pub seq: u32,
    /// Sequence number of the `INF_state` command.
    pub resp_seq: u32,
    /// Current slave state.
    pub state: ProtocolState,
}

impl Wire for StateAck {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.sender);
        buf.put_u32_le(self.seq);
        buf.put_u32_le(self.resp_seq);
        buf.put_u8(self.state.to_u8());
        Ok(())
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            sender: reader.u8()?,
            seq: reader.u32()?,
            resp_seq: reader.u32()?,
            state: read_state(reader)?,
        })
    }
}

/// `RSP_error_ack`: answer to `INF_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorAck {
    /// Responding slave.
    pub sender: u8,
    /// Slave outbound sequence number.
    pub seq: u32,
    /// Sequence number of the `INF_error` command.
    pub resp_seq: u32,
    /// Last error recorded by the slave.
    pub code: ErrorCode,
}

impl Wire for ErrorAck {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.sender);
        buf.put_u32_le(self.seq);
        buf.put_u32_le(self.resp_seq);
        buf.put_u16_le(self.code.to_u16());
        Ok(())
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            sender: reader.u8()?,
            seq: reader.u32()?,
            resp_seq: reader.u32()?,
            code: read_error_code(reader)?,
        })
    }
}

/// `RSP_log_ack`: answer to `INF_log`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogAck {
    /// Responding slave.
    pub sender: u8,
    /// Slave outbound sequence number.
    pub seq: u32,
    /// Sequence number of the `INF_log` command.
    pub resp_seq: u32,
    /// Buffered entries, oldest first.
    pub entries: Vec<LogEntry>,
}

impl Wire for LogAck {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.sender);
        buf.put_u32_le(self.seq);
        buf.put_u32_le(self.resp_seq);
        put_list(buf, "log entries", &self.entries, |buf, e| e.write(buf))
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            sender: reader.u8()?,
            seq: reader.u32()?,
            resp_seq: reader.u32()?,
            entries: reader.list(LogEntry::read)?,
        })
    }
}

fn read_command(reader: &mut PayloadReader<'_>) -> Result<PduType, DecodeError> {
    let raw = reader.u8()?;
    PduType::from_u8(raw)
        .filter(|t| t.is_command())
        .ok_or(DecodeError::InvalidField { field: "command type", value: u64::from(raw) })
}

fn read_error_code(reader: &mut PayloadReader<'_>) -> Result<ErrorCode, DecodeError> {
    let raw = reader.u16()?;
    ErrorCode::from_u16(raw)
        .ok_or(DecodeError::InvalidField { field: "error code", value: u64::from(raw) })
}

pub(crate) fn read_state(reader: &mut PayloadReader<'_>) -> Result<ProtocolState, DecodeError> {
    let raw = reader.u8()?;
    ProtocolState::from_u8(raw)
        .ok_or(DecodeError::InvalidField { field: "state", value: u64::from(raw) })
}
