//! Unsolicited slave notifications: `NTF_*`.

use bytes::{BufMut, BytesMut};

use crate::{
    DecodeError, EncodeError, LogEntry, ProtocolState,
    codec::{PayloadReader, Wire},
    payloads::response::read_state,
};

/// `NTF_state_changed`: the slave changed state on its own, e.g. after
/// entering `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChanged {
    /// Notifying slave.
    pub sender: u8,
    /// Slave outbound sequence number.
    pub seq: u32,
    /// New state.
    pub state: ProtocolState,
}

impl Wire for StateChanged {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.sender);
        buf.put_u32_le(self.seq);
        buf.put_u8(self.state.to_u8());
        Ok(())
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self { sender: reader.u8()?, seq: reader.u32()?, state: read_state(reader)? })
    }
}

/// `NTF_log`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogNotification {
    /// Notifying slave.
    pub sender: u8,
    /// Slave outbound sequence number.
    pub seq: u32,
    /// The entry.
    pub entry: LogEntry,
}

impl Wire for LogNotification {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.sender);
        buf.put_u32_le(self.seq);
        self.entry.write(buf)
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self { sender: reader.u8()?, seq: reader.u32()?, entry: LogEntry::read(reader)? })
    }
}

/// `NTF_step_finished`: sent after the `RSP_ack` of a successful step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepFinished {
    /// Notifying slave.
    pub sender: u8,
    /// Slave outbound sequence number.
    pub seq: u32,
    /// Step counter after the step completed.
    pub step: u32,
}

impl Wire for StepFinished {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.sender);
        buf.put_u32_le(self.seq);
        buf.put_u32_le(self.step);
        Ok(())
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        Ok(Self { sender: reader.u8()?, seq: reader.u32()?, step: reader.u32()? })
    }
}
