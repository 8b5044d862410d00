//! Slave log entries and logging controls.

use bytes::{BufMut, BytesMut};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::{
    DecodeError, EncodeError,
    codec::{PayloadReader, Wire, put_string},
};

/// Severity of a log entry. Lower values are more severe.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize_repr,
    Deserialize_repr,
)]
#[repr(u8)]
pub enum LogLevel {
    /// Slave cannot continue.
    Fatal = 0,
    /// Operation failed.
    Error = 1,
    /// Unexpected but recoverable.
    #[default]
    Warning = 2,
    /// Progress information.
    Information = 3,
    /// Diagnostics.
    Debug = 4,
}

impl LogLevel {
    /// Convert a raw level.
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Fatal,
            1 => Self::Error,
            2 => Self::Warning,
            3 => Self::Information,
            4 => Self::Debug,
            _ => return None,
        })
    }

    /// An entry at `self` passes a filter configured at `threshold`.
    pub fn passes(self, threshold: Self) -> bool {
        self <= threshold
    }
}

/// How a slave delivers log entries to the master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum LogMode {
    /// Buffered until the master sends `INF_log`.
    OnRequest = 0,
    /// Pushed immediately as `NTF_log`.
    #[default]
    OnNotification = 1,
}

impl LogMode {
    /// Convert a raw mode.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::OnRequest),
            1 => Some(Self::OnNotification),
            _ => None,
        }
    }
}

/// One log record produced by a slave.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Severity.
    pub level: LogLevel,
    /// Embedder-defined category, 0 is reserved for "all".
    pub category: u8,
    /// Simulation time at which the entry was produced.
    pub timestamp: f64,
    /// Human readable text.
    pub message: String,
}

impl Wire for LogEntry {
    fn write(&self, buf: &mut BytesMut) -> Result<(), EncodeError> {
        buf.put_u8(self.level as u8);
        buf.put_u8(self.category);
        buf.put_f64_le(self.timestamp);
        put_string(buf, "log message", &self.message)
    }

    fn read(reader: &mut PayloadReader<'_>) -> Result<Self, DecodeError> {
        let level = read_level(reader)?;
        let category = reader.u8()?;
        let timestamp = reader.f64()?;
        let message = reader.string()?;
        Ok(Self { level, category, timestamp, message })
    }
}

pub(crate) fn read_level(reader: &mut PayloadReader<'_>) -> Result<LogLevel, DecodeError> {
    let raw = reader.u8()?;
    LogLevel::from_u8(raw)
        .ok_or(DecodeError::InvalidField { field: "log level", value: u64::from(raw) })
}

pub(crate) fn read_mode(reader: &mut PayloadReader<'_>) -> Result<LogMode, DecodeError> {
    let raw = reader.u8()?;
    LogMode::from_u8(raw)
        .ok_or(DecodeError::InvalidField { field: "log mode", value: u64::from(raw) })
}
