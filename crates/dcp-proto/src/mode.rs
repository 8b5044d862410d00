//! Operating mode and data scope settings.

use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::{DecodeError, ProtocolState, codec::PayloadReader};

/// Timing regime the master runs a slave in, chosen at `STC_register`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum OpMode {
    /// Hard real time.
    HardRealTime = 0,
    /// Soft real time.
    SoftRealTime = 1,
    /// Steps are driven by the master without wall-clock pacing.
    #[default]
    NonRealTime = 2,
}

impl OpMode {
    /// Every mode, in wire order.
    pub const ALL: [Self; 3] = [Self::HardRealTime, Self::SoftRealTime, Self::NonRealTime];

    /// Convert a raw mode.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|m| *m as u8 == value)
    }
}

/// States in which a data stream is exchanged, set with `CFG_set_scope`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum Scope {
    /// While initialized and while stepping.
    #[default]
    InitializationRunNonRealTime = 0,
    /// Only while initialized.
    Initialization = 1,
    /// Only while synchronizing or running.
    RunNonRealTime = 2,
}

impl Scope {
    /// Every scope, in wire order.
    pub const ALL: [Self; 3] =
        [Self::InitializationRunNonRealTime, Self::Initialization, Self::RunNonRealTime];

    /// Convert a raw scope.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| *s as u8 == value)
    }

    /// Returns true if data in this scope is exchanged while in `state`.
    pub fn covers(self, state: ProtocolState) -> bool {
        match self {
            Self::InitializationRunNonRealTime => state.accepts_data(),
            Self::Initialization => state == ProtocolState::Initialized,
            Self::RunNonRealTime => {
                matches!(state, ProtocolState::Synchronizing | ProtocolState::Running)
            },
        }
    }
}

pub(crate) fn read_op_mode(reader: &mut PayloadReader<'_>) -> Result<OpMode, DecodeError> {
    let raw = reader.u8()?;
    OpMode::from_u8(raw)
        .ok_or(DecodeError::InvalidField { field: "op mode", value: u64::from(raw) })
}

pub(crate) fn read_scope(reader: &mut PayloadReader<'_>) -> Result<Scope, DecodeError> {
    let raw = reader.u8()?;
    Scope::from_u8(raw)
        .ok_or(DecodeError::InvalidField { field: "scope", value: u64::from(raw) })
}
