//! Per-slave bookkeeping kept by the master.

use std::time::Duration;

use dcp_proto::{OpMode, PduType, ProtocolState, SlaveId};

use crate::detector::MissedPduDetector;

/// Static description of a slave the master will manage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaveDescription {
    /// Id the master assigns with `STC_register`.
    pub id: SlaveId,
    /// Identity the slave must confirm.
    pub uuid: u128,
    /// Human readable name, used in log output.
    pub name: String,
    /// Operating mode requested in `STC_register`.
    pub op_mode: OpMode,
}

impl SlaveDescription {
    /// Describe slave `id` with `uuid`, run in non-real-time mode.
    pub fn new(id: SlaveId, uuid: u128, name: impl Into<String>) -> Self {
        Self { id, uuid, name: name.into(), op_mode: OpMode::NonRealTime }
    }

    /// Request `op_mode` at registration instead.
    #[must_use]
    pub fn with_op_mode(mut self, op_mode: OpMode) -> Self {
        self.op_mode = op_mode;
        self
    }
}

/// Command sent to a slave and not yet answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingCommand<I> {
    /// Command type.
    pub command: PduType,
    /// Control sequence number the command was sent with.
    pub seq: u32,
    /// State the slave reaches on ACK.
    pub target: ProtocolState,
    /// Time after which the command counts as timed out.
    pub deadline: I,
    /// Timeout that produced `deadline`.
    pub timeout: Duration,
}

/// The master's view of one slave.
#[derive(Debug, Clone)]
pub struct SlaveDescriptor<I> {
    pub(crate) description: SlaveDescription,
    pub(crate) state: ProtocolState,
    pub(crate) detector: MissedPduDetector,
    pub(crate) next_seq: u32,
    pub(crate) param_seq: u32,
    pub(crate) pending: Option<PendingCommand<I>>,
    pub(crate) last_step: Option<u32>,
}

impl<I> SlaveDescriptor<I> {
    pub(crate) fn new(description: SlaveDescription) -> Self {
        Self {
            description,
            state: ProtocolState::Idle,
            detector: MissedPduDetector::new(),
            next_seq: 0,
            param_seq: 0,
            pending: None,
            last_step: None,
        }
    }

    /// Slave id.
    pub fn id(&self) -> SlaveId {
        self.description.id
    }

    /// Static description.
    pub fn description(&self) -> &SlaveDescription {
        &self.description
    }

    /// State recorded from the slave's responses.
    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// Outstanding command, if any.
    pub fn pending(&self) -> Option<&PendingCommand<I>> {
        self.pending.as_ref()
    }

    /// Step reported by the last `NTF_step_finished`.
    pub fn last_step(&self) -> Option<u32> {
        self.last_step
    }

    /// Detector state for the slave's outbound streams.
    pub fn detector(&self) -> &MissedPduDetector {
        &self.detector
    }

    pub(crate) fn take_seq(&mut self) -> u32 {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        seq
    }

    pub(crate) fn take_param_seq(&mut self) -> u32 {
        let seq = self.param_seq;
        self.param_seq = self.param_seq.wrapping_add(1);
        seq
    }
}
