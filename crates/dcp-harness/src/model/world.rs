//! Model world - the master's bookkeeping over a perfect network.
//!
//! The model tracks what the master should believe about each slave, what
//! each slave actually is, and which commands are still on the wire. It is
//! the oracle the real [`crate::World`] is compared against.

use std::collections::{BTreeMap, VecDeque};

use dcp_proto::{ProtocolState, SlaveId};

use super::{
    operation::{ModelCommand, Operation, OperationError, OperationResult},
    slave::{ModelResponse, ModelSlave},
};

/// Command timeout in milliseconds, matching `MasterConfig::default()`.
pub const COMMAND_TIMEOUT_MS: u64 = 1_000;
/// Step timeout in milliseconds, matching `MasterConfig::default()`.
pub const STEP_TIMEOUT_MS: u64 = 5_000;

/// Observable state for oracle comparison, one entry per slave id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Master descriptor state, `None` when unmanaged.
    pub recorded: Vec<Option<ProtocolState>>,
    /// Outstanding command per descriptor.
    pub pending: Vec<Option<dcp_proto::PduType>>,
    /// Actual slave state.
    pub actual: Vec<ProtocolState>,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    command: ModelCommand,
    seq: u32,
    target: ProtocolState,
    deadline_ms: u64,
}

#[derive(Debug, Clone)]
struct Descriptor {
    state: ProtocolState,
    pending: Option<Pending>,
    next_seq: u32,
}

impl Descriptor {
    fn new() -> Self {
        Self { state: ProtocolState::Idle, pending: None, next_seq: 0 }
    }
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    slave: SlaveId,
    command: ModelCommand,
    seq: u32,
}

/// Model world - the reference implementation.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    now_ms: u64,
    slaves: Vec<ModelSlave>,
    descriptors: BTreeMap<SlaveId, Descriptor>,
    in_flight: VecDeque<InFlight>,
}

impl ModelWorld {
    /// World with slaves `0..num_slaves`, each already managed.
    pub fn new(num_slaves: u8) -> Self {
        Self {
            now_ms: 0,
            slaves: (0..num_slaves).map(|_| ModelSlave::new()).collect(),
            descriptors: (0..num_slaves).map(|id| (id, Descriptor::new())).collect(),
            in_flight: VecDeque::new(),
        }
    }

    /// Recorded state of slave `id`.
    pub fn recorded_state(&self, id: SlaveId) -> Option<ProtocolState> {
        self.descriptors.get(&id).map(|d| d.state)
    }

    /// Actual state of slave `id`.
    pub fn actual_state(&self, id: SlaveId) -> Option<ProtocolState> {
        self.slaves.get(usize::from(id)).map(ModelSlave::state)
    }

    /// Apply an operation and return the result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match *op {
            Operation::Manage { slave } => {
                if self.descriptors.contains_key(&slave) {
                    return OperationResult::Error(OperationError::AlreadyManaged);
                }
                self.descriptors.insert(slave, Descriptor::new());
                OperationResult::Ok
            },
            Operation::Command { slave, command } => self.apply_command(slave, command),
            Operation::SendInputs { slave, .. } => match self.descriptors.get(&slave) {
                None => OperationResult::Error(OperationError::UnknownSlave),
                Some(d) if !accepts_data(d.state) => {
                    OperationResult::Error(OperationError::DataNotAllowed)
                },
                Some(_) => OperationResult::Ok,
            },
            Operation::AdvanceTime { millis } => {
                self.now_ms += u64::from(millis);
                let now = self.now_ms;
                for d in self.descriptors.values_mut() {
                    if d.pending.is_some_and(|p| now >= p.deadline_ms) {
                        d.pending = None;
                        d.state = ProtocolState::Error;
                    }
                }
                OperationResult::Ok
            },
            Operation::DeliverPending => {
                while let Some(message) = self.in_flight.pop_front() {
                    self.deliver(message);
                }
                OperationResult::Ok
            },
        }
    }

    /// Extract observable state for slave ids `0..count`.
    pub fn observable_state(&self, count: u8) -> ObservableState {
        let ids = 0..count;
        ObservableState {
            recorded: ids.clone().map(|id| self.recorded_state(id)).collect(),
            pending: ids
                .clone()
                .map(|id| {
                    self.descriptors.get(&id)?.pending.map(|p| p.command.pdu_type())
                })
                .collect(),
            actual: ids
                .map(|id| self.actual_state(id).unwrap_or(ProtocolState::Idle))
                .collect(),
        }
    }

    fn apply_command(&mut self, slave: SlaveId, command: ModelCommand) -> OperationResult {
        let Some(d) = self.descriptors.get_mut(&slave) else {
            return OperationResult::Error(OperationError::UnknownSlave);
        };
        if d.pending.is_some() {
            return OperationResult::Error(OperationError::CommandInProgress);
        }

        // The master checks its recorded state against the same lifecycle the
        // slave follows.
        let mut scratch = ModelSlave::in_state(d.state);
        let target = match scratch.handle(command) {
            ModelResponse::Nack => {
                return OperationResult::Error(OperationError::InvalidStateTransition);
            },
            ModelResponse::Ack => scratch.state(),
            ModelResponse::State(s) => s,
            ModelResponse::Info => d.state,
        };

        let timeout =
            if command == ModelCommand::DoStep { STEP_TIMEOUT_MS } else { COMMAND_TIMEOUT_MS };
        let seq = d.next_seq;
        d.next_seq += 1;
        d.pending = Some(Pending { command, seq, target, deadline_ms: self.now_ms + timeout });
        self.in_flight.push_back(InFlight { slave, command, seq });
        OperationResult::Ok
    }

    fn deliver(&mut self, message: InFlight) {
        let Some(slave) = self.slaves.get_mut(usize::from(message.slave)) else {
            return;
        };
        let response = slave.handle(message.command);

        let Some(d) = self.descriptors.get_mut(&message.slave) else {
            return;
        };
        let Some(pending) = d.pending.filter(|p| p.seq == message.seq) else {
            return;
        };
        d.pending = None;

        match response {
            ModelResponse::Ack if message.command == ModelCommand::Deregister => {
                self.descriptors.remove(&message.slave);
            },
            ModelResponse::Ack => d.state = pending.target,
            ModelResponse::Nack => d.state = ProtocolState::Error,
            ModelResponse::State(s) => d.state = s,
            ModelResponse::Info => {},
        }
    }
}

fn accepts_data(state: ProtocolState) -> bool {
    matches!(
        state,
        ProtocolState::Initialized | ProtocolState::Synchronizing | ProtocolState::Running
    )
}
