//! Reference slave.

use dcp_proto::ProtocolState::{
    self, Configured, Idle, Initialized, Registered, Running, Stopped, Synchronizing,
};

use super::operation::ModelCommand;

/// How the slave answers a delivered command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelResponse {
    /// `RSP_ack`.
    Ack,
    /// `RSP_nack`.
    Nack,
    /// `RSP_state_ack` carrying the slave's state.
    State(ProtocolState),
    /// `RSP_error_ack` or `RSP_log_ack`.
    Info,
}

/// Lifecycle of a slave whose callbacks always succeed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelSlave {
    state: ProtocolState,
}

impl ModelSlave {
    /// Idle slave.
    pub fn new() -> Self {
        Self::default()
    }

    /// Slave already in `state`.
    pub fn in_state(state: ProtocolState) -> Self {
        Self { state }
    }

    /// Current state.
    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// Process a delivered command.
    pub fn handle(&mut self, command: ModelCommand) -> ModelResponse {
        use ModelCommand as C;

        let next = match (command, self.state) {
            (C::QueryState, s) => return ModelResponse::State(s),
            (C::Register, Idle) => Registered,
            (_, Idle) => return ModelResponse::Nack,
            (C::Deregister, Registered | Stopped) => Idle,
            (C::Configure, Registered) => Configured,
            (
                C::SetTimeResolution
                | C::SetSteps
                | C::ClearConfiguration
                | C::SetParameter
                | C::SetScope,
                Registered,
            ) => Registered,
            (C::Initialize, Configured) => Initialized,
            (C::Prepare, Initialized | Running) => Synchronizing,
            (C::Run, Synchronizing) => Running,
            (C::DoStep, s @ (Synchronizing | Running)) => s,
            (C::SendOutputs, s @ (Initialized | Synchronizing | Running)) => s,
            (C::Stop, Configured | Initialized | Synchronizing | Running) => Stopped,
            (C::Reset, _) => Registered,
            (C::SetLogging, s) => s,
            (C::QueryError | C::QueryLog, _) => return ModelResponse::Info,
            _ => return ModelResponse::Nack,
        };

        self.state = next;
        ModelResponse::Ack
    }
}
