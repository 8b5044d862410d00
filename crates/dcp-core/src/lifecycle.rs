//! Command acceptance table shared by master and slave.
//!
//! Both sides consult the same table: the master to reject commands locally
//! before sending, the slave to NACK commands that arrive in the wrong state.
//! Keeping a single table means both ends agree on which commands are legal
//! and which state they lead to.
//!
//! ```text
//! Idle ─register─▶ Registered ─configure─▶ Configured ─initialize─▶ Initialized
//! Initialized ─prepare─▶ Synchronizing ─run─▶ Running ─prepare─▶ Synchronizing
//! stop: Configured..Running ─▶ Stopped ─deregister─▶ Idle
//! reset: any state but Idle ─▶ Registered
//! INF_state: any state, unchanged
//! ```

use dcp_proto::{
    PduType,
    ProtocolState::{
        self, Configured, Idle, Initialized, Registered, Running, Stopped, Synchronizing,
    },
};

/// Returns true if `command` is accepted while in `state`.
///
/// Non-command PDU types are never accepted.
pub fn accepts(state: ProtocolState, command: PduType) -> bool {
    match command {
        PduType::Register => state == Idle,
        PduType::Deregister => matches!(state, Registered | Stopped),
        PduType::Configure
        | PduType::SetTimeResolution
        | PduType::SetSteps
        | PduType::ClearConfiguration
        | PduType::SetParameter
        | PduType::SetScope => state == Registered,
        PduType::Initialize => state == Configured,
        PduType::Prepare => matches!(state, Initialized | Running),
        PduType::Run => state == Synchronizing,
        PduType::DoStep => matches!(state, Synchronizing | Running),
        PduType::SendOutputs => matches!(state, Initialized | Synchronizing | Running),
        PduType::Stop => matches!(state, Configured | Initialized | Synchronizing | Running),
        PduType::QueryState => true,
        PduType::Reset | PduType::SetLogging | PduType::QueryError | PduType::QueryLog => {
            state != Idle
        },
        _ => false,
    }
}

/// State reached once `command` completes successfully from `state`.
///
/// Returns `None` if the command is not accepted in `state`.
pub fn target(state: ProtocolState, command: PduType) -> Option<ProtocolState> {
    if !accepts(state, command) {
        return None;
    }

    Some(match command {
        PduType::Register | PduType::Reset => Registered,
        PduType::Deregister => Idle,
        PduType::Configure => Configured,
        PduType::Initialize => Initialized,
        PduType::Prepare => Synchronizing,
        PduType::Run => Running,
        PduType::Stop => Stopped,
        _ => state,
    })
}

/// Transient state a slave occupies while the command's callback runs.
pub fn transient(command: PduType) -> Option<ProtocolState> {
    match command {
        PduType::Configure => Some(ProtocolState::Configuring),
        PduType::Initialize => Some(ProtocolState::Initializing),
        PduType::Stop => Some(ProtocolState::Stopping),
        _ => None,
    }
}
