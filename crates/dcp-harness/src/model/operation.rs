//! Operations for model-based testing.
//!
//! Operations are generated by proptest (through `arbitrary`) and applied to
//! both the reference model and a real [`crate::World`].

use arbitrary::Arbitrary;
use dcp_core::MasterError;
use dcp_proto::{PduType, SlaveId};

/// Commands the master can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum ModelCommand {
    /// `STC_register`
    Register,
    /// `STC_deregister`
    Deregister,
    /// `STC_configure` with an empty configuration.
    Configure,
    /// `STC_initialize`
    Initialize,
    /// `STC_prepare`
    Prepare,
    /// `STC_run` at time zero.
    Run,
    /// `STC_do_step`
    DoStep,
    /// `STC_send_outputs`
    SendOutputs,
    /// `STC_stop`
    Stop,
    /// `STC_reset`
    Reset,
    /// `CFG_set_time_res` with 1/1000.
    SetTimeResolution,
    /// `CFG_set_steps` of 2 for the input stream.
    SetSteps,
    /// `CFG_config_clear`
    ClearConfiguration,
    /// `CFG_set_parameter`
    SetParameter,
    /// `CFG_set_logging`
    SetLogging,
    /// `CFG_set_scope` of the input stream.
    SetScope,
    /// `INF_state`
    QueryState,
    /// `INF_error`
    QueryError,
    /// `INF_log`
    QueryLog,
}

impl ModelCommand {
    /// Wire type of the command.
    pub fn pdu_type(self) -> PduType {
        match self {
            Self::Register => PduType::Register,
            Self::Deregister => PduType::Deregister,
            Self::Configure => PduType::Configure,
            Self::Initialize => PduType::Initialize,
            Self::Prepare => PduType::Prepare,
            Self::Run => PduType::Run,
            Self::DoStep => PduType::DoStep,
            Self::SendOutputs => PduType::SendOutputs,
            Self::Stop => PduType::Stop,
            Self::Reset => PduType::Reset,
            Self::SetTimeResolution => PduType::SetTimeResolution,
            Self::SetSteps => PduType::SetSteps,
            Self::ClearConfiguration => PduType::ClearConfiguration,
            Self::SetParameter => PduType::SetParameter,
            Self::SetLogging => PduType::SetLogging,
            Self::SetScope => PduType::SetScope,
            Self::QueryState => PduType::QueryState,
            Self::QueryError => PduType::QueryError,
            Self::QueryLog => PduType::QueryLog,
        }
    }
}

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Start managing a slave (`Master::register_slave`).
    Manage {
        /// Target slave.
        slave: SlaveId,
    },

    /// Issue a command.
    Command {
        /// Target slave.
        slave: SlaveId,
        /// Command to send.
        command: ModelCommand,
    },

    /// Send `DAT_input_output` for `step`.
    SendInputs {
        /// Target slave.
        slave: SlaveId,
        /// Step number carried by the PDU.
        step: u8,
    },

    /// Advance the clock and process timeouts.
    AdvanceTime {
        /// Milliseconds to advance.
        millis: u16,
    },

    /// Deliver everything in flight.
    DeliverPending,
}

/// Result of applying an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation succeeded.
    Ok,

    /// Operation failed locally.
    Error(OperationError),
}

impl OperationResult {
    /// Check if operation succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Local failures the model predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationError {
    /// No descriptor for the slave.
    UnknownSlave,
    /// Descriptor already exists.
    AlreadyManaged,
    /// Recorded state does not accept the command.
    InvalidStateTransition,
    /// A command is awaiting its response.
    CommandInProgress,
    /// Recorded state does not allow data.
    DataNotAllowed,
    /// Encoding or transport failure. The model never predicts this.
    Environmental,
}

impl From<&MasterError> for OperationError {
    fn from(err: &MasterError) -> Self {
        match err {
            MasterError::UnknownSlave { .. } => Self::UnknownSlave,
            MasterError::SlaveAlreadyRegistered { .. } => Self::AlreadyManaged,
            MasterError::InvalidStateTransition { .. } => Self::InvalidStateTransition,
            MasterError::CommandInProgress { .. } => Self::CommandInProgress,
            MasterError::DataNotAllowed { .. } => Self::DataNotAllowed,
            MasterError::Encode(_) | MasterError::Transport(_) => Self::Environmental,
        }
    }
}

impl<T> From<Result<T, MasterError>> for OperationResult {
    fn from(result: Result<T, MasterError>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(e) => Self::Error(OperationError::from(&e)),
        }
    }
}
