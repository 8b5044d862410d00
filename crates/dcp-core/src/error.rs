//! Manager error types.

use std::{fmt, time::Duration};

use dcp_proto::{EncodeError, ErrorCode, PduType, ProtocolState, SlaveId};
use thiserror::Error;

use crate::transport::TransportError;

/// Errors returned by master operations.
///
/// None of these put any traffic on the wire: a failed call leaves the slave
/// descriptor exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MasterError {
    /// No descriptor for this id.
    #[error("unknown slave {slave_id}")]
    UnknownSlave {
        /// Requested slave.
        slave_id: SlaveId,
    },

    /// A descriptor with this id already exists.
    #[error("slave {slave_id} already registered")]
    SlaveAlreadyRegistered {
        /// Duplicate id.
        slave_id: SlaveId,
    },

    /// The slave's recorded state does not accept the command.
    #[error("{command} not allowed for slave {slave_id} in state {state}")]
    InvalidStateTransition {
        /// Target slave.
        slave_id: SlaveId,
        /// Rejected command.
        command: PduType,
        /// Recorded state.
        state: ProtocolState,
    },

    /// Another command is still awaiting its response.
    #[error("slave {slave_id} is still processing {pending}")]
    CommandInProgress {
        /// Target slave.
        slave_id: SlaveId,
        /// Outstanding command.
        pending: PduType,
    },

    /// Data may only flow while the slave is initialized, synchronizing or
    /// running.
    #[error("slave {slave_id} cannot exchange data in state {state}")]
    DataNotAllowed {
        /// Target slave.
        slave_id: SlaveId,
        /// Recorded state.
        state: ProtocolState,
    },

    /// The PDU could not be encoded.
    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),

    /// The transport refused the PDU.
    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),
}

impl MasterError {
    /// Returns true if the error reflects caller misuse rather than an
    /// environmental failure.
    ///
    /// Misuse errors are deterministic: retrying the same call without a state
    /// change fails the same way.
    pub fn is_misuse(&self) -> bool {
        match self {
            Self::UnknownSlave { .. }
            | Self::SlaveAlreadyRegistered { .. }
            | Self::InvalidStateTransition { .. }
            | Self::CommandInProgress { .. }
            | Self::DataNotAllowed { .. }
            | Self::Encode(_) => true,
            Self::Transport(_) => false,
        }
    }
}

/// Failure reported by an embedder callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct CallbackError {
    /// Explanation forwarded to the master in the `RSP_nack` detail.
    pub reason: String,
}

impl CallbackError {
    /// Create a callback error with `reason`.
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// Error recorded by a slave and passed to its error listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    /// Protocol error code.
    pub code: ErrorCode,
    /// Explanation.
    pub detail: String,
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.detail)
    }
}

/// Why the master moved a slave descriptor to `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The slave rejected the command.
    Nack {
        /// Reason code.
        code: ErrorCode,
        /// Explanation from the slave.
        detail: String,
    },
    /// No response arrived in time.
    Timeout {
        /// Configured timeout that expired.
        after: Duration,
    },
    /// The slave announced on its own that it entered `Error`.
    Reported,
    /// A sequenced PDU went missing on a channel configured as fatal.
    MissedPdu,
}

/// Event passed to the master's error listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaveFailure {
    /// Affected slave.
    pub slave_id: SlaveId,
    /// Command that failed, if the failure resolved one.
    pub command: Option<PduType>,
    /// What happened.
    pub reason: FailureReason,
}
