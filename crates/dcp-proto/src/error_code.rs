//! Error codes carried by `RSP_nack` and `RSP_error_ack`.

use std::fmt;

/// Reason code reported by a slave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u16)]
pub enum ErrorCode {
    /// No error recorded.
    #[default]
    None = 0x0000,
    /// Unspecified protocol error.
    ProtocolGeneric = 0x1001,
    /// Command not accepted in the current state.
    InvalidStateTransition = 0x1003,
    /// A transition is already running.
    StateTransitionInProgress = 0x1005,
    /// An embedder callback reported failure.
    CallbackFailure = 0x1006,
    /// A sequenced PDU went missing and the channel is configured as fatal.
    PduMissed = 0x1007,
    /// Payload length invalid for the PDU type.
    InvalidLength = 0x2001,
    /// Master speaks an incompatible major protocol version.
    InvalidMajorVersion = 0x2005,
    /// Operating mode not supported by the slave.
    InvalidOpMode = 0x2008,
    /// Payload content rejected.
    InvalidPayload = 0x2009,
    /// Step size not finite and positive, or a zero steps setting.
    InvalidSteps = 0x200E,
    /// Time resolution with a zero term.
    InvalidTimeResolution = 0x200F,
    /// `STC_register` addressed a different slave uuid.
    InvalidUuid = 0x2011,
    /// Parameter name not known to the slave.
    InvalidValueReference = 0x2012,
    /// Configuration lacks a required setting.
    IncompleteConfiguration = 0x300A,
    /// PDU type not handled by this slave.
    NotSupportedPdu = 0x4005,
}

impl ErrorCode {
    /// Every code, in wire order.
    pub const ALL: [Self; 16] = [
        Self::None,
        Self::ProtocolGeneric,
        Self::InvalidStateTransition,
        Self::StateTransitionInProgress,
        Self::CallbackFailure,
        Self::PduMissed,
        Self::InvalidLength,
        Self::InvalidMajorVersion,
        Self::InvalidOpMode,
        Self::InvalidPayload,
        Self::InvalidSteps,
        Self::InvalidTimeResolution,
        Self::InvalidUuid,
        Self::InvalidValueReference,
        Self::IncompleteConfiguration,
        Self::NotSupportedPdu,
    ];

    /// Convert a raw code.
    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|c| *c as u16 == value)
    }

    /// Raw code.
    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?} (0x{:04x})", *self as u16)
    }
}
