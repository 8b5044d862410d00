//! PDU type tags.
//!
//! Tags are grouped by range: state transition commands (`STC_*`) at 0x01,
//! configuration (`CFG_*`) at 0x20, information requests (`INF_*`) at 0x80,
//! responses (`RSP_*`) at 0xB0, notifications (`NTF_*`) at 0xE0 and data
//! (`DAT_*`) at 0xF0.

use std::fmt;

/// Type tag carried in the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PduType {
    /// `STC_register`
    Register = 0x01,
    /// `STC_deregister`
    Deregister = 0x02,
    /// `STC_prepare`
    Prepare = 0x03,
    /// `STC_configure`
    Configure = 0x04,
    /// `STC_initialize`
    Initialize = 0x05,
    /// `STC_run`
    Run = 0x06,
    /// `STC_do_step`
    DoStep = 0x07,
    /// `STC_send_outputs`
    SendOutputs = 0x08,
    /// `STC_stop`
    Stop = 0x09,
    /// `STC_reset`
    Reset = 0x0A,
    /// `CFG_set_time_res`
    SetTimeResolution = 0x20,
    /// `CFG_set_steps`
    SetSteps = 0x21,
    /// `CFG_config_clear`
    ClearConfiguration = 0x24,
    /// `CFG_set_parameter`
    SetParameter = 0x27,
    /// `CFG_set_logging`
    SetLogging = 0x2A,
    /// `CFG_set_scope`
    SetScope = 0x2B,
    /// `INF_state`
    QueryState = 0x80,
    /// `INF_error`
    QueryError = 0x81,
    /// `INF_log`
    QueryLog = 0x82,
    /// `RSP_ack`
    Ack = 0xB0,
    /// `RSP_nack`
    Nack = 0xB1,
    /// `RSP_state_ack`
    StateAck = 0xB2,
    /// `RSP_error_ack`
    ErrorAck = 0xB3,
    /// `RSP_log_ack`
    LogAck = 0xB4,
    /// `NTF_state_changed`
    StateChanged = 0xE0,
    /// `NTF_log`
    Log = 0xE1,
    /// `NTF_step_finished`
    StepFinished = 0xE2,
    /// `DAT_input_output`
    InputOutput = 0xF0,
    /// `DAT_parameter`
    Parameter = 0xF1,
}

impl PduType {
    /// Every known type, in tag order.
    pub const ALL: [Self; 29] = [
        Self::Register,
        Self::Deregister,
        Self::Prepare,
        Self::Configure,
        Self::Initialize,
        Self::Run,
        Self::DoStep,
        Self::SendOutputs,
        Self::Stop,
        Self::Reset,
        Self::SetTimeResolution,
        Self::SetSteps,
        Self::ClearConfiguration,
        Self::SetParameter,
        Self::SetLogging,
        Self::SetScope,
        Self::QueryState,
        Self::QueryError,
        Self::QueryLog,
        Self::Ack,
        Self::Nack,
        Self::StateAck,
        Self::ErrorAck,
        Self::LogAck,
        Self::StateChanged,
        Self::Log,
        Self::StepFinished,
        Self::InputOutput,
        Self::Parameter,
    ];

    /// Convert a raw tag, returning `None` for unknown values.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| *t as u8 == value)
    }

    /// Raw tag value.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Master-issued PDU that expects exactly one response.
    pub fn is_command(self) -> bool {
        (self as u8) < 0xB0
    }

    /// Slave response to a command.
    pub fn is_response(self) -> bool {
        (0xB0..0xE0).contains(&(self as u8))
    }

    /// Unsolicited slave notification.
    pub fn is_notification(self) -> bool {
        (0xE0..0xF0).contains(&(self as u8))
    }

    /// Input/output or parameter data.
    pub fn is_data(self) -> bool {
        (self as u8) >= 0xF0
    }

    /// Exact payload length for fixed-size types.
    ///
    /// Variable-size types return `None` and are validated field by field.
    pub fn fixed_payload_len(self) -> Option<usize> {
        match self {
            Self::Deregister
            | Self::Prepare
            | Self::Initialize
            | Self::SendOutputs
            | Self::Stop
            | Self::Reset
            | Self::ClearConfiguration
            | Self::QueryState
            | Self::QueryError => Some(5),
            Self::Register => Some(24),
            Self::SetSteps => Some(11),
            Self::SetScope => Some(8),
            Self::Run | Self::DoStep | Self::SetTimeResolution => Some(13),
            Self::SetLogging => Some(8),
            Self::QueryLog => Some(7),
            Self::Ack | Self::StateAck => Some(10),
            Self::ErrorAck => Some(11),
            Self::StateChanged => Some(6),
            Self::StepFinished => Some(9),
            Self::Configure
            | Self::SetParameter
            | Self::Nack
            | Self::LogAck
            | Self::Log
            | Self::InputOutput
            | Self::Parameter => None,
        }
    }

    /// Protocol name as written in DCP documents.
    pub fn name(self) -> &'static str {
        match self {
            Self::Register => "STC_register",
            Self::Deregister => "STC_deregister",
            Self::Prepare => "STC_prepare",
            Self::Configure => "STC_configure",
            Self::Initialize => "STC_initialize",
            Self::Run => "STC_run",
            Self::DoStep => "STC_do_step",
            Self::SendOutputs => "STC_send_outputs",
            Self::Stop => "STC_stop",
            Self::Reset => "STC_reset",
            Self::SetTimeResolution => "CFG_set_time_res",
            Self::SetSteps => "CFG_set_steps",
            Self::ClearConfiguration => "CFG_config_clear",
            Self::SetParameter => "CFG_set_parameter",
            Self::SetLogging => "CFG_set_logging",
            Self::SetScope => "CFG_set_scope",
            Self::QueryState => "INF_state",
            Self::QueryError => "INF_error",
            Self::QueryLog => "INF_log",
            Self::Ack => "RSP_ack",
            Self::Nack => "RSP_nack",
            Self::StateAck => "RSP_state_ack",
            Self::ErrorAck => "RSP_error_ack",
            Self::LogAck => "RSP_log_ack",
            Self::StateChanged => "NTF_state_changed",
            Self::Log => "NTF_log",
            Self::StepFinished => "NTF_step_finished",
            Self::InputOutput => "DAT_input_output",
            Self::Parameter => "DAT_parameter",
        }
    }
}

impl fmt::Display for PduType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        for t in PduType::ALL {
            assert_eq!(PduType::from_u8(t.to_u8()), Some(t));
        }
    }

    #[test]
    fn unknown_tags_are_rejected() {
        assert_eq!(PduType::from_u8(0x00), None);
        assert_eq!(PduType::from_u8(0x25), None);
        assert_eq!(PduType::from_u8(0xff), None);
    }

    #[test]
    fn every_type_has_exactly_one_category() {
        for t in PduType::ALL {
            let categories = [t.is_command(), t.is_response(), t.is_notification(), t.is_data()];
            assert_eq!(categories.iter().filter(|c| **c).count(), 1, "{t}");
        }
    }
}
