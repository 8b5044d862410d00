//! Master listeners.

use std::fmt;

use dcp_proto::{ErrorCode, LogEntry, NamedValue, ProtocolState, SlaveId};

use crate::{
    detector::{Channel, MissedPdu},
    error::SlaveFailure,
};

/// Data PDU received from a slave.
#[derive(Debug, Clone, PartialEq)]
pub struct DataReceived {
    /// Sending slave.
    pub slave_id: SlaveId,
    /// Input/output or parameter stream.
    pub channel: Channel,
    /// Step number or parameter sequence number.
    pub sequence: u32,
    /// Transported values.
    pub values: Vec<NamedValue>,
}

type StateListener = Box<dyn FnMut(SlaveId, ProtocolState, ProtocolState) + Send>;
type FailureListener = Box<dyn FnMut(&SlaveFailure) + Send>;
type DataListener = Box<dyn FnMut(&DataReceived) + Send>;
type LogListener = Box<dyn FnMut(SlaveId, &[LogEntry]) + Send>;
type MissedListener = Box<dyn FnMut(SlaveId, MissedPdu) + Send>;
type StepListener = Box<dyn FnMut(SlaveId, u32) + Send>;
type ErrorReportListener = Box<dyn FnMut(SlaveId, ErrorCode) + Send>;

/// Listeners of a [`super::Master`]. Unset listeners are skipped.
#[derive(Default)]
pub struct MasterListeners {
    pub(crate) state_changed: Option<StateListener>,
    pub(crate) error: Option<FailureListener>,
    pub(crate) data: Option<DataListener>,
    pub(crate) log_ack: Option<LogListener>,
    pub(crate) log_notification: Option<LogListener>,
    pub(crate) missed_control: Option<MissedListener>,
    pub(crate) missed_input_output: Option<MissedListener>,
    pub(crate) missed_parameter: Option<MissedListener>,
    pub(crate) step_finished: Option<StepListener>,
    pub(crate) error_report: Option<ErrorReportListener>,
}

impl MasterListeners {
    /// Empty listener set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe descriptor state changes as `(slave, old, new)`.
    #[must_use]
    pub fn on_state_changed<F>(mut self, f: F) -> Self
    where
        F: FnMut(SlaveId, ProtocolState, ProtocolState) + Send + 'static,
    {
        self.state_changed = Some(Box::new(f));
        self
    }

    /// Observe slaves entering `Error`.
    #[must_use]
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnMut(&SlaveFailure) + Send + 'static,
    {
        self.error = Some(Box::new(f));
        self
    }

    /// Observe `DAT_input_output` and `DAT_parameter` from slaves.
    #[must_use]
    pub fn on_data<F>(mut self, f: F) -> Self
    where
        F: FnMut(&DataReceived) + Send + 'static,
    {
        self.data = Some(Box::new(f));
        self
    }

    /// Observe entries returned by `INF_log`.
    #[must_use]
    pub fn on_log_ack<F>(mut self, f: F) -> Self
    where
        F: FnMut(SlaveId, &[LogEntry]) + Send + 'static,
    {
        self.log_ack = Some(Box::new(f));
        self
    }

    /// Observe `NTF_log` entries.
    #[must_use]
    pub fn on_log_notification<F>(mut self, f: F) -> Self
    where
        F: FnMut(SlaveId, &[LogEntry]) + Send + 'static,
    {
        self.log_notification = Some(Box::new(f));
        self
    }

    /// Observe gaps in a slave's responses and notifications.
    #[must_use]
    pub fn on_missed_control<F>(mut self, f: F) -> Self
    where
        F: FnMut(SlaveId, MissedPdu) + Send + 'static,
    {
        self.missed_control = Some(Box::new(f));
        self
    }

    /// Observe gaps in a slave's `DAT_input_output` stream.
    #[must_use]
    pub fn on_missed_input_output<F>(mut self, f: F) -> Self
    where
        F: FnMut(SlaveId, MissedPdu) + Send + 'static,
    {
        self.missed_input_output = Some(Box::new(f));
        self
    }

    /// Observe gaps in a slave's `DAT_parameter` stream.
    #[must_use]
    pub fn on_missed_parameter<F>(mut self, f: F) -> Self
    where
        F: FnMut(SlaveId, MissedPdu) + Send + 'static,
    {
        self.missed_parameter = Some(Box::new(f));
        self
    }

    /// Observe `NTF_step_finished`.
    #[must_use]
    pub fn on_step_finished<F>(mut self, f: F) -> Self
    where
        F: FnMut(SlaveId, u32) + Send + 'static,
    {
        self.step_finished = Some(Box::new(f));
        self
    }

    /// Observe error codes returned by `INF_error`.
    #[must_use]
    pub fn on_error_report<F>(mut self, f: F) -> Self
    where
        F: FnMut(SlaveId, ErrorCode) + Send + 'static,
    {
        self.error_report = Some(Box::new(f));
        self
    }

    pub(crate) fn state_changed(&mut self, id: SlaveId, old: ProtocolState, new: ProtocolState) {
        if let Some(f) = self.state_changed.as_mut() {
            f(id, old, new);
        }
    }

    pub(crate) fn error(&mut self, failure: &SlaveFailure) {
        if let Some(f) = self.error.as_mut() {
            f(failure);
        }
    }

    pub(crate) fn missed(&mut self, id: SlaveId, missed: MissedPdu) {
        let listener = match missed.channel() {
            Channel::Control => self.missed_control.as_mut(),
            Channel::Parameter => self.missed_parameter.as_mut(),
            Channel::InputOutput => self.missed_input_output.as_mut(),
        };
        if let Some(f) = listener {
            f(id, missed);
        }
    }
}

impl fmt::Debug for MasterListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterListeners")
            .field("state_changed", &self.state_changed.is_some())
            .field("error", &self.error.is_some())
            .field("data", &self.data.is_some())
            .finish_non_exhaustive()
    }
}
