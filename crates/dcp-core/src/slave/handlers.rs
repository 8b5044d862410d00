//! Slave callbacks and listeners.
//!
//! Callbacks drive the simulation and can fail; listeners observe protocol
//! events and cannot. All handlers are supplied once, when the slave is
//! built, and run synchronously inside `Slave::on_receive`.

use std::{collections::BTreeMap, fmt};

use dcp_proto::{Configuration, NamedValue, OpMode, ProtocolState, Scope, SlaveId, Value};

use crate::{
    detector::MissedPdu,
    error::{CallbackError, ErrorReport},
};

/// Inputs to one simulation step.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// Step counter value once this step completes.
    pub step: u32,
    /// Simulation time to advance by.
    pub step_size: f64,
    /// Simulation time at the start of the step.
    pub time: f64,
    pub(crate) inputs: &'a BTreeMap<String, Value>,
    pub(crate) parameters: &'a BTreeMap<String, Value>,
}

impl<'a> StepContext<'a> {
    /// Latest value received for input `name`.
    pub fn input(&self, name: &str) -> Option<&'a Value> {
        self.inputs.get(name)
    }

    /// Current value of parameter `name`.
    pub fn parameter(&self, name: &str) -> Option<&'a Value> {
        self.parameters.get(name)
    }

    /// All inputs received so far, ordered by name.
    pub fn inputs(&self) -> impl Iterator<Item = (&'a str, &'a Value)> {
        self.inputs.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Result of one simulation step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutput {
    /// Output values to publish. Values are merged by name into the slave's
    /// output set.
    pub outputs: Vec<NamedValue>,
    /// Set while synchronizing once the slave has caught up with the master.
    pub synchronized: bool,
}

impl StepOutput {
    /// Step result carrying `outputs`.
    pub fn new(outputs: Vec<NamedValue>) -> Self {
        Self { outputs, synchronized: false }
    }

    /// Mark the slave as synchronized.
    #[must_use]
    pub fn synchronized(mut self) -> Self {
        self.synchronized = true;
        self
    }
}

/// `on_configure` callback.
pub type ConfigureFn = Box<dyn FnMut(&Configuration) -> Result<(), CallbackError> + Send>;
/// `on_initialize` callback, returns the initial outputs.
pub type InitializeFn = Box<dyn FnMut() -> Result<Vec<NamedValue>, CallbackError> + Send>;
/// Callback without inputs or outputs (`on_prepare`, `on_stop`).
pub type ActionFn = Box<dyn FnMut() -> Result<(), CallbackError> + Send>;
/// Step callback.
pub type StepFn = Box<dyn FnMut(&StepContext<'_>) -> Result<StepOutput, CallbackError> + Send>;
/// State change listener, receives `(old, new)`.
pub type StateListener = Box<dyn FnMut(ProtocolState, ProtocolState) + Send>;
/// Error listener.
pub type ErrorListener = Box<dyn FnMut(&ErrorReport) + Send>;
/// Missed-PDU listener.
pub type MissedListener = Box<dyn FnMut(MissedPdu) + Send>;

/// Callbacks and listeners of a [`super::Slave`].
///
/// Unset callbacks succeed without output; unset listeners are skipped.
#[derive(Default)]
pub struct SlaveHandlers {
    pub(crate) configure: Option<ConfigureFn>,
    pub(crate) initialize: Option<InitializeFn>,
    pub(crate) prepare: Option<ActionFn>,
    pub(crate) run_step: Option<StepFn>,
    pub(crate) synchronizing_step: Option<StepFn>,
    pub(crate) synchronized_step: Option<StepFn>,
    pub(crate) stop: Option<ActionFn>,

    pub(crate) state_changed: Option<StateListener>,
    pub(crate) error: Option<ErrorListener>,
    pub(crate) missed_control: Option<MissedListener>,
    pub(crate) missed_input_output: Option<MissedListener>,
    pub(crate) missed_parameter: Option<MissedListener>,
    pub(crate) configuration_cleared: Option<Box<dyn FnMut() + Send>>,
    pub(crate) time_resolution: Option<Box<dyn FnMut(u32, u32) + Send>>,
    pub(crate) runtime: Option<Box<dyn FnMut(f64) + Send>>,
    pub(crate) operation_information: Option<Box<dyn FnMut(SlaveId, OpMode) + Send>>,
    pub(crate) steps: Option<Box<dyn FnMut(u16, u32) + Send>>,
    pub(crate) scope: Option<Box<dyn FnMut(u16, Scope) + Send>>,
    pub(crate) parameter_preset: Option<Box<dyn FnMut(&NamedValue) + Send>>,
}

impl SlaveHandlers {
    /// Empty handler set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with the configuration from `STC_configure`.
    #[must_use]
    pub fn on_configure<F>(mut self, f: F) -> Self
    where
        F: FnMut(&Configuration) -> Result<(), CallbackError> + Send + 'static,
    {
        self.configure = Some(Box::new(f));
        self
    }

    /// Called on `STC_initialize`; returns the initial outputs.
    #[must_use]
    pub fn on_initialize<F>(mut self, f: F) -> Self
    where
        F: FnMut() -> Result<Vec<NamedValue>, CallbackError> + Send + 'static,
    {
        self.initialize = Some(Box::new(f));
        self
    }

    /// Called on `STC_prepare`.
    #[must_use]
    pub fn on_prepare<F>(mut self, f: F) -> Self
    where
        F: FnMut() -> Result<(), CallbackError> + Send + 'static,
    {
        self.prepare = Some(Box::new(f));
        self
    }

    /// Called on `STC_do_step` while running.
    #[must_use]
    pub fn on_run_step<F>(mut self, f: F) -> Self
    where
        F: FnMut(&StepContext<'_>) -> Result<StepOutput, CallbackError> + Send + 'static,
    {
        self.run_step = Some(Box::new(f));
        self
    }

    /// Called on `STC_do_step` while synchronizing, until a step reports
    /// [`StepOutput::synchronized`].
    #[must_use]
    pub fn on_synchronizing_step<F>(mut self, f: F) -> Self
    where
        F: FnMut(&StepContext<'_>) -> Result<StepOutput, CallbackError> + Send + 'static,
    {
        self.synchronizing_step = Some(Box::new(f));
        self
    }

    /// Called on `STC_do_step` while synchronizing, after the slave reported
    /// it is synchronized.
    #[must_use]
    pub fn on_synchronized_step<F>(mut self, f: F) -> Self
    where
        F: FnMut(&StepContext<'_>) -> Result<StepOutput, CallbackError> + Send + 'static,
    {
        self.synchronized_step = Some(Box::new(f));
        self
    }

    /// Called on `STC_stop`.
    #[must_use]
    pub fn on_stop<F>(mut self, f: F) -> Self
    where
        F: FnMut() -> Result<(), CallbackError> + Send + 'static,
    {
        self.stop = Some(Box::new(f));
        self
    }

    /// Observe every state change as `(old, new)`.
    #[must_use]
    pub fn on_state_changed<F>(mut self, f: F) -> Self
    where
        F: FnMut(ProtocolState, ProtocolState) + Send + 'static,
    {
        self.state_changed = Some(Box::new(f));
        self
    }

    /// Observe errors that moved the slave to `Error`.
    #[must_use]
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: FnMut(&ErrorReport) + Send + 'static,
    {
        self.error = Some(Box::new(f));
        self
    }

    /// Observe gaps in the master's command stream.
    #[must_use]
    pub fn on_missed_control<F>(mut self, f: F) -> Self
    where
        F: FnMut(MissedPdu) + Send + 'static,
    {
        self.missed_control = Some(Box::new(f));
        self
    }

    /// Observe missing `DAT_input_output` PDUs.
    #[must_use]
    pub fn on_missed_input_output<F>(mut self, f: F) -> Self
    where
        F: FnMut(MissedPdu) + Send + 'static,
    {
        self.missed_input_output = Some(Box::new(f));
        self
    }

    /// Observe missing `DAT_parameter` PDUs.
    #[must_use]
    pub fn on_missed_parameter<F>(mut self, f: F) -> Self
    where
        F: FnMut(MissedPdu) + Send + 'static,
    {
        self.missed_parameter = Some(Box::new(f));
        self
    }

    /// Called after `CFG_config_clear` discarded the configuration.
    #[must_use]
    pub fn on_configuration_cleared<F>(mut self, f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        self.configuration_cleared = Some(Box::new(f));
        self
    }

    /// Called with `(numerator, denominator)` from `CFG_set_time_res`.
    #[must_use]
    pub fn on_time_resolution<F>(mut self, f: F) -> Self
    where
        F: FnMut(u32, u32) + Send + 'static,
    {
        self.time_resolution = Some(Box::new(f));
        self
    }

    /// Called with the start time from `STC_run`.
    #[must_use]
    pub fn on_runtime<F>(mut self, f: F) -> Self
    where
        F: FnMut(f64) + Send + 'static,
    {
        self.runtime = Some(Box::new(f));
        self
    }

    /// Called on a successful `STC_register` with the adopted id and the
    /// operating mode chosen by the master.
    #[must_use]
    pub fn on_operation_information<F>(mut self, f: F) -> Self
    where
        F: FnMut(SlaveId, OpMode) + Send + 'static,
    {
        self.operation_information = Some(Box::new(f));
        self
    }

    /// Called with `(data_id, steps)` from `CFG_set_steps`.
    #[must_use]
    pub fn on_steps<F>(mut self, f: F) -> Self
    where
        F: FnMut(u16, u32) + Send + 'static,
    {
        self.steps = Some(Box::new(f));
        self
    }

    /// Called with `(data_id, scope)` from `CFG_set_scope`.
    #[must_use]
    pub fn on_scope<F>(mut self, f: F) -> Self
    where
        F: FnMut(u16, Scope) + Send + 'static,
    {
        self.scope = Some(Box::new(f));
        self
    }

    /// Called with each parameter preset by `CFG_set_parameter`.
    #[must_use]
    pub fn on_parameter_preset<F>(mut self, f: F) -> Self
    where
        F: FnMut(&NamedValue) + Send + 'static,
    {
        self.parameter_preset = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for SlaveHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlaveHandlers")
            .field("configure", &self.configure.is_some())
            .field("initialize", &self.initialize.is_some())
            .field("prepare", &self.prepare.is_some())
            .field("run_step", &self.run_step.is_some())
            .field("synchronizing_step", &self.synchronizing_step.is_some())
            .field("synchronized_step", &self.synchronized_step.is_some())
            .field("stop", &self.stop.is_some())
            .finish_non_exhaustive()
    }
}
