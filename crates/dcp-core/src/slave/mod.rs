//! Slave-side lifecycle manager.
//!
//! A [`Slave`] owns one simulation instance and drives it through the DCP
//! lifecycle under master control. It is sans-IO: the embedder passes every
//! received buffer to [`Slave::on_receive`], and the slave answers through
//! its [`Transport`].
//!
//! # Dispatch
//!
//! For each inbound command the slave:
//!
//! 1. drops it if addressed to another slave
//! 2. runs the control sequence number through the missed-PDU detector
//!    (stale commands are dropped)
//! 3. NACKs it with `InvalidStateTransition` if the current state does not
//!    accept it
//! 4. runs the matching callback; success advances the state and ACKs,
//!    failure moves to `Error`, NACKs with `CallbackFailure` and calls the
//!    error listener
//!
//! # Invariants
//!
//! - A rejected command never changes state.
//! - The step counter only moves forward, except on initialize and reset
//!   where it returns to zero.
//! - Inputs are expected once every `CFG_set_steps` steps of
//!   [`INPUT_DATA_ID`], one by default, and are only stored in states the
//!   stream's scope covers.

mod handlers;
mod log_buffer;

use std::collections::BTreeMap;

use dcp_proto::{
    Configuration, ErrorCode, INPUT_DATA_ID, LogEntry, LogLevel, LogMode, NamedValue, OpMode,
    PROTOCOL_VERSION_MAJOR, Pdu, PduType, ProtocolState, Scope, SlaveId, Value,
    payloads::{
        Ack, Command, ErrorAck, InputOutput, LogAck, LogNotification, Nack, StateAck,
        StateChanged, StepFinished,
    },
};
pub use handlers::{
    ActionFn, ConfigureFn, ErrorListener, InitializeFn, MissedListener, SlaveHandlers,
    StateListener, StepContext, StepFn, StepOutput,
};
pub use log_buffer::ALL_CATEGORIES;
use log_buffer::LogBuffer;
use tracing::{debug, info, warn};

use crate::{
    config::SlaveConfig,
    detector::{Channel, MissedPdu, MissedPduDetector, Observation},
    error::{CallbackError, ErrorReport},
    lifecycle,
    transport::{Endpoint, Transport},
};

/// NACK details are cut to this many bytes.
const MAX_DETAIL_LEN: usize = 1024;

/// Slave protocol state machine.
pub struct Slave<T> {
    config: SlaveConfig,
    handlers: SlaveHandlers,
    transport: T,

    state: ProtocolState,
    id: Option<SlaveId>,
    out_seq: u32,
    detector: MissedPduDetector,
    last_error: ErrorCode,

    configuration: Option<Configuration>,
    time_resolution: Option<(u32, u32)>,
    op_mode: Option<OpMode>,
    steps: BTreeMap<u16, u32>,
    scopes: BTreeMap<u16, Scope>,
    preset_parameters: BTreeMap<String, Value>,
    inputs: BTreeMap<String, Value>,
    parameters: BTreeMap<String, Value>,
    outputs: BTreeMap<String, Value>,

    step: u32,
    time: f64,
    synchronized: bool,
    inputs_since_boundary: bool,

    log: LogBuffer,
}

impl<T: Transport> Slave<T> {
    /// Create an idle slave.
    pub fn new(config: SlaveConfig, handlers: SlaveHandlers, transport: T) -> Self {
        let log = LogBuffer::new(config.log_level, config.log_mode, config.log_buffer_capacity);
        Self {
            config,
            handlers,
            transport,
            state: ProtocolState::Idle,
            id: None,
            out_seq: 0,
            detector: MissedPduDetector::new(),
            last_error: ErrorCode::None,
            configuration: None,
            time_resolution: None,
            op_mode: None,
            steps: BTreeMap::new(),
            scopes: BTreeMap::new(),
            preset_parameters: BTreeMap::new(),
            inputs: BTreeMap::new(),
            parameters: BTreeMap::new(),
            outputs: BTreeMap::new(),
            step: 0,
            time: 0.0,
            synchronized: false,
            inputs_since_boundary: false,
            log,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProtocolState {
        self.state
    }

    /// Id assigned at registration.
    pub fn id(&self) -> Option<SlaveId> {
        self.id
    }

    /// Number of completed steps since initialization.
    pub fn step(&self) -> u32 {
        self.step
    }

    /// Current simulation time.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Returns true once a synchronizing step reported it caught up.
    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }

    /// Static configuration.
    pub fn config(&self) -> &SlaveConfig {
        &self.config
    }

    /// Configuration received with `STC_configure`.
    pub fn configuration(&self) -> Option<&Configuration> {
        self.configuration.as_ref()
    }

    /// Time resolution received with `CFG_set_time_res`.
    pub fn time_resolution(&self) -> Option<(u32, u32)> {
        self.time_resolution
    }

    /// Operating mode selected at registration.
    pub fn op_mode(&self) -> Option<OpMode> {
        self.op_mode
    }

    /// Base steps per exchange on stream `data_id`, 1 unless configured.
    pub fn steps(&self, data_id: u16) -> u32 {
        self.steps.get(&data_id).copied().unwrap_or(1)
    }

    /// Scope of stream `data_id`.
    pub fn scope(&self, data_id: u16) -> Scope {
        self.scopes.get(&data_id).copied().unwrap_or_default()
    }

    /// Latest value of input `name`.
    pub fn input(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name)
    }

    /// Current value of parameter `name`.
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    /// Current value of output `name`.
    pub fn output(&self, name: &str) -> Option<&Value> {
        self.outputs.get(name)
    }

    /// Last error code, reported through `INF_error`.
    pub fn last_error(&self) -> ErrorCode {
        self.last_error
    }

    /// Log entries waiting for `INF_log`.
    pub fn buffered_log_entries(&self) -> usize {
        self.log.len()
    }

    /// Missed-PDU detector state for inbound streams.
    pub fn detector(&self) -> &MissedPduDetector {
        &self.detector
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Process one received buffer.
    ///
    /// Malformed buffers are logged and dropped without touching state.
    pub fn on_receive(&mut self, bytes: &[u8]) {
        match Pdu::decode(bytes) {
            Ok(pdu) => self.handle_pdu(pdu),
            Err(e) if e.is_unsupported() => {
                debug!(slave = %self.config.name, error = %e, "skipping unsupported PDU");
            },
            Err(e) => {
                warn!(slave = %self.config.name, error = %e, "dropping malformed PDU");
            },
        }
    }

    /// Process one decoded PDU.
    pub fn handle_pdu(&mut self, pdu: Pdu) {
        if let Some(address) = pdu.command_address() {
            self.handle_command(pdu, address);
        } else if pdu.pdu_type().is_data() {
            self.handle_data(pdu);
        } else {
            debug!(slave = %self.config.name, pdu = %pdu.pdu_type(), "ignoring master-bound PDU");
        }
    }

    /// Emit a log entry from the simulation.
    ///
    /// Entries below the configured severity are discarded. In
    /// on-notification mode the entry is sent as `NTF_log` right away,
    /// otherwise it waits for `INF_log`.
    pub fn log(&mut self, level: LogLevel, category: u8, message: impl Into<String>) {
        if !self.log.admits(level, category) {
            return;
        }

        let entry = LogEntry { level, category, timestamp: self.time, message: message.into() };
        match (self.log.mode(), self.id) {
            (LogMode::OnNotification, Some(sender)) => {
                let seq = self.next_seq();
                self.send(Pdu::Log(LogNotification { sender, seq, entry }));
            },
            _ => self.log.push(entry),
        }
    }

    /// Enter `Error` on behalf of the simulation.
    ///
    /// The master is told through `NTF_state_changed`. Does nothing while
    /// idle or already failed.
    pub fn report_error(&mut self, code: ErrorCode, detail: impl Into<String>) {
        self.enter_error(code, detail.into());
    }

    fn handle_command(&mut self, pdu: Pdu, address: Command) {
        let command = pdu.pdu_type();

        if let Some(id) = self.id
            && id != address.receiver
        {
            debug!(
                slave = %self.config.name,
                receiver = address.receiver,
                %command,
                "ignoring command for another slave"
            );
            return;
        }

        if self.state == ProtocolState::Idle && command == PduType::Register {
            self.detector.rebase(Channel::Control, address.seq);
        } else {
            match self.detector.observe(Channel::Control, address.seq) {
                Observation::Stale { last_seen, actual } => {
                    debug!(
                        slave = %self.config.name,
                        last_seen,
                        actual,
                        %command,
                        "dropping stale command"
                    );
                    return;
                },
                Observation::Gap { expected, actual } => {
                    let channel = Channel::Control;
                    self.report_missed(MissedPdu::Gap { channel, expected, actual });
                },
                Observation::First | Observation::InOrder => {},
            }
        }

        if !lifecycle::accepts(self.state, command) {
            let detail = format!("{command} not allowed in state {}", self.state);
            self.nack(command, address, ErrorCode::InvalidStateTransition, detail);
            return;
        }

        match pdu {
            Pdu::Register(p) => {
                if p.slave_uuid != self.config.uuid {
                    let detail =
                        format!("expected uuid {:x}, got {:x}", self.config.uuid, p.slave_uuid);
                    self.nack(command, address, ErrorCode::InvalidUuid, detail);
                    return;
                }
                if p.major_version != PROTOCOL_VERSION_MAJOR {
                    let detail = format!(
                        "protocol {}.{} not supported, expected major {PROTOCOL_VERSION_MAJOR}",
                        p.major_version, p.minor_version
                    );
                    self.nack(command, address, ErrorCode::InvalidMajorVersion, detail);
                    return;
                }
                if !self.config.op_modes.contains(&p.op_mode) {
                    let detail = format!("op mode {:?} not supported", p.op_mode);
                    self.nack(command, address, ErrorCode::InvalidOpMode, detail);
                    return;
                }
                self.id = Some(p.receiver);
                self.op_mode = Some(p.op_mode);
                self.set_state(ProtocolState::Registered);
                if let Some(listener) = self.handlers.operation_information.as_mut() {
                    listener(p.receiver, p.op_mode);
                }
                self.ack(command, address);
            },
            Pdu::Deregister(_) => {
                self.ack(command, address);
                self.id = None;
                self.op_mode = None;
                self.clear_configuration();
                self.detector.reset_all();
                self.set_state(ProtocolState::Idle);
            },
            Pdu::Configure(p) => self.configure(address, p.configuration),
            Pdu::SetTimeResolution(p) => {
                if p.numerator == 0 || p.denominator == 0 {
                    let detail =
                        format!("{}/{} is not a valid resolution", p.numerator, p.denominator);
                    self.nack(command, address, ErrorCode::InvalidTimeResolution, detail);
                    return;
                }
                self.time_resolution = Some((p.numerator, p.denominator));
                if let Some(listener) = self.handlers.time_resolution.as_mut() {
                    listener(p.numerator, p.denominator);
                }
                self.ack(command, address);
            },
            Pdu::SetSteps(p) => {
                if p.steps == 0 {
                    let detail = format!("zero steps for data id {}", p.data_id);
                    self.nack(command, address, ErrorCode::InvalidSteps, detail);
                    return;
                }
                self.steps.insert(p.data_id, p.steps);
                if let Some(listener) = self.handlers.steps.as_mut() {
                    listener(p.data_id, p.steps);
                }
                self.ack(command, address);
            },
            Pdu::SetScope(p) => {
                self.scopes.insert(p.data_id, p.scope);
                if let Some(listener) = self.handlers.scope.as_mut() {
                    listener(p.data_id, p.scope);
                }
                self.ack(command, address);
            },
            Pdu::SetParameter(p) => {
                let known = &self.config.known_parameters;
                if !known.is_empty() && !known.contains(&p.parameter.name) {
                    let detail = format!("unknown parameter {:?}", p.parameter.name);
                    self.nack(command, address, ErrorCode::InvalidValueReference, detail);
                    return;
                }
                if let Some(listener) = self.handlers.parameter_preset.as_mut() {
                    listener(&p.parameter);
                }
                self.preset_parameters.insert(p.parameter.name, p.parameter.value);
                self.ack(command, address);
            },
            Pdu::ClearConfiguration(_) => {
                self.clear_configuration();
                if let Some(listener) = self.handlers.configuration_cleared.as_mut() {
                    listener();
                }
                self.ack(command, address);
            },
            Pdu::SetLogging(p) => {
                self.log.configure(p.category, p.level, p.mode);
                self.ack(command, address);
            },
            Pdu::Initialize(_) => self.initialize(address),
            Pdu::Prepare(_) => {
                let result = self.handlers.prepare.as_mut().map_or(Ok(()), |cb| cb());
                match result {
                    Ok(()) => {
                        self.synchronized = false;
                        self.set_state(ProtocolState::Synchronizing);
                        self.ack(command, address);
                    },
                    Err(e) => self.fail(command, address, e),
                }
            },
            Pdu::Run(p) => {
                if let Some(listener) = self.handlers.runtime.as_mut() {
                    listener(p.start_time);
                }
                self.time = p.start_time;
                self.set_state(ProtocolState::Running);
                self.ack(command, address);
            },
            Pdu::DoStep(p) => self.do_step(address, p.step_size),
            Pdu::SendOutputs(_) => self.send_outputs(address),
            Pdu::Stop(_) => {
                self.set_state(ProtocolState::Stopping);
                let result = self.handlers.stop.as_mut().map_or(Ok(()), |cb| cb());
                match result {
                    Ok(()) => {
                        self.set_state(ProtocolState::Stopped);
                        self.ack(command, address);
                    },
                    Err(e) => self.fail(command, address, e),
                }
            },
            Pdu::Reset(_) => {
                self.last_error = ErrorCode::None;
                self.clear_simulation_data();
                self.detector.reset(Channel::InputOutput);
                self.detector.reset(Channel::Parameter);
                self.set_state(ProtocolState::Registered);
                self.ack(command, address);
            },
            Pdu::QueryState(_) => {
                let (sender, seq) = (self.sender(address), self.next_seq());
                let state = self.state;
                self.send(Pdu::StateAck(StateAck { sender, seq, resp_seq: address.seq, state }));
            },
            Pdu::QueryError(_) => {
                let (sender, seq) = (self.sender(address), self.next_seq());
                let code = self.last_error;
                self.send(Pdu::ErrorAck(ErrorAck { sender, seq, resp_seq: address.seq, code }));
            },
            Pdu::QueryLog(p) => {
                let entries = self.log.drain(p.category, usize::from(p.max_entries));
                let (sender, seq) = (self.sender(address), self.next_seq());
                self.send(Pdu::LogAck(LogAck { sender, seq, resp_seq: address.seq, entries }));
            },
            _ => {
                self.nack(command, address, ErrorCode::NotSupportedPdu, String::new());
            },
        }
    }

    fn configure(&mut self, address: Command, configuration: Configuration) {
        let command = PduType::Configure;
        if self.config.require_time_resolution && self.time_resolution.is_none() {
            let detail = String::from("time resolution not set");
            self.nack(command, address, ErrorCode::IncompleteConfiguration, detail);
            return;
        }

        self.set_state(ProtocolState::Configuring);
        let result = self.handlers.configure.as_mut().map_or(Ok(()), |cb| cb(&configuration));
        match result {
            Ok(()) => {
                self.parameters = configuration
                    .parameters
                    .iter()
                    .map(|p| (p.name.clone(), p.value.clone()))
                    .collect();
                self.parameters.extend(self.preset_parameters.clone());
                self.configuration = Some(configuration);
                self.set_state(ProtocolState::Configured);
                self.ack(command, address);
            },
            Err(e) => self.fail(command, address, e),
        }
    }

    fn initialize(&mut self, address: Command) {
        let command = PduType::Initialize;
        self.set_state(ProtocolState::Initializing);
        let result = self.handlers.initialize.as_mut().map_or(Ok(Vec::new()), |cb| cb());
        match result {
            Ok(initial) => {
                self.step = 0;
                self.synchronized = false;
                self.inputs.clear();
                self.inputs_since_boundary = false;
                self.detector.reset(Channel::InputOutput);
                self.detector.reset(Channel::Parameter);
                self.outputs = initial.into_iter().map(|v| (v.name, v.value)).collect();
                self.set_state(ProtocolState::Initialized);
                self.ack(command, address);
            },
            Err(e) => self.fail(command, address, e),
        }
    }

    fn do_step(&mut self, address: Command, step_size: f64) {
        let command = PduType::DoStep;
        if !(step_size.is_finite() && step_size > 0.0) {
            let detail = format!("step size {step_size} must be finite and positive");
            self.nack(command, address, ErrorCode::InvalidSteps, detail);
            return;
        }

        let boundary = self.step % self.steps(INPUT_DATA_ID) == 0;
        if self.config.require_inputs_every_step
            && boundary
            && self.step > 0
            && !self.inputs_since_boundary
        {
            let channel = Channel::InputOutput;
            self.report_missed(MissedPdu::Absent { channel, step: self.step });
            if self.state == ProtocolState::Error {
                let detail = format!("no inputs received for step {}", self.step);
                self.nack(command, address, ErrorCode::PduMissed, detail);
                return;
            }
        }

        let next = self.step.wrapping_add(1);
        let ctx = StepContext {
            step: next,
            step_size,
            time: self.time,
            inputs: &self.inputs,
            parameters: &self.parameters,
        };
        let callback = match (self.state, self.synchronized) {
            (ProtocolState::Running, _) => self.handlers.run_step.as_mut(),
            (_, true) => self.handlers.synchronized_step.as_mut(),
            (_, false) => self.handlers.synchronizing_step.as_mut(),
        };
        let result = callback.map_or_else(|| Ok(StepOutput::default()), |cb| cb(&ctx));

        match result {
            Ok(output) => {
                self.step = next;
                self.time += step_size;
                if boundary {
                    self.inputs_since_boundary = false;
                }
                if self.state == ProtocolState::Synchronizing && output.synchronized {
                    self.synchronized = true;
                }
                self.outputs.extend(output.outputs.into_iter().map(|v| (v.name, v.value)));
                self.ack(command, address);

                let (sender, seq) = (self.sender(address), self.next_seq());
                self.send(Pdu::StepFinished(StepFinished { sender, seq, step: self.step }));
            },
            Err(e) => self.fail(command, address, e),
        }
    }

    fn send_outputs(&mut self, address: Command) {
        let command = PduType::SendOutputs;
        let selected = self.configuration.as_ref().map(|c| &c.outputs).filter(|o| !o.is_empty());
        let values = self
            .outputs
            .iter()
            .filter(|(name, _)| selected.is_none_or(|names| names.contains(name)))
            .map(|(name, value)| NamedValue::new(name.clone(), value.clone()))
            .collect();

        let slave_id = self.sender(address);
        let data = Pdu::InputOutput(InputOutput { slave_id, step: self.step, values });
        match data.to_bytes() {
            Ok(bytes) => {
                if let Err(e) = self.transport.send(Endpoint::Master, bytes) {
                    warn!(slave = %self.config.name, error = %e, "failed to send outputs");
                }
                self.ack(command, address);
            },
            Err(e) => self.nack(command, address, ErrorCode::InvalidPayload, e.to_string()),
        }
    }

    fn handle_data(&mut self, pdu: Pdu) {
        let (slave_id, channel, seq, values) = match pdu {
            Pdu::InputOutput(p) => (p.slave_id, Channel::InputOutput, p.step, p.values),
            Pdu::Parameter(p) => (p.slave_id, Channel::Parameter, p.seq, p.values),
            _ => return,
        };

        if self.id != Some(slave_id) {
            debug!(slave = %self.config.name, slave_id, "ignoring data for another slave");
            return;
        }
        if !self.state.accepts_data() {
            debug!(
                slave = %self.config.name,
                state = %self.state,
                %channel,
                "ignoring data outside stepping states"
            );
            return;
        }

        match self.detector.observe(channel, seq) {
            Observation::Stale { last_seen, actual } => {
                debug!(
                    slave = %self.config.name,
                    %channel,
                    last_seen,
                    actual,
                    "dropping stale data"
                );
                return;
            },
            Observation::Gap { expected, actual } => {
                self.report_missed(MissedPdu::Gap { channel, expected, actual });
                if self.state == ProtocolState::Error {
                    return;
                }
            },
            Observation::First | Observation::InOrder => {},
        }

        match channel {
            Channel::InputOutput => {
                let scope = self.scope(INPUT_DATA_ID);
                if !scope.covers(self.state) {
                    debug!(
                        slave = %self.config.name,
                        state = %self.state,
                        ?scope,
                        "discarding inputs outside their scope"
                    );
                    return;
                }
                let accepted =
                    self.configuration.as_ref().map(|c| &c.inputs).filter(|i| !i.is_empty());
                for v in values {
                    if accepted.is_none_or(|names| names.contains(&v.name)) {
                        self.inputs.insert(v.name, v.value);
                    }
                }
                self.inputs_since_boundary = true;
            },
            Channel::Parameter => {
                self.parameters.extend(values.into_iter().map(|v| (v.name, v.value)));
            },
            Channel::Control => {},
        }
    }

    fn report_missed(&mut self, missed: MissedPdu) {
        let channel = missed.channel();
        warn!(slave = %self.config.name, ?missed, "missed PDU");

        let listener = match channel {
            Channel::Control => self.handlers.missed_control.as_mut(),
            Channel::Parameter => self.handlers.missed_parameter.as_mut(),
            Channel::InputOutput => self.handlers.missed_input_output.as_mut(),
        };
        if let Some(listener) = listener {
            listener(missed);
        }

        if self.config.fatal_missed_pdus.is_fatal(channel) {
            self.enter_error(ErrorCode::PduMissed, format!("missed {channel} PDU: {missed:?}"));
        }
    }

    fn fail(&mut self, command: PduType, address: Command, error: CallbackError) {
        warn!(slave = %self.config.name, %command, reason = %error, "callback failed");
        self.last_error = ErrorCode::CallbackFailure;
        self.set_state(ProtocolState::Error);
        self.nack(command, address, ErrorCode::CallbackFailure, error.reason.clone());

        let report = ErrorReport { code: ErrorCode::CallbackFailure, detail: error.reason };
        if let Some(listener) = self.handlers.error.as_mut() {
            listener(&report);
        }
    }

    fn enter_error(&mut self, code: ErrorCode, detail: String) {
        if matches!(self.state, ProtocolState::Idle | ProtocolState::Error) {
            return;
        }

        self.last_error = code;
        self.set_state(ProtocolState::Error);
        if let Some(sender) = self.id {
            let seq = self.next_seq();
            self.send(Pdu::StateChanged(StateChanged { sender, seq, state: ProtocolState::Error }));
        }

        let report = ErrorReport { code, detail };
        if let Some(listener) = self.handlers.error.as_mut() {
            listener(&report);
        }
    }

    fn set_state(&mut self, new: ProtocolState) {
        let old = self.state;
        if old == new {
            return;
        }

        self.state = new;
        info!(slave = %self.config.name, %old, %new, "state changed");
        if let Some(listener) = self.handlers.state_changed.as_mut() {
            listener(old, new);
        }
    }

    fn clear_configuration(&mut self) {
        self.configuration = None;
        self.time_resolution = None;
        self.steps.clear();
        self.scopes.clear();
        self.preset_parameters.clear();
        self.clear_simulation_data();
    }

    fn clear_simulation_data(&mut self) {
        self.step = 0;
        self.time = 0.0;
        self.synchronized = false;
        self.inputs_since_boundary = false;
        self.inputs.clear();
        self.parameters.clear();
        self.outputs.clear();
    }

    fn sender(&self, address: Command) -> SlaveId {
        self.id.unwrap_or(address.receiver)
    }

    fn next_seq(&mut self) -> u32 {
        let seq = self.out_seq;
        self.out_seq = self.out_seq.wrapping_add(1);
        seq
    }

    fn ack(&mut self, command: PduType, address: Command) {
        let (sender, seq) = (self.sender(address), self.next_seq());
        self.send(Pdu::Ack(Ack { sender, seq, resp_seq: address.seq, command }));
    }

    fn nack(&mut self, command: PduType, address: Command, code: ErrorCode, mut detail: String) {
        debug!(slave = %self.config.name, %command, %code, %detail, "rejecting command");
        truncate_detail(&mut detail);
        let (sender, seq) = (self.sender(address), self.next_seq());
        self.send(Pdu::Nack(Nack { sender, seq, resp_seq: address.seq, command, code, detail }));
    }

    fn send(&mut self, pdu: Pdu) {
        let pdu_type = pdu.pdu_type();
        match pdu.to_bytes() {
            Ok(bytes) => {
                if let Err(e) = self.transport.send(Endpoint::Master, bytes) {
                    warn!(slave = %self.config.name, pdu = %pdu_type, error = %e, "send failed");
                }
            },
            Err(e) => {
                warn!(slave = %self.config.name, pdu = %pdu_type, error = %e, "encode failed");
            },
        }
    }
}

impl<T> std::fmt::Debug for Slave<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slave")
            .field("name", &self.config.name)
            .field("id", &self.id)
            .field("state", &self.state)
            .field("step", &self.step)
            .finish_non_exhaustive()
    }
}

fn truncate_detail(detail: &mut String) {
    if detail.len() <= MAX_DETAIL_LEN {
        return;
    }
    let mut end = MAX_DETAIL_LEN;
    while !detail.is_char_boundary(end) {
        end -= 1;
    }
    detail.truncate(end);
}
