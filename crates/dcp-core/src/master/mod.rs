//! Master-side orchestration.
//!
//! The [`Master`] keeps one [`SlaveDescriptor`] per managed slave and drives
//! each through the lifecycle with `STC_*`, `CFG_*` and `INF_*` commands.
//! Like the slave it is sans-IO: commands go out through a [`Transport`],
//! received buffers come back through [`Master::on_receive`], and response
//! deadlines are enforced by [`Master::tick`] against the injected
//! [`Environment`] clock.
//!
//! # Invariants
//!
//! - At most one command per slave is awaiting a response. A second command
//!   fails locally with [`MasterError::CommandInProgress`].
//! - A command rejected locally puts nothing on the wire and leaves the
//!   descriptor untouched.
//! - Descriptor state only changes on a matching response, a slave
//!   notification, a timeout or a fatal missed PDU.

mod descriptor;
mod listeners;

use std::{collections::BTreeMap, slice, time::Duration};

use dcp_proto::{
    Configuration, LogLevel, LogMode, NamedValue, PROTOCOL_VERSION_MAJOR, PROTOCOL_VERSION_MINOR,
    Pdu, PduType, ProtocolState, Scope, SlaveId,
    payloads::{
        Ack, Command, Configure, DoStep, InputOutput, Nack, Parameters, QueryLog, Register, Run,
        SetLogging, SetParameter, SetScope, SetSteps, SetTimeResolution,
    },
};
pub use descriptor::{PendingCommand, SlaveDescription, SlaveDescriptor};
pub use listeners::{DataReceived, MasterListeners};
use tracing::{debug, info, warn};

use crate::{
    config::MasterConfig,
    detector::{Channel, MissedPdu, Observation},
    env::Environment,
    error::{FailureReason, MasterError, SlaveFailure},
    lifecycle,
    transport::{Endpoint, Transport},
};

/// Master protocol state machine.
pub struct Master<E: Environment, T> {
    env: E,
    config: MasterConfig,
    listeners: MasterListeners,
    transport: T,
    slaves: BTreeMap<SlaveId, SlaveDescriptor<E::Instant>>,
}

impl<E: Environment, T: Transport> Master<E, T> {
    /// Create a master managing no slaves.
    pub fn new(env: E, config: MasterConfig, listeners: MasterListeners, transport: T) -> Self {
        Self { env, config, listeners, transport, slaves: BTreeMap::new() }
    }

    /// Start managing a slave. Its descriptor begins in `Idle`.
    pub fn register_slave(&mut self, description: SlaveDescription) -> Result<(), MasterError> {
        let id = description.id;
        if self.slaves.contains_key(&id) {
            return Err(MasterError::SlaveAlreadyRegistered { slave_id: id });
        }

        debug!(slave_id = id, name = %description.name, "managing slave");
        self.slaves.insert(id, SlaveDescriptor::new(description));
        Ok(())
    }

    /// Stop managing a slave without telling it.
    pub fn remove_slave(&mut self, id: SlaveId) -> Option<SlaveDescriptor<E::Instant>> {
        self.slaves.remove(&id)
    }

    /// Recorded state of slave `id`.
    pub fn slave_state(&self, id: SlaveId) -> Option<ProtocolState> {
        self.slaves.get(&id).map(SlaveDescriptor::state)
    }

    /// Descriptor of slave `id`.
    pub fn descriptor(&self, id: SlaveId) -> Option<&SlaveDescriptor<E::Instant>> {
        self.slaves.get(&id)
    }

    /// Command awaiting a response from slave `id`.
    pub fn pending_command(&self, id: SlaveId) -> Option<PduType> {
        self.slaves.get(&id)?.pending.map(|p| p.command)
    }

    /// Ids of all managed slaves, ascending.
    pub fn slave_ids(&self) -> impl Iterator<Item = SlaveId> + '_ {
        self.slaves.keys().copied()
    }

    /// Configuration.
    pub fn config(&self) -> &MasterConfig {
        &self.config
    }

    /// The environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Send `STC_register` with the slave's uuid, its operating mode and our
    /// protocol version.
    pub fn stc_register(&mut self, id: SlaveId) -> Result<u32, MasterError> {
        let description = &self.slave(id)?.description;
        let (uuid, op_mode) = (description.uuid, description.op_mode);
        self.command(id, PduType::Register, |Command { receiver, seq }| {
            Pdu::Register(Register {
                receiver,
                seq,
                slave_uuid: uuid,
                major_version: PROTOCOL_VERSION_MAJOR,
                minor_version: PROTOCOL_VERSION_MINOR,
                op_mode,
            })
        })
    }

    /// Send `STC_deregister`. The descriptor is removed once acknowledged.
    pub fn stc_deregister(&mut self, id: SlaveId) -> Result<u32, MasterError> {
        self.command(id, PduType::Deregister, Pdu::Deregister)
    }

    /// Send `STC_configure`.
    pub fn stc_configure(
        &mut self,
        id: SlaveId,
        configuration: Configuration,
    ) -> Result<u32, MasterError> {
        self.command(id, PduType::Configure, |Command { receiver, seq }| {
            Pdu::Configure(Configure { receiver, seq, configuration })
        })
    }

    /// Send `STC_initialize`.
    pub fn stc_initialize(&mut self, id: SlaveId) -> Result<u32, MasterError> {
        self.command(id, PduType::Initialize, Pdu::Initialize)
    }

    /// Send `STC_prepare`.
    pub fn stc_prepare(&mut self, id: SlaveId) -> Result<u32, MasterError> {
        self.command(id, PduType::Prepare, Pdu::Prepare)
    }

    /// Send `STC_run` starting at simulation time `start_time`.
    pub fn stc_run(&mut self, id: SlaveId, start_time: f64) -> Result<u32, MasterError> {
        self.command(id, PduType::Run, |Command { receiver, seq }| {
            Pdu::Run(Run { receiver, seq, start_time })
        })
    }

    /// Send `STC_do_step`. Uses the step timeout.
    pub fn stc_do_step(&mut self, id: SlaveId, step_size: f64) -> Result<u32, MasterError> {
        self.command(id, PduType::DoStep, |Command { receiver, seq }| {
            Pdu::DoStep(DoStep { receiver, seq, step_size })
        })
    }

    /// Send `STC_send_outputs`.
    pub fn stc_send_outputs(&mut self, id: SlaveId) -> Result<u32, MasterError> {
        self.command(id, PduType::SendOutputs, Pdu::SendOutputs)
    }

    /// Send `STC_stop`.
    pub fn stc_stop(&mut self, id: SlaveId) -> Result<u32, MasterError> {
        self.command(id, PduType::Stop, Pdu::Stop)
    }

    /// Send `STC_reset`.
    pub fn stc_reset(&mut self, id: SlaveId) -> Result<u32, MasterError> {
        self.command(id, PduType::Reset, Pdu::Reset)
    }

    /// Send `CFG_set_time_res`.
    pub fn cfg_set_time_resolution(
        &mut self,
        id: SlaveId,
        numerator: u32,
        denominator: u32,
    ) -> Result<u32, MasterError> {
        self.command(id, PduType::SetTimeResolution, |Command { receiver, seq }| {
            Pdu::SetTimeResolution(SetTimeResolution { receiver, seq, numerator, denominator })
        })
    }

    /// Send `CFG_set_steps`: stream `data_id` is exchanged every `steps`
    /// base steps.
    pub fn cfg_set_steps(
        &mut self,
        id: SlaveId,
        data_id: u16,
        steps: u32,
    ) -> Result<u32, MasterError> {
        self.command(id, PduType::SetSteps, |Command { receiver, seq }| {
            Pdu::SetSteps(SetSteps { receiver, seq, data_id, steps })
        })
    }

    /// Send `CFG_set_scope`.
    pub fn cfg_set_scope(
        &mut self,
        id: SlaveId,
        data_id: u16,
        scope: Scope,
    ) -> Result<u32, MasterError> {
        self.command(id, PduType::SetScope, |Command { receiver, seq }| {
            Pdu::SetScope(SetScope { receiver, seq, data_id, scope })
        })
    }

    /// Send `CFG_set_parameter`.
    pub fn cfg_set_parameter(
        &mut self,
        id: SlaveId,
        parameter: NamedValue,
    ) -> Result<u32, MasterError> {
        self.command(id, PduType::SetParameter, |Command { receiver, seq }| {
            Pdu::SetParameter(SetParameter { receiver, seq, parameter })
        })
    }

    /// Send `CFG_config_clear`.
    pub fn cfg_clear(&mut self, id: SlaveId) -> Result<u32, MasterError> {
        self.command(id, PduType::ClearConfiguration, Pdu::ClearConfiguration)
    }

    /// Send `CFG_set_logging`. Category 0 addresses every category.
    pub fn cfg_set_logging(
        &mut self,
        id: SlaveId,
        category: u8,
        level: LogLevel,
        mode: LogMode,
    ) -> Result<u32, MasterError> {
        self.command(id, PduType::SetLogging, |Command { receiver, seq }| {
            Pdu::SetLogging(SetLogging { receiver, seq, category, level, mode })
        })
    }

    /// Send `INF_state`. The reply resynchronizes the descriptor.
    pub fn inf_state(&mut self, id: SlaveId) -> Result<u32, MasterError> {
        self.command(id, PduType::QueryState, Pdu::QueryState)
    }

    /// Send `INF_error`. The reply goes to the error-report listener.
    pub fn inf_error(&mut self, id: SlaveId) -> Result<u32, MasterError> {
        self.command(id, PduType::QueryError, Pdu::QueryError)
    }

    /// Send `INF_log` for up to `max_entries` buffered entries of `category`.
    pub fn inf_log(
        &mut self,
        id: SlaveId,
        category: u8,
        max_entries: u8,
    ) -> Result<u32, MasterError> {
        self.command(id, PduType::QueryLog, |Command { receiver, seq }| {
            Pdu::QueryLog(QueryLog { receiver, seq, category, max_entries })
        })
    }

    /// Send `DAT_input_output` carrying inputs for `step`.
    ///
    /// Data is not acknowledged and does not occupy the command slot.
    pub fn send_inputs(
        &mut self,
        id: SlaveId,
        step: u32,
        values: Vec<NamedValue>,
    ) -> Result<(), MasterError> {
        self.data_allowed(id)?;
        let bytes = Pdu::InputOutput(InputOutput { slave_id: id, step, values }).to_bytes()?;
        self.transport.send(Endpoint::Slave(id), bytes)?;
        Ok(())
    }

    /// Send `DAT_parameter`. Returns the parameter sequence number used.
    pub fn send_parameters(
        &mut self,
        id: SlaveId,
        values: Vec<NamedValue>,
    ) -> Result<u32, MasterError> {
        self.data_allowed(id)?;
        let seq = self.slave(id)?.param_seq;
        let bytes = Pdu::Parameter(Parameters { slave_id: id, seq, values }).to_bytes()?;
        self.transport.send(Endpoint::Slave(id), bytes)?;

        self.slave_mut(id)?.take_param_seq();
        Ok(seq)
    }

    /// Process one received buffer.
    ///
    /// Malformed buffers and PDUs from unknown slaves are logged and dropped.
    pub fn on_receive(&mut self, bytes: &[u8]) {
        match Pdu::decode(bytes) {
            Ok(pdu) => self.handle_pdu(pdu),
            Err(e) if e.is_unsupported() => debug!(error = %e, "skipping unsupported PDU"),
            Err(e) => warn!(error = %e, "dropping malformed PDU"),
        }
    }

    /// Process one decoded PDU.
    pub fn handle_pdu(&mut self, pdu: Pdu) {
        let (id, channel, seq) = match &pdu {
            Pdu::InputOutput(p) => (p.slave_id, Channel::InputOutput, p.step),
            Pdu::Parameter(p) => (p.slave_id, Channel::Parameter, p.seq),
            other => match other.slave_origin() {
                Some((id, seq)) => (id, Channel::Control, seq),
                None => {
                    debug!(pdu = %other.pdu_type(), "ignoring slave-bound PDU");
                    return;
                },
            },
        };

        let Some(slave) = self.slaves.get_mut(&id) else {
            debug!(slave_id = id, pdu = %pdu.pdu_type(), "dropping PDU from unknown slave");
            return;
        };

        match slave.detector.observe(channel, seq) {
            Observation::Stale { last_seen, actual } => {
                debug!(slave_id = id, %channel, last_seen, actual, "dropping stale PDU");
                return;
            },
            Observation::Gap { expected, actual } => {
                if self.report_missed(id, MissedPdu::Gap { channel, expected, actual }) {
                    return;
                }
            },
            Observation::First | Observation::InOrder => {},
        }

        match pdu {
            Pdu::Ack(ack) => self.on_ack(id, &ack),
            Pdu::Nack(nack) => self.on_nack(id, nack),
            Pdu::StateAck(reply) => {
                if self.take_pending(id, reply.resp_seq, PduType::QueryState).is_some() {
                    self.set_state(id, reply.state);
                }
            },
            Pdu::ErrorAck(reply) => {
                if self.take_pending(id, reply.resp_seq, PduType::QueryError).is_some()
                    && let Some(f) = self.listeners.error_report.as_mut()
                {
                    f(id, reply.code);
                }
            },
            Pdu::LogAck(reply) => {
                if self.take_pending(id, reply.resp_seq, PduType::QueryLog).is_some()
                    && let Some(f) = self.listeners.log_ack.as_mut()
                {
                    f(id, &reply.entries);
                }
            },
            Pdu::StateChanged(notification) => {
                let old = self.set_state(id, notification.state);
                if notification.state == ProtocolState::Error && old != Some(ProtocolState::Error) {
                    let reason = FailureReason::Reported;
                    self.listeners.error(&SlaveFailure { slave_id: id, command: None, reason });
                }
            },
            Pdu::Log(notification) => {
                if let Some(f) = self.listeners.log_notification.as_mut() {
                    f(id, slice::from_ref(&notification.entry));
                }
            },
            Pdu::StepFinished(notification) => {
                if let Some(slave) = self.slaves.get_mut(&id) {
                    slave.last_step = Some(notification.step);
                }
                if let Some(f) = self.listeners.step_finished.as_mut() {
                    f(id, notification.step);
                }
            },
            Pdu::InputOutput(data) => {
                self.deliver_data(DataReceived {
                    slave_id: id,
                    channel,
                    sequence: data.step,
                    values: data.values,
                });
            },
            Pdu::Parameter(data) => {
                self.deliver_data(DataReceived {
                    slave_id: id,
                    channel,
                    sequence: data.seq,
                    values: data.values,
                });
            },
            _ => {},
        }
    }

    /// Fail every pending command whose deadline has passed.
    ///
    /// Returns the number of commands that timed out.
    pub fn tick(&mut self) -> usize {
        let now = self.env.now();
        let expired: Vec<_> = self
            .slaves
            .iter_mut()
            .filter_map(|(&id, slave)| {
                let pending = slave.pending.filter(|p| now >= p.deadline)?;
                slave.pending = None;
                Some((id, pending))
            })
            .collect();

        for (id, pending) in &expired {
            warn!(
                slave_id = id,
                command = %pending.command,
                seq = pending.seq,
                timeout = ?pending.timeout,
                "command timed out"
            );
            let reason = FailureReason::Timeout { after: pending.timeout };
            self.fail(*id, Some(pending.command), reason);
        }
        expired.len()
    }

    fn command<F>(&mut self, id: SlaveId, command: PduType, build: F) -> Result<u32, MasterError>
    where
        F: FnOnce(Command) -> Pdu,
    {
        let timeout = self.timeout_for(command);
        let deadline = self.env.now() + timeout;

        let slave = self.slaves.get_mut(&id).ok_or(MasterError::UnknownSlave { slave_id: id })?;
        if let Some(pending) = slave.pending {
            return Err(MasterError::CommandInProgress { slave_id: id, pending: pending.command });
        }
        let target = lifecycle::target(slave.state, command).ok_or(
            MasterError::InvalidStateTransition { slave_id: id, command, state: slave.state },
        )?;

        let seq = slave.next_seq;
        let bytes = build(Command::new(id, seq)).to_bytes()?;
        self.transport.send(Endpoint::Slave(id), bytes)?;

        slave.take_seq();
        slave.pending = Some(PendingCommand { command, seq, target, deadline, timeout });
        debug!(slave_id = id, %command, seq, "command sent");
        Ok(seq)
    }

    fn timeout_for(&self, command: PduType) -> Duration {
        if command == PduType::DoStep {
            self.config.step_timeout
        } else {
            self.config.command_timeout
        }
    }

    fn on_ack(&mut self, id: SlaveId, ack: &Ack) {
        let Some(pending) = self.take_pending(id, ack.resp_seq, ack.command) else {
            return;
        };

        match ack.command {
            PduType::Deregister => {
                if let Some(slave) = self.slaves.remove(&id) {
                    info!(slave_id = id, old = %slave.state, "slave deregistered");
                    self.listeners.state_changed(id, slave.state, ProtocolState::Idle);
                }
                return;
            },
            PduType::Initialize | PduType::Reset => {
                if let Some(slave) = self.slaves.get_mut(&id) {
                    slave.detector.reset(Channel::InputOutput);
                    slave.detector.reset(Channel::Parameter);
                    slave.last_step = None;
                }
            },
            _ => {},
        }

        self.set_state(id, pending.target);
    }

    fn on_nack(&mut self, id: SlaveId, nack: Nack) {
        if self.take_pending(id, nack.resp_seq, nack.command).is_none() {
            return;
        }

        warn!(
            slave_id = id,
            command = %nack.command,
            code = %nack.code,
            detail = %nack.detail,
            "command rejected"
        );
        let reason = FailureReason::Nack { code: nack.code, detail: nack.detail };
        self.fail(id, Some(nack.command), reason);
    }

    /// Remove the pending command if the response answers it.
    fn take_pending(
        &mut self,
        id: SlaveId,
        resp_seq: u32,
        command: PduType,
    ) -> Option<PendingCommand<E::Instant>> {
        let slave = self.slaves.get_mut(&id)?;
        match slave.pending {
            Some(p) if p.seq == resp_seq && p.command == command => slave.pending.take(),
            _ => {
                debug!(slave_id = id, %command, resp_seq, "dropping unmatched response");
                None
            },
        }
    }

    /// Returns the previous state, or `None` for an unknown slave.
    fn set_state(&mut self, id: SlaveId, new: ProtocolState) -> Option<ProtocolState> {
        let slave = self.slaves.get_mut(&id)?;
        let old = slave.state;
        if old != new {
            slave.state = new;
            info!(slave_id = id, %old, %new, "slave state changed");
            self.listeners.state_changed(id, old, new);
        }
        Some(old)
    }

    fn fail(&mut self, id: SlaveId, command: Option<PduType>, reason: FailureReason) {
        if let Some(slave) = self.slaves.get_mut(&id) {
            slave.pending = None;
        }
        self.set_state(id, ProtocolState::Error);
        self.listeners.error(&SlaveFailure { slave_id: id, command, reason });
    }

    /// Returns true if the miss was fatal.
    fn report_missed(&mut self, id: SlaveId, missed: MissedPdu) -> bool {
        warn!(slave_id = id, ?missed, "missed PDU");
        self.listeners.missed(id, missed);

        if !self.config.fatal_missed_pdus.is_fatal(missed.channel()) {
            return false;
        }
        self.fail(id, None, FailureReason::MissedPdu);
        true
    }

    fn deliver_data(&mut self, data: DataReceived) {
        if let Some(f) = self.listeners.data.as_mut() {
            f(&data);
        }
    }

    fn data_allowed(&self, id: SlaveId) -> Result<(), MasterError> {
        let state = self.slave(id)?.state;
        if state.accepts_data() {
            Ok(())
        } else {
            Err(MasterError::DataNotAllowed { slave_id: id, state })
        }
    }

    fn slave(&self, id: SlaveId) -> Result<&SlaveDescriptor<E::Instant>, MasterError> {
        self.slaves.get(&id).ok_or(MasterError::UnknownSlave { slave_id: id })
    }

    fn slave_mut(&mut self, id: SlaveId) -> Result<&mut SlaveDescriptor<E::Instant>, MasterError> {
        self.slaves.get_mut(&id).ok_or(MasterError::UnknownSlave { slave_id: id })
    }
}

impl<E: Environment, T> std::fmt::Debug for Master<E, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Master")
            .field("slaves", &self.slaves.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
