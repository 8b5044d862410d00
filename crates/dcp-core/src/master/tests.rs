use std::{
    cell::Cell,
    future::{Future, ready},
    rc::Rc,
    sync::{Arc, Mutex},
};

use dcp_proto::{
    ErrorCode, INPUT_DATA_ID, LogEntry, OpMode, Value,
    payloads::{ErrorAck, LogAck, LogNotification, StateAck, StateChanged, StepFinished},
};

use super::*;
use crate::{config::MissedPduPolicy, transport::RecordingTransport};

const ID: SlaveId = 1;
const UUID: u128 = 0xC0FFEE;

#[derive(Debug, Clone, Default)]
struct ManualEnv {
    now: Rc<Cell<Duration>>,
}

impl ManualEnv {
    fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Environment for ManualEnv {
    type Instant = Duration;

    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        self.advance(duration);
        ready(())
    }
}

#[derive(Debug, Default)]
struct Events {
    transitions: Vec<(SlaveId, ProtocolState, ProtocolState)>,
    failures: Vec<SlaveFailure>,
    data: Vec<DataReceived>,
    missed: Vec<(SlaveId, MissedPdu)>,
    steps: Vec<(SlaveId, u32)>,
    logs: Vec<(SlaveId, Vec<LogEntry>)>,
    error_codes: Vec<(SlaveId, ErrorCode)>,
}

struct Harness {
    env: ManualEnv,
    master: Master<ManualEnv, RecordingTransport>,
    events: Arc<Mutex<Events>>,
    slave_seq: u32,
}

impl Harness {
    fn new(config: MasterConfig) -> Self {
        let env = ManualEnv::default();
        let events = Arc::new(Mutex::new(Events::default()));
        let (e1, e2, e3, e4, e5, e6, e7, e8) = (
            Arc::clone(&events),
            Arc::clone(&events),
            Arc::clone(&events),
            Arc::clone(&events),
            Arc::clone(&events),
            Arc::clone(&events),
            Arc::clone(&events),
            Arc::clone(&events),
        );
        let listeners = MasterListeners::new()
            .on_state_changed(move |id, old, new| {
                e1.lock().unwrap().transitions.push((id, old, new));
            })
            .on_error(move |f| e2.lock().unwrap().failures.push(f.clone()))
            .on_data(move |d| e3.lock().unwrap().data.push(d.clone()))
            .on_missed_input_output(move |id, m| e4.lock().unwrap().missed.push((id, m)))
            .on_missed_control(move |id, m| e5.lock().unwrap().missed.push((id, m)))
            .on_step_finished(move |id, step| e6.lock().unwrap().steps.push((id, step)))
            .on_log_notification(move |id, entries| {
                e7.lock().unwrap().logs.push((id, entries.to_vec()));
            })
            .on_error_report(move |id, code| e8.lock().unwrap().error_codes.push((id, code)));

        let mut master = Master::new(env.clone(), config, listeners, RecordingTransport::new());
        master.register_slave(SlaveDescription::new(ID, UUID, "plant")).unwrap();
        Self { env, master, events, slave_seq: 0 }
    }

    fn default_master() -> Self {
        Self::new(MasterConfig::default())
    }

    fn sent(&mut self) -> Vec<Pdu> {
        self.master
            .transport_mut()
            .take()
            .into_iter()
            .map(|(to, bytes)| {
                assert_eq!(to, Endpoint::Slave(ID));
                Pdu::decode(&bytes).unwrap()
            })
            .collect()
    }

    fn slave_seq(&mut self) -> u32 {
        let seq = self.slave_seq;
        self.slave_seq += 1;
        seq
    }

    fn reply(&mut self, pdu: &Pdu) {
        let bytes = pdu.to_bytes().unwrap();
        self.master.on_receive(&bytes);
    }

    fn ack(&mut self, resp_seq: u32, command: PduType) {
        let seq = self.slave_seq();
        self.reply(&Pdu::Ack(Ack { sender: ID, seq, resp_seq, command }));
    }

    fn nack(&mut self, resp_seq: u32, command: PduType, code: ErrorCode) {
        let seq = self.slave_seq();
        let detail = String::from("rejected");
        self.reply(&Pdu::Nack(Nack { sender: ID, seq, resp_seq, command, code, detail }));
    }

    /// Issue a command and acknowledge it.
    fn complete(
        &mut self,
        issue: impl FnOnce(&mut Master<ManualEnv, RecordingTransport>) -> Result<u32, MasterError>,
    ) {
        let seq = issue(&mut self.master).unwrap();
        let command = self.master.pending_command(ID).unwrap();
        self.ack(seq, command);
        assert_eq!(self.master.pending_command(ID), None);
    }

    fn to_running(&mut self) {
        self.complete(|m| m.stc_register(ID));
        self.complete(|m| m.stc_configure(ID, Configuration::default()));
        self.complete(|m| m.stc_initialize(ID));
        self.complete(|m| m.stc_prepare(ID));
        self.complete(|m| m.stc_run(ID, 0.0));
        assert_eq!(self.master.slave_state(ID), Some(ProtocolState::Running));
        self.sent();
    }

    fn events(&self) -> std::sync::MutexGuard<'_, Events> {
        self.events.lock().unwrap()
    }
}

#[test]
fn duplicate_registration_is_rejected() {
    let mut h = Harness::default_master();
    let err = h.master.register_slave(SlaveDescription::new(ID, 7, "again")).unwrap_err();
    assert_eq!(err, MasterError::SlaveAlreadyRegistered { slave_id: ID });
}

#[test]
fn unknown_slave_is_rejected() {
    let mut h = Harness::default_master();
    assert_eq!(h.master.stc_register(9), Err(MasterError::UnknownSlave { slave_id: 9 }));
    assert!(h.sent().is_empty());
}

#[test]
fn invalid_transition_sends_nothing() {
    let mut h = Harness::default_master();

    let err = h.master.stc_initialize(ID).unwrap_err();

    assert_eq!(err, MasterError::InvalidStateTransition {
        slave_id: ID,
        command: PduType::Initialize,
        state: ProtocolState::Idle,
    });
    assert!(h.sent().is_empty());
    assert_eq!(h.master.pending_command(ID), None);
}

#[test]
fn register_carries_uuid_and_version() {
    let mut h = Harness::default_master();

    let seq = h.master.stc_register(ID).unwrap();

    let sent = h.sent();
    let [Pdu::Register(register)] = sent.as_slice() else {
        panic!("unexpected {sent:?}");
    };
    assert_eq!(register.seq, seq);
    assert_eq!(register.receiver, ID);
    assert_eq!(register.slave_uuid, UUID);
    assert_eq!(register.major_version, PROTOCOL_VERSION_MAJOR);
    assert_eq!(register.op_mode, OpMode::NonRealTime);
    assert_eq!(h.master.pending_command(ID), Some(PduType::Register));
}

#[test]
fn register_carries_described_op_mode() {
    let mut h = Harness::default_master();
    let description = SlaveDescription::new(2, 0xBEEF, "rig").with_op_mode(OpMode::SoftRealTime);
    h.master.register_slave(description).unwrap();

    h.master.stc_register(2).unwrap();

    let sent = h.master.transport_mut().take();
    let [(Endpoint::Slave(2), bytes)] = sent.as_slice() else {
        panic!("unexpected {sent:?}");
    };
    let Ok(Pdu::Register(register)) = Pdu::decode(bytes) else {
        panic!("expected STC_register");
    };
    assert_eq!(register.op_mode, OpMode::SoftRealTime);
}

#[test]
fn data_settings_are_sent_while_registered() {
    let mut h = Harness::default_master();
    h.complete(|m| m.stc_register(ID));
    h.sent();

    h.complete(|m| m.cfg_set_steps(ID, INPUT_DATA_ID, 4));
    h.complete(|m| m.cfg_set_scope(ID, INPUT_DATA_ID, Scope::RunNonRealTime));
    h.complete(|m| m.cfg_set_parameter(ID, NamedValue::new("gain", Value::Float64(2.0))));

    let sent = h.sent();
    let [Pdu::SetSteps(steps), Pdu::SetScope(scope), Pdu::SetParameter(parameter)] =
        sent.as_slice()
    else {
        panic!("unexpected {sent:?}");
    };
    assert_eq!((steps.data_id, steps.steps), (INPUT_DATA_ID, 4));
    assert_eq!(scope.scope, Scope::RunNonRealTime);
    assert_eq!(parameter.parameter.name, "gain");
    assert_eq!(h.master.slave_state(ID), Some(ProtocolState::Registered));
}

#[test]
fn data_settings_after_configure_are_rejected_locally() {
    let mut h = Harness::default_master();
    h.complete(|m| m.stc_register(ID));
    h.complete(|m| m.stc_configure(ID, Configuration::default()));
    h.sent();

    let err = h.master.cfg_set_steps(ID, INPUT_DATA_ID, 2).unwrap_err();

    assert_eq!(err, MasterError::InvalidStateTransition {
        slave_id: ID,
        command: PduType::SetSteps,
        state: ProtocolState::Configured,
    });
    assert!(h.sent().is_empty());
}

#[test]
fn second_command_while_pending_is_rejected() {
    let mut h = Harness::default_master();
    h.master.stc_register(ID).unwrap();
    h.sent();

    let err = h.master.inf_state(ID).unwrap_err();

    assert_eq!(err, MasterError::CommandInProgress { slave_id: ID, pending: PduType::Register });
    assert!(h.sent().is_empty());
}

#[test]
fn ack_applies_target_state() {
    let mut h = Harness::default_master();
    h.complete(|m| m.stc_register(ID));
    h.complete(|m| m.stc_configure(ID, Configuration::default()));

    assert_eq!(h.master.slave_state(ID), Some(ProtocolState::Configured));
    assert_eq!(h.events().transitions, [
        (ID, ProtocolState::Idle, ProtocolState::Registered),
        (ID, ProtocolState::Registered, ProtocolState::Configured),
    ]);
}

#[test]
fn unmatched_ack_is_ignored() {
    let mut h = Harness::default_master();
    let seq = h.master.stc_register(ID).unwrap();

    h.ack(seq + 1, PduType::Register);
    h.ack(seq, PduType::Configure);

    assert_eq!(h.master.pending_command(ID), Some(PduType::Register));
    assert_eq!(h.master.slave_state(ID), Some(ProtocolState::Idle));
}

#[test]
fn nack_moves_descriptor_to_error() {
    let mut h = Harness::default_master();
    h.to_running();

    let seq = h.master.stc_do_step(ID, 0.01).unwrap();
    h.nack(seq, PduType::DoStep, ErrorCode::CallbackFailure);

    assert_eq!(h.master.slave_state(ID), Some(ProtocolState::Error));
    assert_eq!(h.events().failures, [SlaveFailure {
        slave_id: ID,
        command: Some(PduType::DoStep),
        reason: FailureReason::Nack { code: ErrorCode::CallbackFailure, detail: "rejected".into() },
    }]);
}

#[test]
fn timeout_moves_descriptor_to_error() {
    let mut h = Harness::default_master();
    h.master.stc_register(ID).unwrap();

    h.env.advance(Duration::from_millis(999));
    assert_eq!(h.master.tick(), 0);

    h.env.advance(Duration::from_millis(1));
    assert_eq!(h.master.tick(), 1);

    assert_eq!(h.master.slave_state(ID), Some(ProtocolState::Error));
    assert_eq!(h.master.pending_command(ID), None);
    assert_eq!(h.events().failures[0].reason, FailureReason::Timeout {
        after: Duration::from_secs(1)
    });
}

#[test]
fn do_step_uses_step_timeout() {
    let mut h = Harness::default_master();
    h.to_running();

    h.master.stc_do_step(ID, 0.1).unwrap();
    h.env.advance(Duration::from_secs(2));
    assert_eq!(h.master.tick(), 0);

    h.env.advance(Duration::from_secs(3));
    assert_eq!(h.master.tick(), 1);
}

#[test]
fn late_ack_after_timeout_is_dropped() {
    let mut h = Harness::default_master();
    let seq = h.master.stc_register(ID).unwrap();
    h.env.advance(Duration::from_secs(5));
    h.master.tick();

    h.ack(seq, PduType::Register);

    assert_eq!(h.master.slave_state(ID), Some(ProtocolState::Error));
}

#[test]
fn state_ack_resynchronizes() {
    let mut h = Harness::default_master();
    let seq = h.master.stc_register(ID).unwrap();
    h.env.advance(Duration::from_secs(5));
    h.master.tick();

    let query = h.master.inf_state(ID).unwrap();
    let seq_out = h.slave_seq();
    h.reply(&Pdu::StateAck(StateAck {
        sender: ID,
        seq: seq_out,
        resp_seq: query,
        state: ProtocolState::Registered,
    }));

    assert_ne!(seq, query);
    assert_eq!(h.master.slave_state(ID), Some(ProtocolState::Registered));
}

#[test]
fn error_ack_is_reported() {
    let mut h = Harness::default_master();
    h.complete(|m| m.stc_register(ID));

    let query = h.master.inf_error(ID).unwrap();
    let seq = h.slave_seq();
    let code = ErrorCode::PduMissed;
    h.reply(&Pdu::ErrorAck(ErrorAck { sender: ID, seq, resp_seq: query, code }));

    assert_eq!(h.events().error_codes, [(ID, ErrorCode::PduMissed)]);
    assert_eq!(h.master.pending_command(ID), None);
}

#[test]
fn log_ack_reaches_listener() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&received);
    let listeners = MasterListeners::new()
        .on_log_ack(move |id, e| captured.lock().unwrap().push((id, e.len())));
    let transport = RecordingTransport::new();
    let mut master =
        Master::new(ManualEnv::default(), MasterConfig::default(), listeners, transport);
    master.register_slave(SlaveDescription::new(ID, UUID, "plant")).unwrap();

    let register = master.stc_register(ID).unwrap();
    let command = PduType::Register;
    master.handle_pdu(Pdu::Ack(Ack { sender: ID, seq: 0, resp_seq: register, command }));
    let query = master.inf_log(ID, 0, 8).unwrap();
    let entry =
        LogEntry { level: LogLevel::Error, category: 1, timestamp: 0.0, message: "x".into() };
    let entries = vec![entry];
    master.handle_pdu(Pdu::LogAck(LogAck { sender: ID, seq: 1, resp_seq: query, entries }));

    assert_eq!(*received.lock().unwrap(), [(ID, 1)]);
}

#[test]
fn reported_error_fires_error_listener_once() {
    let mut h = Harness::default_master();
    h.to_running();

    for _ in 0..2 {
        let seq = h.slave_seq();
        h.reply(&Pdu::StateChanged(StateChanged { sender: ID, seq, state: ProtocolState::Error }));
    }

    assert_eq!(h.master.slave_state(ID), Some(ProtocolState::Error));
    assert_eq!(h.events().failures, [SlaveFailure {
        slave_id: ID,
        command: None,
        reason: FailureReason::Reported
    }]);
}

#[test]
fn deregister_ack_removes_descriptor() {
    let mut h = Harness::default_master();
    h.complete(|m| m.stc_register(ID));

    let seq = h.master.stc_deregister(ID).unwrap();
    h.ack(seq, PduType::Deregister);

    assert_eq!(h.master.slave_ids().count(), 0);
    let last = h.events().transitions.last().copied();
    assert_eq!(last, Some((ID, ProtocolState::Registered, ProtocolState::Idle)));
}

#[test]
fn data_requires_stepping_state() {
    let mut h = Harness::default_master();
    h.complete(|m| m.stc_register(ID));
    h.sent();

    let err = h.master.send_inputs(ID, 0, vec![]).unwrap_err();
    assert_eq!(err, MasterError::DataNotAllowed { slave_id: ID, state: ProtocolState::Registered });
    assert!(h.sent().is_empty());
}

#[test]
fn inputs_and_parameters_are_sent() {
    let mut h = Harness::default_master();
    h.to_running();

    h.master.send_inputs(ID, 4, vec![NamedValue::new("u", Value::Float64(1.5))]).unwrap();
    let first = h.master.send_parameters(ID, vec![NamedValue::new("k", Value::Uint16(2))]).unwrap();
    let second = h.master.send_parameters(ID, vec![]).unwrap();

    assert_eq!((first, second), (0, 1));
    let sent = h.sent();
    assert!(matches!(&sent[0], Pdu::InputOutput(d) if d.step == 4 && d.slave_id == ID));
    assert!(matches!(&sent[1], Pdu::Parameter(d) if d.seq == 0));
}

#[test]
fn outputs_reach_data_listener_and_stale_outputs_are_dropped() {
    let mut h = Harness::default_master();
    h.to_running();

    let values = vec![NamedValue::new("y", Value::Int16(-3))];
    for _ in 0..2 {
        h.reply(&Pdu::InputOutput(InputOutput { slave_id: ID, step: 2, values: values.clone() }));
    }

    assert_eq!(h.events().data, [DataReceived {
        slave_id: ID,
        channel: Channel::InputOutput,
        sequence: 2,
        values,
    }]);
}

#[test]
fn output_gap_is_reported() {
    let mut h = Harness::default_master();
    h.to_running();

    h.reply(&Pdu::InputOutput(InputOutput { slave_id: ID, step: 3, values: vec![] }));
    h.reply(&Pdu::InputOutput(InputOutput { slave_id: ID, step: 5, values: vec![] }));

    assert_eq!(h.events().missed, [(ID, MissedPdu::Gap {
        channel: Channel::InputOutput,
        expected: 4,
        actual: 5
    })]);
    assert_eq!(h.events().data.len(), 2);
    assert_eq!(h.master.slave_state(ID), Some(ProtocolState::Running));
}

#[test]
fn fatal_control_gap_fails_slave() {
    let mut h = Harness::new(MasterConfig {
        fatal_missed_pdus: MissedPduPolicy::CONTROL,
        ..MasterConfig::default()
    });
    let seq = h.master.stc_register(ID).unwrap();

    h.reply(&Pdu::Ack(Ack { sender: ID, seq: 0, resp_seq: 99, command: PduType::QueryState }));
    h.reply(&Pdu::Ack(Ack { sender: ID, seq: 4, resp_seq: seq, command: PduType::Register }));

    assert_eq!(h.master.slave_state(ID), Some(ProtocolState::Error));
    assert_eq!(h.master.pending_command(ID), None);
    assert_eq!(h.events().failures[0].reason, FailureReason::MissedPdu);
}

#[test]
fn step_finished_is_recorded() {
    let mut h = Harness::default_master();
    h.to_running();

    let seq = h.master.stc_do_step(ID, 0.1).unwrap();
    h.ack(seq, PduType::DoStep);
    let out = h.slave_seq();
    h.reply(&Pdu::StepFinished(StepFinished { sender: ID, seq: out, step: 1 }));

    assert_eq!(h.master.descriptor(ID).and_then(SlaveDescriptor::last_step), Some(1));
    assert_eq!(h.events().steps, [(ID, 1)]);
}

#[test]
fn log_notification_reaches_listener() {
    let mut h = Harness::default_master();
    h.complete(|m| m.stc_register(ID));

    let seq = h.slave_seq();
    let entry =
        LogEntry { level: LogLevel::Warning, category: 2, timestamp: 1.0, message: "hot".into() };
    h.reply(&Pdu::Log(LogNotification { sender: ID, seq, entry: entry.clone() }));

    assert_eq!(h.events().logs, [(ID, vec![entry])]);
}

#[test]
fn encode_failure_leaves_descriptor_untouched() {
    let mut h = Harness::default_master();
    h.complete(|m| m.stc_register(ID));
    h.sent();

    let configuration = Configuration {
        inputs: vec!["x".repeat(usize::from(u16::MAX) + 1)],
        ..Configuration::default()
    };
    let err = h.master.stc_configure(ID, configuration).unwrap_err();

    assert!(matches!(err, MasterError::Encode(_)));
    assert!(h.sent().is_empty());
    assert_eq!(h.master.pending_command(ID), None);

    let seq = h.master.stc_configure(ID, Configuration::default()).unwrap();
    assert_eq!(seq, 1);
}

#[test]
fn malformed_and_foreign_pdus_are_dropped() {
    let mut h = Harness::default_master();
    h.master.stc_register(ID).unwrap();

    h.master.on_receive(&[0xB0, 0x02, 0x00]);
    h.reply(&Pdu::Ack(Ack { sender: 42, seq: 0, resp_seq: 0, command: PduType::Register }));
    h.reply(&Pdu::Initialize(Command::new(ID, 0)));

    assert_eq!(h.master.pending_command(ID), Some(PduType::Register));
}

mod properties {
    use proptest::prelude::*;

    use super::*;

    #[derive(Debug, Clone, Copy)]
    enum Op {
        Register,
        Configure,
        Initialize,
        Prepare,
        Run,
        Step,
        Stop,
        Reset,
        Deregister,
        QueryState,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Register),
            Just(Op::Configure),
            Just(Op::Initialize),
            Just(Op::Prepare),
            Just(Op::Run),
            Just(Op::Step),
            Just(Op::Stop),
            Just(Op::Reset),
            Just(Op::Deregister),
            Just(Op::QueryState),
        ]
    }

    fn issue(
        master: &mut Master<ManualEnv, RecordingTransport>,
        op: Op,
    ) -> Result<u32, MasterError> {
        match op {
            Op::Register => master.stc_register(ID),
            Op::Configure => master.stc_configure(ID, Configuration::default()),
            Op::Initialize => master.stc_initialize(ID),
            Op::Prepare => master.stc_prepare(ID),
            Op::Run => master.stc_run(ID, 0.0),
            Op::Step => master.stc_do_step(ID, 0.1),
            Op::Stop => master.stc_stop(ID),
            Op::Reset => master.stc_reset(ID),
            Op::Deregister => master.stc_deregister(ID),
            Op::QueryState => master.inf_state(ID),
        }
    }

    proptest! {
        #[test]
        fn prop_local_rejections_send_nothing(
            ops in prop::collection::vec((op(), any::<bool>()), 1..40)
        ) {
            let mut h = Harness::default_master();

            for (op, answer) in ops {
                if h.master.descriptor(ID).is_none() {
                    break;
                }
                let before = h.master.slave_state(ID);
                let pending = h.master.pending_command(ID);

                match issue(&mut h.master, op) {
                    Ok(seq) => {
                        prop_assert_eq!(pending, None);
                        prop_assert_eq!(h.sent().len(), 1);
                        if answer {
                            let command = h.master.pending_command(ID).unwrap();
                            if command == PduType::QueryState {
                                let out = h.slave_seq();
                                let state = before.unwrap();
                                let reply = StateAck { sender: ID, seq: out, resp_seq: seq, state };
                                h.reply(&Pdu::StateAck(reply));
                            } else {
                                h.ack(seq, command);
                            }
                        }
                    },
                    Err(e) => {
                        prop_assert!(e.is_misuse());
                        prop_assert!(h.sent().is_empty());
                        prop_assert_eq!(h.master.slave_state(ID), before);
                        prop_assert_eq!(h.master.pending_command(ID), pending);
                    },
                }
            }
        }

        #[test]
        fn prop_sequence_numbers_increase(count in 1usize..20) {
            let mut h = Harness::default_master();
            h.complete(|m| m.stc_register(ID));

            let mut last = None;
            for _ in 0..count {
                let seq = h.master.inf_state(ID).unwrap();
                if let Some(prev) = last {
                    prop_assert_eq!(seq, prev + 1);
                }
                last = Some(seq);
                let out = h.slave_seq();
                h.reply(&Pdu::StateAck(StateAck {
                    sender: ID,
                    seq: out,
                    resp_seq: seq,
                    state: ProtocolState::Registered,
                }));
            }
        }
    }
}
