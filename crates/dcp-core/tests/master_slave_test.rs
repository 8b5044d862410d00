//! Master and slave tests
//!
//! A master and one slave exchange PDUs through recording transports with no
//! network in between.

use std::sync::{Arc, Mutex};

use dcp_core::{
    CallbackError, FailureReason, Master, MasterConfig, MasterError, MasterListeners,
    RecordingTransport, Slave, SlaveConfig, SlaveDescription, SlaveHandlers, SystemEnv,
};
use dcp_proto::{
    Configuration, ErrorCode, LogEntry, LogLevel, LogMode, NamedValue, ProtocolState, Value,
};

const ID: u8 = 4;
const UUID: u128 = 0xA11CE;

type Shared<T> = Arc<Mutex<Vec<T>>>;

struct Pair {
    master: Master<SystemEnv, RecordingTransport>,
    slave: Slave<RecordingTransport>,
}

impl Pair {
    fn new(config: SlaveConfig, handlers: SlaveHandlers, listeners: MasterListeners) -> Self {
        let mut master = Master::new(
            SystemEnv::new(),
            MasterConfig::default(),
            listeners,
            RecordingTransport::new(),
        );
        master.register_slave(SlaveDescription::new(ID, config.uuid, "pair")).unwrap();
        let slave = Slave::new(config, handlers, RecordingTransport::new());
        Self { master, slave }
    }

    /// Move PDUs both ways until neither side has anything to send.
    fn pump(&mut self) {
        loop {
            let to_slave = self.master.transport_mut().take();
            let to_master = self.slave.transport_mut().take();
            if to_slave.is_empty() && to_master.is_empty() {
                return;
            }
            for (_, pdu) in to_slave {
                self.slave.on_receive(&pdu);
            }
            for (_, pdu) in to_master {
                self.master.on_receive(&pdu);
            }
        }
    }

    fn run<F>(&mut self, issue: F)
    where
        F: FnOnce(&mut Master<SystemEnv, RecordingTransport>) -> Result<u32, MasterError>,
    {
        issue(&mut self.master).unwrap();
        self.pump();
    }

    fn to_running(&mut self) {
        self.run(|m| m.stc_register(ID));
        self.run(|m| m.stc_configure(ID, Configuration::default()));
        self.run(|m| m.stc_initialize(ID));
        self.run(|m| m.stc_prepare(ID));
        self.run(|m| m.stc_run(ID, 0.0));
    }
}

fn plain_pair() -> Pair {
    Pair::new(SlaveConfig::with_uuid(UUID), SlaveHandlers::new(), MasterListeners::new())
}

fn shared<T>() -> (Shared<T>, Shared<T>) {
    let list = Arc::new(Mutex::new(Vec::new()));
    (Arc::clone(&list), list)
}

#[test]
fn lifecycle_keeps_both_ends_in_step() {
    let mut pair = plain_pair();

    pair.to_running();
    assert_eq!(pair.master.slave_state(ID), Some(ProtocolState::Running));
    assert_eq!(pair.slave.state(), ProtocolState::Running);
    assert_eq!(pair.slave.id(), Some(ID));

    pair.run(|m| m.stc_do_step(ID, 0.25));
    pair.run(|m| m.stc_do_step(ID, 0.25));
    assert_eq!(pair.slave.step(), 2);
    assert!((pair.slave.time() - 0.5).abs() < f64::EPSILON);
    assert_eq!(pair.master.descriptor(ID).and_then(|d| d.last_step()), Some(2));

    pair.run(|m| m.stc_stop(ID));
    pair.run(|m| m.stc_deregister(ID));
    assert_eq!(pair.master.slave_state(ID), None);
    assert_eq!(pair.slave.state(), ProtocolState::Idle);
    assert_eq!(pair.slave.id(), None);
}

#[test]
fn configure_waits_for_time_resolution_when_required() {
    let config = SlaveConfig { require_time_resolution: true, ..SlaveConfig::with_uuid(UUID) };
    let (failures, captured) = shared();
    let listeners =
        MasterListeners::new().on_error(move |f| captured.lock().unwrap().push(f.clone()));
    let mut pair = Pair::new(config, SlaveHandlers::new(), listeners);

    pair.run(|m| m.stc_register(ID));
    pair.run(|m| m.stc_configure(ID, Configuration::default()));

    assert_eq!(pair.master.slave_state(ID), Some(ProtocolState::Error));
    assert!(matches!(
        failures.lock().unwrap()[0].reason,
        FailureReason::Nack { code: ErrorCode::IncompleteConfiguration, .. }
    ));
    // The slave rejected the command without failing
    assert_eq!(pair.slave.state(), ProtocolState::Registered);

    pair.run(|m| m.inf_state(ID));
    pair.run(|m| m.cfg_set_time_resolution(ID, 1, 100));
    pair.run(|m| m.stc_configure(ID, Configuration::default()));

    assert_eq!(pair.master.slave_state(ID), Some(ProtocolState::Configured));
    assert_eq!(pair.slave.time_resolution(), Some((1, 100)));
}

#[test]
fn parameters_reach_running_slave() {
    let mut pair = plain_pair();
    pair.to_running();

    let gain = vec![NamedValue::new("gain", Value::Int32(-3))];
    let seq = pair.master.send_parameters(ID, gain).unwrap();
    pair.pump();

    assert_eq!(seq, 0);
    assert_eq!(pair.slave.parameter("gain"), Some(&Value::Int32(-3)));
}

#[test]
fn buffered_log_is_fetched_on_request() {
    let (fetched, captured) = shared::<LogEntry>();
    let listeners = MasterListeners::new()
        .on_log_ack(move |_, entries| captured.lock().unwrap().extend_from_slice(entries));
    let mut pair = Pair::new(SlaveConfig::with_uuid(UUID), SlaveHandlers::new(), listeners);
    pair.run(|m| m.stc_register(ID));
    pair.run(|m| m.cfg_set_logging(ID, 0, LogLevel::Information, LogMode::OnRequest));

    pair.slave.log(LogLevel::Information, 2, "warming up");
    pair.slave.log(LogLevel::Debug, 2, "filtered out");
    pair.slave.log(LogLevel::Error, 3, "other category");
    assert_eq!(pair.slave.buffered_log_entries(), 2);

    pair.run(|m| m.inf_log(ID, 2, 10));

    let fetched = fetched.lock().unwrap();
    assert_eq!(fetched.len(), 1);
    assert_eq!(fetched[0].message, "warming up");
    assert_eq!(pair.slave.buffered_log_entries(), 1);
}

#[test]
fn log_notifications_are_pushed() {
    let (received, captured) = shared::<String>();
    let listeners = MasterListeners::new().on_log_notification(move |_, entries| {
        captured.lock().unwrap().extend(entries.iter().map(|e| e.message.clone()));
    });
    let mut pair = Pair::new(SlaveConfig::with_uuid(UUID), SlaveHandlers::new(), listeners);
    pair.run(|m| m.stc_register(ID));

    pair.slave.log(LogLevel::Fatal, 1, "disk full");
    pair.pump();

    assert_eq!(*received.lock().unwrap(), vec![String::from("disk full")]);
}

#[test]
fn error_query_reports_callback_failure() {
    let (codes, captured) = shared();
    let listeners = MasterListeners::new()
        .on_error_report(move |id, code| captured.lock().unwrap().push((id, code)));
    let handlers =
        SlaveHandlers::new().on_initialize(|| Err(CallbackError::new("missing model file")));
    let mut pair = Pair::new(SlaveConfig::with_uuid(UUID), handlers, listeners);

    pair.run(|m| m.stc_register(ID));
    pair.run(|m| m.stc_configure(ID, Configuration::default()));
    pair.run(|m| m.stc_initialize(ID));
    assert_eq!(pair.slave.state(), ProtocolState::Error);
    assert_eq!(pair.slave.last_error(), ErrorCode::CallbackFailure);

    pair.run(|m| m.inf_error(ID));

    assert_eq!(*codes.lock().unwrap(), vec![(ID, ErrorCode::CallbackFailure)]);
}
