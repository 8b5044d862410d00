//! Fuzz target for the [`Slave`] state machine
//!
//! Drive one slave with arbitrary commands, data and raw bytes.
//!
//! # Strategy
//!
//! - Commands of every type with fuzzed receivers, sequence numbers, op
//!   modes, steps and scopes
//! - Data PDUs for this and other slaves, in and out of order
//! - Raw byte strings straight into `on_receive`
//! - Embedder calls (`report_error`, `log`) between PDUs
//!
//! # Invariants
//!
//! - NEVER panic on any input
//! - A command the lifecycle rejects leaves the state unchanged
//! - `Idle` is only left through `STC_register`
//! - Transient states are never observable between PDUs
//! - Everything the slave sends decodes

#![no_main]

use arbitrary::Arbitrary;
use dcp_core::{lifecycle, RecordingTransport, Slave, SlaveConfig, SlaveHandlers};
use dcp_proto::{
    payloads::{
        Command, Configure, DoStep, InputOutput, Parameters, QueryLog, Register, Run, SetLogging,
        SetParameter, SetScope, SetSteps, SetTimeResolution,
    },
    Configuration, ErrorCode, LogLevel, LogMode, NamedValue, OpMode, Pdu, PduType, ProtocolState,
    Scope, Value, PROTOCOL_VERSION_MAJOR,
};
use libfuzzer_sys::fuzz_target;

const UUID: u128 = 0xF022;

#[derive(Debug, Clone, Arbitrary)]
enum SlaveEvent {
    Command { kind: u8, receiver: u8, seq: u32, arg: u32, flag: bool },
    Data { io: bool, slave_id: u8, seq: u32 },
    Raw(Vec<u8>),
    ReportError,
    Log { category: u8, debug: bool },
}

#[derive(Debug, Clone, Arbitrary)]
struct FuzzInput {
    require_time_resolution: bool,
    events: Vec<SlaveEvent>,
}

fuzz_target!(|input: FuzzInput| {
    let config = SlaveConfig {
        require_time_resolution: input.require_time_resolution,
        ..SlaveConfig::with_uuid(UUID)
    };
    let mut slave = Slave::new(config, SlaveHandlers::new(), RecordingTransport::new());

    for event in input.events {
        let previous = slave.state();

        match event {
            SlaveEvent::Command { kind, receiver, seq, arg, flag } => {
                let Some(pdu) = build_command(kind, Command::new(receiver, seq), arg, flag) else {
                    continue;
                };
                let command = pdu.pdu_type();
                slave.handle_pdu(pdu);

                if !lifecycle::accepts(previous, command) {
                    assert_eq!(slave.state(), previous, "{command} rejected but state changed");
                }
                if previous == ProtocolState::Idle && slave.state() != ProtocolState::Idle {
                    assert_eq!(command, PduType::Register, "left Idle through {command}");
                }
            },
            SlaveEvent::Data { io, slave_id, seq } => {
                let pdu = if io {
                    Pdu::InputOutput(InputOutput { slave_id, step: seq, values: Vec::new() })
                } else {
                    Pdu::Parameter(Parameters { slave_id, seq, values: Vec::new() })
                };
                slave.handle_pdu(pdu);
                assert_eq!(slave.state(), previous, "data changed the lifecycle state");
            },
            SlaveEvent::Raw(bytes) => slave.on_receive(&bytes),
            SlaveEvent::ReportError => {
                slave.report_error(ErrorCode::CallbackFailure, "fuzz");
                if previous == ProtocolState::Idle {
                    assert_eq!(slave.state(), ProtocolState::Idle);
                } else {
                    assert_eq!(slave.state(), ProtocolState::Error);
                }
            },
            SlaveEvent::Log { category, debug } => {
                let level = if debug { LogLevel::Debug } else { LogLevel::Error };
                slave.log(level, category, "fuzz");
            },
        }

        assert!(!slave.state().is_transient(), "observed transient state {}", slave.state());
        for (_, bytes) in slave.transport_mut().take() {
            assert!(Pdu::decode(&bytes).is_ok(), "slave sent an undecodable PDU");
        }
    }
});

fn build_command(kind: u8, address: Command, arg: u32, flag: bool) -> Option<Pdu> {
    let commands: Vec<PduType> = PduType::ALL.into_iter().filter(|t| t.is_command()).collect();
    let command = commands[usize::from(kind) % commands.len()];
    let Command { receiver, seq } = address;

    Some(match command {
        PduType::Register => Pdu::Register(Register {
            receiver,
            seq,
            slave_uuid: if flag { UUID } else { u128::from(arg) },
            major_version: PROTOCOL_VERSION_MAJOR,
            minor_version: 0,
            op_mode: OpMode::ALL[arg as usize % OpMode::ALL.len()],
        }),
        PduType::Deregister => Pdu::Deregister(address),
        PduType::Configure => Pdu::Configure(Configure {
            receiver,
            seq,
            configuration: Configuration::default(),
        }),
        PduType::Initialize => Pdu::Initialize(address),
        PduType::Prepare => Pdu::Prepare(address),
        PduType::Run => Pdu::Run(Run { receiver, seq, start_time: f64::from(arg) }),
        PduType::DoStep => {
            let step_size = if flag { f64::from(arg) / 1000.0 } else { -1.0 };
            Pdu::DoStep(DoStep { receiver, seq, step_size })
        },
        PduType::SendOutputs => Pdu::SendOutputs(address),
        PduType::Stop => Pdu::Stop(address),
        PduType::Reset => Pdu::Reset(address),
        PduType::SetTimeResolution => Pdu::SetTimeResolution(SetTimeResolution {
            receiver,
            seq,
            numerator: arg % 4,
            denominator: 1000,
        }),
        PduType::SetSteps => Pdu::SetSteps(SetSteps {
            receiver,
            seq,
            data_id: (arg % 3) as u16,
            steps: arg % 4,
        }),
        PduType::ClearConfiguration => Pdu::ClearConfiguration(address),
        PduType::SetParameter => Pdu::SetParameter(SetParameter {
            receiver,
            seq,
            parameter: NamedValue::new("gain", Value::Uint32(arg)),
        }),
        PduType::SetScope => Pdu::SetScope(SetScope {
            receiver,
            seq,
            data_id: u16::from(flag),
            scope: Scope::ALL[arg as usize % Scope::ALL.len()],
        }),
        PduType::SetLogging => Pdu::SetLogging(SetLogging {
            receiver,
            seq,
            category: (arg % 4) as u8,
            level: LogLevel::Debug,
            mode: if flag { LogMode::OnRequest } else { LogMode::OnNotification },
        }),
        PduType::QueryState => Pdu::QueryState(address),
        PduType::QueryError => Pdu::QueryError(address),
        PduType::QueryLog => Pdu::QueryLog(QueryLog {
            receiver,
            seq,
            category: (arg % 4) as u8,
            max_entries: (arg % 32) as u8,
        }),
        _ => return None,
    })
}
