//! Model-based property tests.
//!
//! These tests generate random operation sequences and verify that the real
//! master and slaves behave identically to the reference model.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!      ModelWorld    RealWorld      Compare
//!      (reference)   (SimNetwork)   Results
//! ```

use std::time::Duration;

use dcp_core::{SlaveConfig, SlaveDescription, SlaveHandlers};
use dcp_harness::{
    FaultConfig, ModelCommand, ModelWorld, ObservableState, Operation, OperationError,
    OperationResult, World,
};
use dcp_proto::{
    Configuration, INPUT_DATA_ID, LogLevel, LogMode, NamedValue, ProtocolState, Scope, SlaveId,
    Value,
};
use proptest::prelude::*;

fn uuid_for(id: SlaveId) -> u128 {
    0xD0C0_0000 + u128::from(id)
}

/// Real system wrapper that mirrors ModelWorld's interface.
struct RealWorld {
    world: World,
}

impl RealWorld {
    fn new(num_slaves: u8, seed: u64) -> Self {
        let mut world = World::new(seed, FaultConfig::NONE);
        for id in 0..num_slaves {
            world
                .add_slave(id, SlaveConfig::with_uuid(uuid_for(id)), SlaveHandlers::new())
                .unwrap();
        }
        Self { world }
    }

    fn apply(&mut self, op: &Operation) -> OperationResult {
        match *op {
            Operation::Manage { slave } => {
                let description = SlaveDescription::new(slave, uuid_for(slave), "model");
                self.world.master_mut().register_slave(description).into()
            },
            Operation::Command { slave, command } => self.apply_command(slave, command),
            Operation::SendInputs { slave, step } => {
                self.world.master_mut().send_inputs(slave, u32::from(step), Vec::new()).into()
            },
            Operation::AdvanceTime { millis } => {
                self.world.advance(Duration::from_millis(u64::from(millis)));
                OperationResult::Ok
            },
            Operation::DeliverPending => {
                self.world.deliver_all();
                OperationResult::Ok
            },
        }
    }

    fn apply_command(&mut self, id: SlaveId, command: ModelCommand) -> OperationResult {
        let master = self.world.master_mut();
        let result = match command {
            ModelCommand::Register => master.stc_register(id),
            ModelCommand::Deregister => master.stc_deregister(id),
            ModelCommand::Configure => master.stc_configure(id, Configuration::default()),
            ModelCommand::Initialize => master.stc_initialize(id),
            ModelCommand::Prepare => master.stc_prepare(id),
            ModelCommand::Run => master.stc_run(id, 0.0),
            ModelCommand::DoStep => master.stc_do_step(id, 0.01),
            ModelCommand::SendOutputs => master.stc_send_outputs(id),
            ModelCommand::Stop => master.stc_stop(id),
            ModelCommand::Reset => master.stc_reset(id),
            ModelCommand::SetTimeResolution => master.cfg_set_time_resolution(id, 1, 1000),
            ModelCommand::SetSteps => master.cfg_set_steps(id, INPUT_DATA_ID, 2),
            ModelCommand::ClearConfiguration => master.cfg_clear(id),
            ModelCommand::SetParameter => {
                master.cfg_set_parameter(id, NamedValue::new("gain", Value::Float64(1.5)))
            },
            ModelCommand::SetScope => {
                master.cfg_set_scope(id, INPUT_DATA_ID, Scope::InitializationRunNonRealTime)
            },
            ModelCommand::SetLogging => {
                master.cfg_set_logging(id, 0, LogLevel::Warning, LogMode::OnNotification)
            },
            ModelCommand::QueryState => master.inf_state(id),
            ModelCommand::QueryError => master.inf_error(id),
            ModelCommand::QueryLog => master.inf_log(id, 0, 16),
        };
        result.into()
    }

    fn observable_state(&self, count: u8) -> ObservableState {
        let ids = 0..count;
        let master = self.world.master();
        ObservableState {
            recorded: ids.clone().map(|id| master.slave_state(id)).collect(),
            pending: ids.clone().map(|id| master.pending_command(id)).collect(),
            actual: ids
                .map(|id| self.world.slave(id).map_or(ProtocolState::Idle, |s| s.state()))
                .collect(),
        }
    }
}

fn command_strategy() -> impl Strategy<Value = ModelCommand> {
    prop_oneof![
        // Weight towards the happy path so runs get past Registered
        4 => Just(ModelCommand::Register),
        4 => Just(ModelCommand::Configure),
        4 => Just(ModelCommand::Initialize),
        4 => Just(ModelCommand::Prepare),
        4 => Just(ModelCommand::Run),
        4 => Just(ModelCommand::DoStep),
        2 => Just(ModelCommand::SendOutputs),
        2 => Just(ModelCommand::Stop),
        2 => Just(ModelCommand::Deregister),
        2 => Just(ModelCommand::Reset),
        1 => Just(ModelCommand::SetTimeResolution),
        1 => Just(ModelCommand::SetSteps),
        1 => Just(ModelCommand::ClearConfiguration),
        1 => Just(ModelCommand::SetParameter),
        1 => Just(ModelCommand::SetScope),
        1 => Just(ModelCommand::SetLogging),
        2 => Just(ModelCommand::QueryState),
        1 => Just(ModelCommand::QueryError),
        1 => Just(ModelCommand::QueryLog),
    ]
}

/// Strategy for operations. Slave ids are clamped per run.
fn operation_strategy() -> impl Strategy<Value = Operation> {
    let slave = any::<SlaveId>();

    prop_oneof![
        1 => slave.clone().prop_map(|slave| Operation::Manage { slave }),
        10 => (slave.clone(), command_strategy())
            .prop_map(|(slave, command)| Operation::Command { slave, command }),
        2 => (slave, any::<u8>()).prop_map(|(slave, step)| Operation::SendInputs { slave, step }),
        2 => (0..1_500u16).prop_map(|millis| Operation::AdvanceTime { millis }),
        8 => Just(Operation::DeliverPending),
    ]
}

/// Clamp slave ids to `0..=num_slaves`. Id `num_slaves` has no slave behind
/// it, so commands to it can only time out.
fn clamp_slave_id(op: Operation, num_slaves: u8) -> Operation {
    let clamp = |slave: SlaveId| slave % (num_slaves + 1);
    match op {
        Operation::Manage { slave } => Operation::Manage { slave: clamp(slave) },
        Operation::Command { slave, command } => {
            Operation::Command { slave: clamp(slave), command }
        },
        Operation::SendInputs { slave, step } => {
            Operation::SendInputs { slave: clamp(slave), step }
        },
        other => other,
    }
}

proptest! {
    /// Verify that operation results and final states match between model and
    /// real implementation.
    #[test]
    fn prop_model_matches_real(
        seed in any::<u64>(),
        num_slaves in 1..4u8,
        ops in prop::collection::vec(operation_strategy(), 0..80)
    ) {
        let mut model = ModelWorld::new(num_slaves);
        let mut real = RealWorld::new(num_slaves, seed);

        for (i, op) in ops.into_iter().enumerate() {
            let op = clamp_slave_id(op, num_slaves);

            let model_result = model.apply(&op);
            let real_result = real.apply(&op);

            prop_assert_eq!(
                &model_result,
                &real_result,
                "Divergence at operation {}: {:?}",
                i, op
            );
        }

        prop_assert_eq!(
            model.observable_state(num_slaves + 1),
            real.observable_state(num_slaves + 1)
        );
    }

    /// Verify model invariants hold after any operation sequence.
    #[test]
    fn prop_model_invariants(
        num_slaves in 1..4u8,
        ops in prop::collection::vec(operation_strategy(), 0..120)
    ) {
        let mut model = ModelWorld::new(num_slaves);

        for op in ops {
            let _ = model.apply(&clamp_slave_id(op, num_slaves));
        }
        let _ = model.apply(&Operation::DeliverPending);
        let state = model.observable_state(num_slaves + 1);

        // Invariant: once the network is quiet nothing is awaiting a response
        // from a slave that exists
        for id in 0..num_slaves {
            prop_assert_eq!(state.pending[usize::from(id)], None, "slave {} still pending", id);
        }

        // Invariant: a slave never reports Error when every callback succeeds
        for (id, actual) in state.actual.iter().enumerate() {
            prop_assert_ne!(*actual, ProtocolState::Error, "slave {} failed", id);
        }
    }

    /// Verify that a command is never accepted while another is outstanding.
    #[test]
    fn prop_second_command_is_refused(
        first in command_strategy(),
        second in command_strategy()
    ) {
        let mut model = ModelWorld::new(1);
        let mut real = RealWorld::new(1, 0);

        let first = Operation::Command { slave: 0, command: first };
        let first_result = model.apply(&first);
        prop_assert_eq!(&first_result, &real.apply(&first));

        let second = Operation::Command { slave: 0, command: second };
        let expected = if first_result.is_ok() {
            OperationResult::Error(OperationError::CommandInProgress)
        } else {
            model.apply(&second)
        };
        prop_assert_eq!(real.apply(&second), expected);
    }
}

#[cfg(test)]
mod smoke_tests {
    use super::*;

    fn command(slave: SlaveId, command: ModelCommand) -> Operation {
        Operation::Command { slave, command }
    }

    #[test]
    fn happy_path_reaches_running_in_both() {
        let mut model = ModelWorld::new(1);
        let mut real = RealWorld::new(1, 7);

        let path = [
            ModelCommand::Register,
            ModelCommand::Configure,
            ModelCommand::Initialize,
            ModelCommand::Prepare,
            ModelCommand::Run,
            ModelCommand::DoStep,
        ];
        for c in path {
            for op in [command(0, c), Operation::DeliverPending] {
                assert_eq!(model.apply(&op), real.apply(&op), "{op:?}");
            }
        }

        assert_eq!(model.recorded_state(0), Some(ProtocolState::Running));
        assert_eq!(model.observable_state(1), real.observable_state(1));
    }

    #[test]
    fn timeout_then_resync() {
        let mut model = ModelWorld::new(1);
        let mut real = RealWorld::new(1, 7);

        let ops = [
            command(0, ModelCommand::Register),
            Operation::AdvanceTime { millis: 1_000 },
            Operation::DeliverPending,
            command(0, ModelCommand::QueryState),
            Operation::DeliverPending,
        ];
        for op in &ops {
            assert_eq!(model.apply(op), real.apply(op), "{op:?}");
        }

        assert_eq!(model.recorded_state(0), Some(ProtocolState::Registered));
        assert_eq!(model.observable_state(1), real.observable_state(1));
    }

    #[test]
    fn unknown_slave_is_refused_locally() {
        let mut model = ModelWorld::new(1);
        let mut real = RealWorld::new(1, 7);

        let op = command(3, ModelCommand::Register);
        let expected = OperationResult::Error(OperationError::UnknownSlave);
        assert_eq!(model.apply(&op), expected);
        assert_eq!(real.apply(&op), expected);
    }

    #[test]
    fn deregistered_slave_can_be_managed_again() {
        let mut model = ModelWorld::new(1);
        let mut real = RealWorld::new(1, 7);

        let ops = [
            command(0, ModelCommand::Register),
            Operation::DeliverPending,
            command(0, ModelCommand::Deregister),
            Operation::DeliverPending,
            Operation::Manage { slave: 0 },
            command(0, ModelCommand::Register),
            Operation::DeliverPending,
        ];
        for op in &ops {
            assert_eq!(model.apply(op), real.apply(op), "{op:?}");
        }

        assert_eq!(model.observable_state(1), real.observable_state(1));
        assert_eq!(model.recorded_state(0), Some(ProtocolState::Registered));
    }
}
