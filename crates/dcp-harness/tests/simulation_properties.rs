//! Property-based tests for simulation determinism.
//!
//! A run is a function of its seed and its operations. Two runs with the same
//! inputs must fire the same master events in the same order and lose the
//! same PDUs.

use std::time::Duration;

use dcp_core::{Channel, SlaveConfig, SlaveHandlers, StepOutput};
use dcp_harness::{FaultConfig, MasterEvent, NetworkStats, World};
use dcp_proto::{Configuration, NamedValue, ProtocolState, SlaveId, Value};
use proptest::prelude::*;

const SLAVES: [SlaveId; 3] = [1, 2, 3];

fn counting_handlers() -> SlaveHandlers {
    SlaveHandlers::new().on_run_step(|ctx| {
        let value = Value::Uint32(ctx.step);
        Ok(StepOutput::new(vec![NamedValue::new("count", value)]))
    })
}

/// Bring every slave up, then step and exchange data `rounds` times.
fn run(seed: u64, faults: FaultConfig, rounds: u8) -> (Vec<MasterEvent>, NetworkStats) {
    let mut world = World::new(seed, faults);
    for id in SLAVES {
        let config = SlaveConfig::with_uuid(u128::from(id));
        world.add_slave(id, config, counting_handlers()).unwrap();
    }

    for id in SLAVES {
        let _ = world.bring_to_running(id, Configuration::default());
    }

    for round in 0..rounds {
        for id in SLAVES {
            if world.master().slave_state(id) != Some(ProtocolState::Running) {
                continue;
            }
            let _ = world.master_mut().send_inputs(id, u32::from(round), Vec::new());
            let _ = world.run(|m| m.stc_do_step(id, 0.01));
            let _ = world.run(|m| m.stc_send_outputs(id));
        }
        world.advance(Duration::from_secs(1));
    }
    world.advance(Duration::from_secs(5));
    world.deliver_all();

    (world.events().snapshot(), world.stats())
}

fn fault_strategy() -> impl Strategy<Value = FaultConfig> {
    (0.0..0.3f64, 0.0..0.2f64, 0.0..0.2f64).prop_map(|(drop_rate, duplicate_rate, reorder_rate)| {
        FaultConfig { drop_rate, duplicate_rate, reorder_rate }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_same_seed_same_events(
        seed in any::<u64>(),
        faults in fault_strategy(),
        rounds in 0..8u8
    ) {
        let first = run(seed, faults, rounds);
        let second = run(seed, faults, rounds);

        // PROPERTY: Determinism - same inputs produce same outputs
        prop_assert_eq!(&first.1, &second.1, "network stats differ for seed {}", seed);
        prop_assert_eq!(first.0, second.0, "event logs differ for seed {}", seed);
    }

    #[test]
    fn prop_output_steps_never_go_backwards(
        seed in any::<u64>(),
        faults in fault_strategy(),
        rounds in 1..8u8
    ) {
        let (events, _) = run(seed, faults, rounds);

        // Stale and duplicate data is dropped before it reaches a listener
        for id in SLAVES {
            let steps: Vec<u32> = events
                .iter()
                .filter_map(|e| match e {
                    MasterEvent::Data(d)
                        if d.slave_id == id && d.channel == Channel::InputOutput =>
                    {
                        Some(d.sequence)
                    },
                    _ => None,
                })
                .collect();
            prop_assert!(
                steps.windows(2).all(|w| w[0] < w[1]),
                "slave {} delivered steps out of order: {:?}",
                id, steps
            );
        }
    }

    #[test]
    fn prop_perfect_network_reaches_every_step(rounds in 1..8u8) {
        let (events, stats) = run(0, FaultConfig::NONE, rounds);

        prop_assert_eq!(stats.dropped, 0);
        prop_assert!(events.iter().all(|e| !matches!(e, MasterEvent::Failed(_))));
        for id in SLAVES {
            let finished = events
                .iter()
                .filter(|e| {
                    matches!(e, MasterEvent::StepFinished { slave_id, .. } if *slave_id == id)
                })
                .count();
            prop_assert_eq!(finished, usize::from(rounds));
        }
    }
}
