//! A master and its slaves wired to one [`SimNetwork`].
//!
//! The world owns every participant and moves PDUs between them on demand.
//! Nothing happens until the test calls [`World::deliver_all`] or
//! [`World::advance`], so interleavings are fully under test control.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use dcp_core::{
    DataReceived, Endpoint, Master, MasterConfig, MasterError, MasterListeners, MissedPdu, Slave,
    SlaveConfig, SlaveDescription, SlaveFailure, SlaveHandlers,
};
use dcp_proto::{Configuration, ProtocolState, SlaveId};
use tracing::debug;

use crate::{
    network::{FaultConfig, NetworkStats, SimNetwork, SimTransport},
    sim_env::SimEnv,
};

/// Upper bound on PDUs moved by one [`World::deliver_all`].
const MAX_DELIVERIES: usize = 100_000;

/// Master-side event, in the order the listeners fired.
#[derive(Debug, Clone, PartialEq)]
pub enum MasterEvent {
    /// Descriptor state changed.
    StateChanged {
        /// Slave.
        slave_id: SlaveId,
        /// Previous state.
        old: ProtocolState,
        /// New state.
        new: ProtocolState,
    },
    /// Slave entered `Error`.
    Failed(SlaveFailure),
    /// Data PDU arrived.
    Data(DataReceived),
    /// Sequence gap observed.
    Missed {
        /// Slave.
        slave_id: SlaveId,
        /// What was missed.
        missed: MissedPdu,
    },
    /// `NTF_step_finished` arrived.
    StepFinished {
        /// Slave.
        slave_id: SlaveId,
        /// Completed step.
        step: u32,
    },
    /// `NTF_log` or `RSP_log_ack` arrived.
    Log {
        /// Slave.
        slave_id: SlaveId,
        /// Number of entries.
        entries: usize,
    },
}

/// Shared, append-only list of master events.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<MasterEvent>>>,
}

impl EventLog {
    fn push(&self, event: MasterEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event);
    }

    /// Copy of every event so far.
    pub fn snapshot(&self) -> Vec<MasterEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Failures recorded so far.
    pub fn failures(&self) -> Vec<SlaveFailure> {
        self.snapshot()
            .into_iter()
            .filter_map(|e| match e {
                MasterEvent::Failed(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    fn listeners(&self) -> MasterListeners {
        let (a, b, c, d, e, f, g, h, i) = (
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
        );
        MasterListeners::new()
            .on_state_changed(move |slave_id, old, new| {
                a.push(MasterEvent::StateChanged { slave_id, old, new });
            })
            .on_error(move |failure| b.push(MasterEvent::Failed(failure.clone())))
            .on_data(move |data| c.push(MasterEvent::Data(data.clone())))
            .on_missed_control(move |slave_id, missed| {
                d.push(MasterEvent::Missed { slave_id, missed });
            })
            .on_missed_parameter(move |slave_id, missed| {
                e.push(MasterEvent::Missed { slave_id, missed });
            })
            .on_missed_input_output(move |slave_id, missed| {
                f.push(MasterEvent::Missed { slave_id, missed });
            })
            .on_step_finished(move |slave_id, step| {
                g.push(MasterEvent::StepFinished { slave_id, step });
            })
            .on_log_notification(move |slave_id, entries| {
                h.push(MasterEvent::Log { slave_id, entries: entries.len() });
            })
            .on_log_ack(move |slave_id, entries| {
                i.push(MasterEvent::Log { slave_id, entries: entries.len() });
            })
    }
}

/// Master, slaves, clock and network of one simulation.
pub struct World {
    env: SimEnv,
    network: SimNetwork,
    master: Master<SimEnv, SimTransport>,
    slaves: BTreeMap<SlaveId, Slave<SimTransport>>,
    events: EventLog,
}

impl World {
    /// Empty world with default master configuration.
    pub fn new(seed: u64, faults: FaultConfig) -> Self {
        Self::with_config(seed, faults, MasterConfig::default())
    }

    /// Empty world.
    pub fn with_config(seed: u64, faults: FaultConfig, config: MasterConfig) -> Self {
        let env = SimEnv::new();
        let network = SimNetwork::new(seed, faults);
        let events = EventLog::default();
        let transport = network.transport(Endpoint::Master);
        let master = Master::new(env.clone(), config, events.listeners(), transport);
        Self { env, network, master, slaves: BTreeMap::new(), events }
    }

    /// Add a slave and the matching master descriptor.
    pub fn add_slave(
        &mut self,
        id: SlaveId,
        config: SlaveConfig,
        handlers: SlaveHandlers,
    ) -> Result<(), MasterError> {
        let description = SlaveDescription::new(id, config.uuid, config.name.clone());
        self.master.register_slave(description)?;

        let transport = self.network.transport(Endpoint::Slave(id));
        self.slaves.insert(id, Slave::new(config, handlers, transport));
        Ok(())
    }

    /// The master.
    pub fn master(&self) -> &Master<SimEnv, SimTransport> {
        &self.master
    }

    /// The master, mutably.
    pub fn master_mut(&mut self) -> &mut Master<SimEnv, SimTransport> {
        &mut self.master
    }

    /// Slave `id`.
    pub fn slave(&self, id: SlaveId) -> Option<&Slave<SimTransport>> {
        self.slaves.get(&id)
    }

    /// Slave `id`, mutably.
    pub fn slave_mut(&mut self, id: SlaveId) -> Option<&mut Slave<SimTransport>> {
        self.slaves.get_mut(&id)
    }

    /// Shared clock.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Shared network.
    pub fn network(&self) -> &SimNetwork {
        &self.network
    }

    /// Network counters.
    pub fn stats(&self) -> NetworkStats {
        self.network.stats()
    }

    /// Master events so far.
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Move PDUs until the network is quiet. Returns how many were moved.
    pub fn deliver_all(&mut self) -> usize {
        let mut delivered = 0;
        while delivered < MAX_DELIVERIES {
            let Some(envelope) = self.network.pop() else {
                break;
            };
            delivered += 1;

            match envelope.to {
                Endpoint::Master => self.master.on_receive(&envelope.pdu),
                Endpoint::Slave(id) => match self.slaves.get_mut(&id) {
                    Some(slave) => slave.on_receive(&envelope.pdu),
                    None => debug!(slave_id = id, "no such slave"),
                },
            }
        }
        delivered
    }

    /// Advance the clock and let the master resolve expired commands.
    ///
    /// Returns the number of commands that timed out.
    pub fn advance(&mut self, by: Duration) -> usize {
        self.env.advance(by);
        self.master.tick()
    }

    /// Issue a master command and deliver until quiet.
    pub fn run<F>(&mut self, issue: F) -> Result<u32, MasterError>
    where
        F: FnOnce(&mut Master<SimEnv, SimTransport>) -> Result<u32, MasterError>,
    {
        let seq = issue(&mut self.master)?;
        self.deliver_all();
        Ok(seq)
    }

    /// Drive slave `id` from `Idle` to `Running` with `configuration`.
    ///
    /// Returns the state the master recorded when the sequence stopped.
    pub fn bring_to_running(
        &mut self,
        id: SlaveId,
        configuration: Configuration,
    ) -> Result<Option<ProtocolState>, MasterError> {
        self.run(|m| m.stc_register(id))?;
        self.run(|m| m.stc_configure(id, configuration))?;
        self.run(|m| m.stc_initialize(id))?;
        self.run(|m| m.stc_prepare(id))?;
        self.run(|m| m.stc_run(id, 0.0))?;
        Ok(self.master.slave_state(id))
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("now", &self.env)
            .field("slaves", &self.slaves.keys().collect::<Vec<_>>())
            .field("stats", &self.network.stats())
            .finish_non_exhaustive()
    }
}
