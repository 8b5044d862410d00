//! In-memory network with seeded fault injection.
//!
//! Every transport handed out by a [`SimNetwork`] pushes into one shared FIFO
//! queue. Faults are drawn from a `ChaCha8Rng` seeded at construction, so the
//! same seed and the same sends always lose, duplicate and reorder the same
//! PDUs.

use std::{
    collections::{BTreeSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use bytes::Bytes;
use dcp_core::{Endpoint, Transport, TransportError};
use dcp_proto::SlaveId;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

/// Fault probabilities, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FaultConfig {
    /// Probability that a PDU is lost.
    pub drop_rate: f64,
    /// Probability that a delivered PDU is queued twice.
    pub duplicate_rate: f64,
    /// Probability that a PDU overtakes the one queued before it.
    pub reorder_rate: f64,
}

impl FaultConfig {
    /// Perfect network.
    pub const NONE: Self = Self { drop_rate: 0.0, duplicate_rate: 0.0, reorder_rate: 0.0 };

    /// Network that only loses PDUs.
    pub fn lossy(drop_rate: f64) -> Self {
        Self { drop_rate, ..Self::NONE }
    }
}

/// PDU in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Sender.
    pub from: Endpoint,
    /// Receiver.
    pub to: Endpoint,
    /// Encoded PDU.
    pub pdu: Bytes,
}

/// Counters over the lifetime of a network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkStats {
    /// PDUs handed to a transport.
    pub sent: u64,
    /// PDUs lost to faults or partitions.
    pub dropped: u64,
    /// Extra copies queued.
    pub duplicated: u64,
    /// PDUs that overtook their predecessor.
    pub reordered: u64,
    /// PDUs taken off the queue.
    pub delivered: u64,
}

#[derive(Debug)]
struct Inner {
    queue: VecDeque<Envelope>,
    rng: ChaCha8Rng,
    faults: FaultConfig,
    partitioned: BTreeSet<SlaveId>,
    stats: NetworkStats,
}

impl Inner {
    fn chance(&mut self, probability: f64) -> bool {
        if probability <= 0.0 {
            false
        } else if probability >= 1.0 {
            true
        } else {
            self.rng.r#gen::<f64>() < probability
        }
    }

    fn is_cut(&self, endpoint: Endpoint) -> bool {
        matches!(endpoint, Endpoint::Slave(id) if self.partitioned.contains(&id))
    }

    fn push(&mut self, envelope: Envelope) {
        self.stats.sent += 1;

        if self.is_cut(envelope.from) || self.is_cut(envelope.to) {
            trace!(from = ?envelope.from, to = ?envelope.to, "partitioned");
            self.stats.dropped += 1;
            return;
        }
        if self.chance(self.faults.drop_rate) {
            trace!(from = ?envelope.from, to = ?envelope.to, "dropped");
            self.stats.dropped += 1;
            return;
        }

        let duplicate = self.chance(self.faults.duplicate_rate).then(|| envelope.clone());
        self.queue.push_back(envelope);
        if let Some(copy) = duplicate {
            self.stats.duplicated += 1;
            self.queue.push_back(copy);
        }

        let len = self.queue.len();
        if len >= 2 && self.chance(self.faults.reorder_rate) {
            self.stats.reordered += 1;
            self.queue.swap(len - 1, len - 2);
        }
    }
}

/// Shared in-memory network.
#[derive(Debug, Clone)]
pub struct SimNetwork {
    inner: Arc<Mutex<Inner>>,
}

impl SimNetwork {
    /// Network drawing faults from `seed`.
    pub fn new(seed: u64, faults: FaultConfig) -> Self {
        let inner = Inner {
            queue: VecDeque::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            faults,
            partitioned: BTreeSet::new(),
            stats: NetworkStats::default(),
        };
        Self { inner: Arc::new(Mutex::new(inner)) }
    }

    /// Transport sending as `from`.
    pub fn transport(&self, from: Endpoint) -> SimTransport {
        SimTransport { from, network: self.clone() }
    }

    /// Drop everything to or from slave `id` until [`SimNetwork::heal`].
    pub fn partition(&self, id: SlaveId) {
        self.lock().partitioned.insert(id);
    }

    /// Undo [`SimNetwork::partition`].
    pub fn heal(&self, id: SlaveId) {
        self.lock().partitioned.remove(&id);
    }

    /// Replace the fault probabilities for subsequent sends.
    pub fn set_faults(&self, faults: FaultConfig) {
        self.lock().faults = faults;
    }

    /// Take the oldest PDU in flight.
    pub fn pop(&self) -> Option<Envelope> {
        let mut inner = self.lock();
        let envelope = inner.queue.pop_front()?;
        inner.stats.delivered += 1;
        Some(envelope)
    }

    /// Discard everything in flight. Returns how many PDUs were lost.
    pub fn clear(&self) -> usize {
        let mut inner = self.lock();
        let lost = inner.queue.len();
        inner.queue.clear();
        inner.stats.dropped += lost as u64;
        lost
    }

    /// PDUs in flight.
    pub fn in_flight(&self) -> usize {
        self.lock().queue.len()
    }

    /// Counters so far.
    pub fn stats(&self) -> NetworkStats {
        self.lock().stats
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// [`Transport`] that queues onto a [`SimNetwork`].
#[derive(Debug, Clone)]
pub struct SimTransport {
    from: Endpoint,
    network: SimNetwork,
}

impl SimTransport {
    /// Endpoint this transport sends as.
    pub fn endpoint(&self) -> Endpoint {
        self.from
    }
}

impl Transport for SimTransport {
    fn send(&mut self, to: Endpoint, pdu: Bytes) -> Result<(), TransportError> {
        self.network.lock().push(Envelope { from: self.from, to, pdu });
        Ok(())
    }
}
