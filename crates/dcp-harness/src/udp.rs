//! UDP drivers for running managers under turmoil.
//!
//! One PDU per datagram. The managers stay sans-IO: they queue PDUs into an
//! [`Outbox`] and the drivers move them between the outbox and a
//! `turmoil::net::UdpSocket`. Loss, latency and partitions come from the
//! turmoil simulation, so the protocol sees a real unreliable link.

use std::{
    collections::BTreeMap,
    io,
    net::{Ipv4Addr, SocketAddr},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use bytes::Bytes;
use dcp_core::{Endpoint, Environment, Master, MasterError, Slave, Transport, TransportError};
use dcp_proto::{ProtocolState, SlaveId};
use thiserror::Error;
use tracing::{debug, trace, warn};
use turmoil::net::UdpSocket;

/// Port both drivers bind by default.
pub const DCP_PORT: u16 = 4004;

/// Largest UDP payload.
const MAX_DATAGRAM: usize = 65_507;

/// How long [`UdpMaster::settle`] waits for a datagram before ticking.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Errors raised by the UDP drivers.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The master rejected the command locally.
    #[error(transparent)]
    Master(#[from] MasterError),

    /// Socket failure.
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
}

/// [`Transport`] that queues PDUs until a driver flushes them.
///
/// Clones share one queue, so the manager and its driver can each hold one.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    queue: Arc<Mutex<Vec<(Endpoint, Bytes)>>>,
}

impl Outbox {
    /// Empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything queued, oldest first.
    pub fn drain(&self) -> Vec<(Endpoint, Bytes)> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of queued PDUs.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(Endpoint, Bytes)>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for Outbox {
    fn send(&mut self, to: Endpoint, pdu: Bytes) -> Result<(), TransportError> {
        self.lock().push((to, pdu));
        Ok(())
    }
}

/// Serve `slave` on `port` forever, answering each datagram's sender.
pub async fn run_slave(mut slave: Slave<Outbox>, port: u16) -> Result<(), DriverError> {
    let outbox = slave.transport().clone();
    let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await?;
    let mut buf = vec![0u8; MAX_DATAGRAM];

    loop {
        let (len, from) = socket.recv_from(&mut buf).await?;
        trace!(%from, len, "slave received datagram");
        slave.on_receive(&buf[..len]);

        for (_, pdu) in outbox.drain() {
            socket.send_to(&pdu, from).await?;
        }
    }
}

/// A [`Master`] bound to a UDP socket.
pub struct UdpMaster<E: Environment> {
    master: Master<E, Outbox>,
    outbox: Outbox,
    socket: UdpSocket,
    peers: BTreeMap<SlaveId, SocketAddr>,
    poll_interval: Duration,
}

impl<E: Environment> UdpMaster<E> {
    /// Bind `port` and drive `master`.
    pub async fn bind(master: Master<E, Outbox>, port: u16) -> Result<Self, DriverError> {
        let outbox = master.transport().clone();
        let socket = UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))).await?;
        Ok(Self {
            master,
            outbox,
            socket,
            peers: BTreeMap::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Route PDUs for slave `id` to `addr`.
    pub fn add_peer(&mut self, id: SlaveId, addr: SocketAddr) {
        self.peers.insert(id, addr);
    }

    /// Change how often [`UdpMaster::settle`] checks deadlines while idle.
    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    /// The master.
    pub fn master(&self) -> &Master<E, Outbox> {
        &self.master
    }

    /// The master, mutably.
    pub fn master_mut(&mut self) -> &mut Master<E, Outbox> {
        &mut self.master
    }

    /// Send everything the master queued. Returns the number of datagrams.
    ///
    /// PDUs for slaves without a known address are dropped; the rest are
    /// still sent.
    pub async fn flush(&mut self) -> Result<usize, DriverError> {
        let routed = route(&self.peers, self.outbox.drain());
        for (addr, pdu) in &routed {
            self.socket.send_to(pdu, *addr).await?;
        }
        Ok(routed.len())
    }

    /// Process datagrams until slave `id` has no command awaiting a response.
    ///
    /// Deadlines are checked whenever the socket stays quiet for the poll
    /// interval, so a lost response ends in a timeout rather than a hang.
    /// Returns the recorded state, `None` once the slave is deregistered.
    pub async fn settle(&mut self, id: SlaveId) -> Result<Option<ProtocolState>, DriverError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];

        while self.master.pending_command(id).is_some() {
            match tokio::time::timeout(self.poll_interval, self.socket.recv_from(&mut buf)).await {
                Ok(received) => {
                    let (len, from) = received?;
                    trace!(%from, len, "master received datagram");
                    self.master.on_receive(&buf[..len]);
                },
                Err(_) => {
                    self.master.tick();
                },
            }
            self.flush().await?;
        }
        Ok(self.master.slave_state(id))
    }

    /// Issue a command to slave `id`, send it and wait for the outcome.
    pub async fn command<F>(
        &mut self,
        id: SlaveId,
        issue: F,
    ) -> Result<Option<ProtocolState>, DriverError>
    where
        F: FnOnce(&mut Master<E, Outbox>) -> Result<u32, MasterError>,
    {
        issue(&mut self.master)?;
        self.flush().await?;
        self.settle(id).await
    }
}

fn route(
    peers: &BTreeMap<SlaveId, SocketAddr>,
    queued: Vec<(Endpoint, Bytes)>,
) -> Vec<(SocketAddr, Bytes)> {
    queued
        .into_iter()
        .filter_map(|(to, pdu)| {
            let Endpoint::Slave(id) = to else {
                debug!("master addressed itself, dropping PDU");
                return None;
            };
            let Some(addr) = peers.get(&id) else {
                warn!(slave_id = id, "no address for slave, dropping PDU");
                return None;
            };
            Some((*addr, pdu))
        })
        .collect()
}

impl<E: Environment> std::fmt::Debug for UdpMaster<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpMaster")
            .field("master", &self.master)
            .field("peers", &self.peers)
            .field("queued", &self.outbox.len())
            .finish_non_exhaustive()
    }
}
