//! Outbound transport seam.
//!
//! Managers never perform I/O themselves. They hand encoded PDUs to a
//! [`Transport`] and the embedder feeds received buffers back through
//! `on_receive`. Reliability, addressing and framing below the PDU boundary
//! are the transport's concern.

use bytes::Bytes;
use dcp_proto::SlaveId;
use thiserror::Error;

/// Destination of an outbound PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Endpoint {
    /// The master.
    Master,
    /// The slave with this id.
    Slave(SlaveId),
}

/// Errors reported by a transport when handing off a PDU.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The transport was shut down.
    #[error("transport closed")]
    Closed,

    /// No route to the destination.
    #[error("endpoint unreachable: {0:?}")]
    Unreachable(Endpoint),

    /// Lower-layer I/O failure.
    #[error("I/O error: {reason}")]
    Io {
        /// Description from the underlying layer.
        reason: String,
    },
}

/// Sink for encoded PDUs.
///
/// A transport shared between several managers must serialize writes per
/// connection.
pub trait Transport {
    /// Hand `pdu` to the transport for delivery to `to`.
    ///
    /// Returning `Ok` means the PDU was accepted, not that it was delivered.
    fn send(&mut self, to: Endpoint, pdu: Bytes) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, to: Endpoint, pdu: Bytes) -> Result<(), TransportError> {
        (**self).send(to, pdu)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, to: Endpoint, pdu: Bytes) -> Result<(), TransportError> {
        (**self).send(to, pdu)
    }
}

/// Transport that records every PDU in memory.
///
/// Useful for unit tests and for embedders that flush in batches.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    sent: Vec<(Endpoint, Bytes)>,
}

impl RecordingTransport {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// PDUs handed off so far, oldest first.
    pub fn sent(&self) -> &[(Endpoint, Bytes)] {
        &self.sent
    }

    /// Remove and return everything recorded.
    pub fn take(&mut self) -> Vec<(Endpoint, Bytes)> {
        std::mem::take(&mut self.sent)
    }
}

impl Transport for RecordingTransport {
    fn send(&mut self, to: Endpoint, pdu: Bytes) -> Result<(), TransportError> {
        self.sent.push((to, pdu));
        Ok(())
    }
}
