//! Sans-IO master and slave state machines for the Distributed Co-Simulation
//! Protocol.
//!
//! A co-simulation couples several independently implemented simulation
//! units. One master drives every slave through a shared lifecycle:
//!
//! ```text
//! Idle → Registered → Configured → Initialized → Synchronizing → Running
//!                                                        ↓
//!                                          Stopped ← (stop) ← any active state
//! ```
//!
//! This crate holds the protocol logic for both ends. Neither [`Slave`] nor
//! [`Master`] performs I/O: outbound PDUs go through a [`Transport`], inbound
//! buffers are passed to `on_receive`, and the master reads time from an
//! [`Environment`]. The same code therefore runs under tokio, inside a
//! deterministic simulation, or in a fuzzer.
//!
//! # Invariants
//!
//! - Both ends consult the same acceptance table ([`lifecycle`]), so a
//!   command the master rejects locally is exactly one the slave would NACK.
//! - Sequence numbers are tracked per peer and per channel; a stale PDU is
//!   never processed twice.
//! - Library code never panics on peer input.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod detector;
pub mod env;
pub mod error;
pub mod lifecycle;
pub mod master;
pub mod slave;
pub mod transport;

pub use config::{MasterConfig, MissedPduPolicy, SlaveConfig};
pub use detector::{Channel, MissedPdu, MissedPduDetector, Observation, SequenceTracker};
pub use env::{Environment, SystemEnv};
pub use error::{CallbackError, ErrorReport, FailureReason, MasterError, SlaveFailure};
pub use master::{
    DataReceived, Master, MasterListeners, PendingCommand, SlaveDescription, SlaveDescriptor,
};
pub use slave::{Slave, SlaveHandlers, StepContext, StepOutput};
pub use transport::{Endpoint, RecordingTransport, Transport, TransportError};
