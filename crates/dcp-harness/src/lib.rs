//! Deterministic simulation harness for DCP masters and slaves.
//!
//! Two ways to run the sans-IO managers from `dcp-core` under test:
//!
//! - [`World`] wires a master and its slaves to an in-memory [`SimNetwork`]
//!   with a virtual clock. Delivery, time and faults are under direct test
//!   control and reproducible from a seed.
//! - [`udp`] runs the same managers over turmoil UDP sockets, so latency and
//!   partitions come from a simulated network stack.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation for model-based
//! testing. Operations are applied to both the model and a real [`World`],
//! and their observable states are compared.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod model;
pub mod network;
pub mod sim_env;
pub mod udp;
pub mod world;

pub use model::{
    ModelCommand, ModelResponse, ModelSlave, ModelWorld, ObservableState, Operation,
    OperationError, OperationResult,
};
pub use network::{Envelope, FaultConfig, NetworkStats, SimNetwork, SimTransport};
pub use sim_env::{SimEnv, SimInstant};
pub use udp::{DCP_PORT, DriverError, Outbox, UdpMaster, run_slave};
pub use world::{EventLog, MasterEvent, World};
