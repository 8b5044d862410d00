//! Model-based testing infrastructure.
//!
//! [`ModelWorld`] is a reference implementation of the master's bookkeeping
//! over a perfect network. Property tests apply the same random
//! [`Operation`] sequence to the model and to a real [`crate::World`] and
//! require identical results and identical observable state.

mod operation;
mod slave;
mod world;

pub use operation::{ModelCommand, Operation, OperationError, OperationResult};
pub use slave::{ModelResponse, ModelSlave};
pub use world::{COMMAND_TIMEOUT_MS, ModelWorld, ObservableState, STEP_TIMEOUT_MS};
