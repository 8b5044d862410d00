//! Typed payloads for every PDU.

mod configuration;
mod control;
mod data;
mod notification;
mod response;

pub use configuration::Configuration;
pub use control::{
    Command, Configure, DoStep, QueryLog, Register, Run, SetLogging, SetParameter, SetScope,
    SetSteps, SetTimeResolution,
};
pub use data::{InputOutput, Parameters};
pub use notification::{LogNotification, StateChanged, StepFinished};
pub use response::{Ack, ErrorAck, LogAck, Nack, StateAck};
