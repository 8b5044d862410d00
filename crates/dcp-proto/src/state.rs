//! Slave lifecycle states.

use std::fmt;

use serde_repr::{Deserialize_repr, Serialize_repr};

/// Lifecycle state of a slave, as held by the slave and mirrored by the
/// master.
///
/// `Configuring`, `Initializing` and `Stopping` are transient: a slave enters
/// them before running the matching callback and leaves them when it returns.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize_repr,
    Deserialize_repr,
)]
#[repr(u8)]
pub enum ProtocolState {
    /// Not registered with any master.
    #[default]
    Idle = 0x00,
    /// Registered, waiting for configuration.
    Registered = 0x01,
    /// Running the configure callback.
    Configuring = 0x04,
    /// Configuration accepted.
    Configured = 0x05,
    /// Running the initialize callback.
    Initializing = 0x06,
    /// Initial outputs computed.
    Initialized = 0x07,
    /// Stepping until the slave reports it is synchronized.
    Synchronizing = 0x09,
    /// Stepping in lock-step with the master.
    Running = 0x0B,
    /// Running the stop callback.
    Stopping = 0x0F,
    /// Simulation finished.
    Stopped = 0x10,
    /// A callback failed or the slave reported an error.
    Error = 0x11,
}

impl ProtocolState {
    /// Every state, in wire order.
    pub const ALL: [Self; 11] = [
        Self::Idle,
        Self::Registered,
        Self::Configuring,
        Self::Configured,
        Self::Initializing,
        Self::Initialized,
        Self::Synchronizing,
        Self::Running,
        Self::Stopping,
        Self::Stopped,
        Self::Error,
    ];

    /// Convert a raw state id.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|s| *s as u8 == value)
    }

    /// Raw state id.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// State only observable while a callback runs.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Configuring | Self::Initializing | Self::Stopping)
    }

    /// Input/output and parameter data may flow in this state.
    pub fn accepts_data(self) -> bool {
        matches!(self, Self::Initialized | Self::Synchronizing | Self::Running)
    }
}

impl fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_ids_round_trip() {
        for s in ProtocolState::ALL {
            assert_eq!(ProtocolState::from_u8(s.to_u8()), Some(s));
        }
        assert_eq!(ProtocolState::from_u8(0x02), None);
    }

    #[test]
    fn only_stepping_states_accept_data() {
        let accepting: Vec<_> =
            ProtocolState::ALL.into_iter().filter(|s| s.accepts_data()).collect();
        assert_eq!(
            accepting,
            vec![ProtocolState::Initialized, ProtocolState::Synchronizing, ProtocolState::Running]
        );
    }
}
