//! Manager configuration.
//!
//! Plain structs with sensible defaults. Both derive `serde` so embedders can
//! load them from whatever format they already use.

use std::time::Duration;

use bitflags::bitflags;
use dcp_proto::{LogLevel, LogMode, OpMode};
use serde::{Deserialize, Serialize};

use crate::detector::Channel;

bitflags! {
    /// Channels on which a missed PDU drives the receiver to `Error`.
    ///
    /// Misses on channels not in the set are only reported to listeners.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MissedPduPolicy: u8 {
        /// Gaps in commands, responses or notifications.
        const CONTROL = 0b001;
        /// Gaps in `DAT_parameter`.
        const PARAMETER = 0b010;
        /// Gaps or absence of `DAT_input_output`.
        const INPUT_OUTPUT = 0b100;
    }
}

impl MissedPduPolicy {
    /// Returns true if a miss on `channel` is fatal.
    pub fn is_fatal(self, channel: Channel) -> bool {
        self.contains(match channel {
            Channel::Control => Self::CONTROL,
            Channel::Parameter => Self::PARAMETER,
            Channel::InputOutput => Self::INPUT_OUTPUT,
        })
    }
}

/// Slave configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaveConfig {
    /// Identity checked against `STC_register`.
    pub uuid: u128,
    /// Human readable name, used in log output.
    pub name: String,
    /// Channels whose misses are fatal.
    pub fatal_missed_pdus: MissedPduPolicy,
    /// Report a missed input/output PDU when a step starts on a steps
    /// boundary without inputs received since the previous boundary.
    pub require_inputs_every_step: bool,
    /// Reject `STC_configure` until `CFG_set_time_res` has been received.
    pub require_time_resolution: bool,
    /// Operating modes accepted in `STC_register`.
    pub op_modes: Vec<OpMode>,
    /// Parameter names `CFG_set_parameter` may preset. Empty accepts any.
    pub known_parameters: Vec<String>,
    /// Least severe level reported until the master says otherwise.
    pub log_level: LogLevel,
    /// Initial log delivery mode.
    pub log_mode: LogMode,
    /// Entries kept for `INF_log` in on-request mode. Oldest are dropped.
    pub log_buffer_capacity: usize,
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self {
            uuid: 0,
            name: String::from("slave"),
            fatal_missed_pdus: MissedPduPolicy::empty(),
            require_inputs_every_step: false,
            require_time_resolution: false,
            op_modes: vec![OpMode::NonRealTime],
            known_parameters: Vec::new(),
            log_level: LogLevel::Warning,
            log_mode: LogMode::OnNotification,
            log_buffer_capacity: 256,
        }
    }
}

impl SlaveConfig {
    /// Default configuration for the slave with `uuid`.
    pub fn with_uuid(uuid: u128) -> Self {
        Self { uuid, ..Self::default() }
    }
}

/// Master configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    /// Time to wait for the response to any command but `STC_do_step`.
    pub command_timeout: Duration,
    /// Time to wait for the response to `STC_do_step`.
    pub step_timeout: Duration,
    /// Channels whose misses drive the slave descriptor to `Error`.
    pub fatal_missed_pdus: MissedPduPolicy,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(1),
            step_timeout: Duration::from_secs(5),
            fatal_missed_pdus: MissedPduPolicy::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_non_fatal() {
        let config = SlaveConfig::default();
        for channel in Channel::ALL {
            assert!(!config.fatal_missed_pdus.is_fatal(channel));
        }
    }

    #[test]
    fn policy_maps_channels() {
        let policy = MissedPduPolicy::CONTROL | MissedPduPolicy::INPUT_OUTPUT;
        assert!(policy.is_fatal(Channel::Control));
        assert!(!policy.is_fatal(Channel::Parameter));
        assert!(policy.is_fatal(Channel::InputOutput));
    }

    #[test]
    fn master_config_survives_cbor() {
        let config = MasterConfig {
            command_timeout: Duration::from_millis(250),
            step_timeout: Duration::from_secs(2),
            fatal_missed_pdus: MissedPduPolicy::PARAMETER,
        };

        let mut bytes = Vec::new();
        ciborium::into_writer(&config, &mut bytes).unwrap();
        let decoded: MasterConfig = ciborium::from_reader(bytes.as_slice()).unwrap();

        assert_eq!(decoded, config);
    }

    #[test]
    fn slave_config_survives_cbor() {
        let config = SlaveConfig {
            uuid: 0x1234,
            name: "thermal".into(),
            log_mode: LogMode::OnRequest,
            log_level: LogLevel::Debug,
            op_modes: vec![OpMode::SoftRealTime, OpMode::NonRealTime],
            known_parameters: vec!["gain".into()],
            ..SlaveConfig::default()
        };

        let mut bytes = Vec::new();
        ciborium::into_writer(&config, &mut bytes).unwrap();
        let decoded: SlaveConfig = ciborium::from_reader(bytes.as_slice()).unwrap();

        assert_eq!(decoded, config);
    }
}
