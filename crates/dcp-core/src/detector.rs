//! Missed-PDU detection.
//!
//! Every sequenced PDU stream (control, parameter, input/output) is tracked
//! per peer. The tracker compares each received sequence number with the last
//! one seen:
//!
//! - `last + 1`: in order
//! - greater: gap, the PDUs in between were lost; the received value becomes
//!   the new baseline
//! - less or equal: duplicate or stale, the caller drops the PDU
//!
//! The detector never retries or requests retransmission.
//!
//! # Invariants
//!
//! - `last_seen` never decreases, no matter what is observed.

use std::fmt;

/// Sequenced stream a PDU belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    /// Commands, responses and notifications.
    Control,
    /// `DAT_parameter`.
    Parameter,
    /// `DAT_input_output`, sequenced by step number.
    InputOutput,
}

impl Channel {
    /// All channels.
    pub const ALL: [Self; 3] = [Self::Control, Self::Parameter, Self::InputOutput];

    fn index(self) -> usize {
        match self {
            Self::Control => 0,
            Self::Parameter => 1,
            Self::InputOutput => 2,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Control => "control",
            Self::Parameter => "parameter",
            Self::InputOutput => "input/output",
        })
    }
}

/// Result of observing one sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First value on this channel, taken as baseline.
    First,
    /// Exactly one past the previous value.
    InOrder,
    /// Values between `expected` and `actual` were never seen.
    Gap {
        /// Next value that should have arrived.
        expected: u32,
        /// Value that arrived instead.
        actual: u32,
    },
    /// Duplicate or reordered PDU.
    Stale {
        /// Highest value seen so far.
        last_seen: u32,
        /// Value that arrived.
        actual: u32,
    },
}

impl Observation {
    /// Returns true if the PDU should be processed.
    pub fn is_accepted(self) -> bool {
        !matches!(self, Self::Stale { .. })
    }
}

/// Notification that a sequenced PDU went missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissedPdu {
    /// A sequence gap was observed.
    Gap {
        /// Stream with the gap.
        channel: Channel,
        /// Next value that should have arrived.
        expected: u32,
        /// Value that arrived instead.
        actual: u32,
    },
    /// No PDU arrived on `channel` before the step boundary.
    Absent {
        /// Stream that stayed silent.
        channel: Channel,
        /// Step that completed without the PDU.
        step: u32,
    },
}

impl MissedPdu {
    /// Stream the miss was observed on.
    pub fn channel(&self) -> Channel {
        match self {
            Self::Gap { channel, .. } | Self::Absent { channel, .. } => *channel,
        }
    }
}

/// Tracks the highest sequence number seen on one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceTracker {
    last_seen: Option<u32>,
}

impl SequenceTracker {
    /// Create a tracker with no baseline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest value observed since the last reset.
    pub fn last_seen(&self) -> Option<u32> {
        self.last_seen
    }

    /// Classify `seq` and advance the baseline if it is newer.
    pub fn observe(&mut self, seq: u32) -> Observation {
        let Some(last) = self.last_seen else {
            self.last_seen = Some(seq);
            return Observation::First;
        };

        if seq <= last {
            return Observation::Stale { last_seen: last, actual: seq };
        }

        // seq > last, so last + 1 cannot overflow
        self.last_seen = Some(seq);
        let expected = last + 1;
        if seq == expected {
            Observation::InOrder
        } else {
            Observation::Gap { expected, actual: seq }
        }
    }

    /// Forget the baseline. The next observation is `First`.
    pub fn reset(&mut self) {
        self.last_seen = None;
    }
}

/// One [`SequenceTracker`] per [`Channel`] for a single peer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MissedPduDetector {
    trackers: [SequenceTracker; 3],
}

impl MissedPduDetector {
    /// Create a detector with no baselines.
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe `seq` on `channel`.
    pub fn observe(&mut self, channel: Channel, seq: u32) -> Observation {
        self.trackers[channel.index()].observe(seq)
    }

    /// Highest value observed on `channel`.
    pub fn last_seen(&self, channel: Channel) -> Option<u32> {
        self.trackers[channel.index()].last_seen()
    }

    /// Forget the baseline of `channel`.
    pub fn reset(&mut self, channel: Channel) {
        self.trackers[channel.index()].reset();
    }

    /// Set `channel`'s baseline to `seq` as if it had just been observed.
    pub fn rebase(&mut self, channel: Channel, seq: u32) {
        let tracker = &mut self.trackers[channel.index()];
        tracker.reset();
        tracker.observe(seq);
    }

    /// Forget every baseline.
    pub fn reset_all(&mut self) {
        self.trackers = Default::default();
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn first_value_is_baseline() {
        let mut tracker = SequenceTracker::new();
        assert_eq!(tracker.observe(42), Observation::First);
        assert_eq!(tracker.last_seen(), Some(42));
    }

    #[test]
    fn gap_reports_expected_and_actual() {
        let mut tracker = SequenceTracker::new();
        tracker.observe(3);

        assert_eq!(tracker.observe(5), Observation::Gap { expected: 4, actual: 5 });
        assert_eq!(tracker.observe(6), Observation::InOrder);
    }

    #[test]
    fn stale_values_do_not_move_baseline() {
        let mut tracker = SequenceTracker::new();
        tracker.observe(10);

        assert_eq!(tracker.observe(10), Observation::Stale { last_seen: 10, actual: 10 });
        assert_eq!(tracker.observe(4), Observation::Stale { last_seen: 10, actual: 4 });
        assert_eq!(tracker.last_seen(), Some(10));
        assert!(!tracker.observe(9).is_accepted());
    }

    #[test]
    fn channels_are_independent() {
        let mut detector = MissedPduDetector::new();
        detector.observe(Channel::Control, 7);
        detector.observe(Channel::InputOutput, 1);

        assert_eq!(detector.observe(Channel::InputOutput, 2), Observation::InOrder);
        assert_eq!(detector.last_seen(Channel::Control), Some(7));
        assert_eq!(detector.last_seen(Channel::Parameter), None);
    }

    #[test]
    fn rebase_replaces_baseline() {
        let mut detector = MissedPduDetector::new();
        detector.observe(Channel::Control, 50);
        detector.rebase(Channel::Control, 0);

        assert_eq!(detector.observe(Channel::Control, 1), Observation::InOrder);
    }

    proptest! {
        #[test]
        fn prop_last_seen_never_decreases(seqs in prop::collection::vec(any::<u32>(), 0..64)) {
            let mut tracker = SequenceTracker::new();
            let mut previous = None;

            for seq in seqs {
                let observation = tracker.observe(seq);
                let current = tracker.last_seen();

                prop_assert!(current >= previous);
                if let Observation::Stale { .. } = observation {
                    prop_assert_eq!(current, previous);
                }
                previous = current;
            }
        }

        #[test]
        fn prop_gaps_account_for_every_missing_value(
            steps in prop::collection::vec(1u32..5, 1..32)
        ) {
            let mut tracker = SequenceTracker::new();
            tracker.observe(0);
            let mut seq = 0u32;
            let mut missing = 0u32;

            for step in &steps {
                seq += step;
                if let Observation::Gap { expected, actual } = tracker.observe(seq) {
                    missing += actual - expected;
                }
            }

            let received = u32::try_from(steps.len()).unwrap();
            prop_assert_eq!(missing + received, seq);
        }
    }
}
