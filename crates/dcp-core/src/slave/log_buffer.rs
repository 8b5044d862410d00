//! Log filtering and the on-request buffer.

use std::collections::{BTreeMap, VecDeque};

use dcp_proto::{LogEntry, LogLevel, LogMode};

/// Category value meaning "every category".
pub const ALL_CATEGORIES: u8 = 0;

#[derive(Debug)]
pub(crate) struct LogBuffer {
    default_level: LogLevel,
    levels: BTreeMap<u8, LogLevel>,
    mode: LogMode,
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl LogBuffer {
    pub fn new(level: LogLevel, mode: LogMode, capacity: usize) -> Self {
        Self {
            default_level: level,
            levels: BTreeMap::new(),
            mode,
            entries: VecDeque::new(),
            capacity,
        }
    }

    pub fn mode(&self) -> LogMode {
        self.mode
    }

    /// Apply `CFG_set_logging`. Category 0 resets every per-category level.
    pub fn configure(&mut self, category: u8, level: LogLevel, mode: LogMode) {
        if category == ALL_CATEGORIES {
            self.default_level = level;
            self.levels.clear();
        } else {
            self.levels.insert(category, level);
        }
        self.mode = mode;
    }

    pub fn admits(&self, level: LogLevel, category: u8) -> bool {
        let threshold = self.levels.get(&category).copied().unwrap_or(self.default_level);
        level.passes(threshold)
    }

    pub fn push(&mut self, entry: LogEntry) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Remove up to `max` of the oldest entries in `category`.
    pub fn drain(&mut self, category: u8, max: usize) -> Vec<LogEntry> {
        let mut taken = Vec::new();
        let mut kept = VecDeque::with_capacity(self.entries.len());

        for entry in self.entries.drain(..) {
            let matches = category == ALL_CATEGORIES || entry.category == category;
            if matches && taken.len() < max {
                taken.push(entry);
            } else {
                kept.push_back(entry);
            }
        }

        self.entries = kept;
        taken
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}
