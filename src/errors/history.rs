use std::collections::{HashMap, VecDeque};

use crate::constants::ERROR_HISTORY_CAPACITY;
use crate::errors::classifier::{ClassifiedError, ErrorKind};

/// Bounded log of classified errors. When full, the oldest entry is
/// evicted to make room for the newest.
#[derive(Debug, Clone)]
pub struct ErrorHistory {
    entries: VecDeque<ClassifiedError>,
    capacity: usize,
}

impl Default for ErrorHistory {
    fn default() -> Self {
        Self::new(ERROR_HISTORY_CAPACITY)
    }
}

impl ErrorHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, error: ClassifiedError) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(error);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ClassifiedError> {
        self.entries.iter()
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<&ClassifiedError> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).collect()
    }

    pub fn count_by_kind(&self) -> HashMap<ErrorKind, usize> {
        let mut counts = HashMap::new();
        for entry in &self.entries {
            *counts.entry(entry.kind).or_insert(0) += 1;
        }
        counts
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
