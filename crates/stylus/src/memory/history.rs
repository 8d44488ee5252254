// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

use crate::nlu::Category;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningRecord {
    pub input: String,
    pub output: String,
    pub context: String,
    pub reward: f64,
    pub timestamp: DateTime<Utc>,
    pub category: Category,
}
impl LearningRecord {
    pub fn new(input: &str, output: &str, context: &str, reward: f64, category: Category) -> Self {
        Self {
            input: input.to_string(),
            output: output.to_string(),
            context: context.to_string(),
            reward,
            timestamp: Utc::now(),
            category,
        }
    }
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
/// Arrival-ordered ring buffer of learning records; the oldest record is
/// evicted once `capacity` is reached.
#[derive(Debug, Clone)]
pub struct LearningHistory {
    records: VecDeque<LearningRecord>,
    capacity: usize,
}
impl LearningHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
        }
    }
    pub fn push(&mut self, record: LearningRecord) -> Option<LearningRecord> {
        self.records.push_back(record);
        if self.records.len() > self.capacity {
            self.remove_oldest()
        } else {
            None
        }
    }
    fn remove_oldest(&mut self) -> Option<LearningRecord> {
        self.records.pop_front()
    }
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &LearningRecord> {
        self.records.iter()
    }
    /// Up to `n` most recent records, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &LearningRecord> {
        self.records.iter().skip(self.records.len().saturating_sub(n))
    }
    pub fn count_since(&self, cutoff: DateTime<Utc>) -> usize {
        self.records
            .iter()
            .filter(|record| record.timestamp >= cutoff)
            .count()
    }
    pub fn clear(&mut self) {
        self.records.clear();
    }
}
