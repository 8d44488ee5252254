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

use crate::config::LearningConfig;
use serde::{Deserialize, Serialize};
pub const MIN_LEARNING_RATE: f64 = 0.001;
pub const MAX_LEARNING_RATE: f64 = 0.1;
pub const CONFIDENCE_STEP: f64 = 0.1;
pub const MISTAKE_PENALTY: f64 = 0.2;
pub const PENALTY_FLOOR: f64 = 0.1;
pub const HIGH_REWARD: f64 = 0.7;
pub const LOW_REWARD: f64 = 0.3;
const DECAY: f64 = 0.99;
const GROWTH: f64 = 1.01;
const BURST_GROWTH: f64 = 1.1;
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
/// Moves a confidence by `(reward - 0.5) * 0.1`.
pub fn nudge_confidence(current: f64, reward: f64) -> f64 {
    clamp_unit(current + (sanitize_reward(reward) - 0.5) * CONFIDENCE_STEP)
}
pub fn q_update(current: f64, reward: f64, learning_rate: f64) -> f64 {
    clamp_unit(current + learning_rate * (sanitize_reward(reward) - current))
}
pub fn penalize(current: f64) -> f64 {
    clamp_unit((current - MISTAKE_PENALTY).max(PENALTY_FLOOR))
}
fn sanitize_reward(reward: f64) -> f64 {
    if reward.is_nan() {
        0.0
    } else {
        reward
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveRate {
    value: f64,
    min: f64,
    max: f64,
    burst_ceiling: f64,
    adaptive: bool,
}
impl Default for AdaptiveRate {
    fn default() -> Self {
        Self::from_config(&LearningConfig::default())
    }
}
impl AdaptiveRate {
    pub fn from_config(config: &LearningConfig) -> Self {
        let min = config.min_learning_rate.max(0.0);
        let max = config.max_learning_rate.max(min);
        let mut rate = Self {
            value: min,
            min,
            max,
            burst_ceiling: config.burst_rate_ceiling,
            adaptive: config.adaptive,
        };
        rate.set(config.learning_rate);
        rate
    }
    pub const fn value(&self) -> f64 {
        self.value
    }
    pub fn set(&mut self, value: f64) {
        if value.is_finite() {
            self.value = value.clamp(self.min, self.max);
        }
    }
    /// Decays the rate after a high reward and grows it after a low one.
    pub fn after_reward(&mut self, reward: f64) -> f64 {
        if self.adaptive {
            if reward > HIGH_REWARD {
                self.value = (self.value * DECAY).max(self.min);
            } else if reward < LOW_REWARD {
                self.value = (self.value * GROWTH).min(self.max);
            }
        }
        self.value
    }
    /// Speeds learning up during a burst of interactions; the result is
    /// capped at the burst ceiling.
    pub fn accelerate(&mut self) -> f64 {
        self.value = (self.value * BURST_GROWTH).min(self.burst_ceiling);
        self.value
    }
}
