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

use super::core;
use super::engine::{LearningEngine, LearningState};
use crate::memory::knowledge::DEFAULT_CONFIDENCE;
use crate::memory::KnowledgeEntry;
use crate::nlu::{jaccard_similarity, Category};
use crate::runtime::events::EngineEvent;
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info};
const MISTAKE_REWARD: f64 = 0.5;
const PRUNE_CONFIDENCE: f64 = 0.1;
const PRUNE_FREQUENCY: u64 = 2;
const REINFORCEMENT_WINDOW: usize = 5;
const REINFORCEMENT_BONUS: f64 = 0.05;
const SIMILARITY_THRESHOLD: f64 = 0.3;
const CLUSTER_MIN_ITEMS: usize = 2;
const CLUSTER_CONFIDENCE: f64 = 0.6;
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceReview {
    pub penalized: Vec<String>,
    pub pruned: Vec<String>,
    pub average_confidence: f64,
}
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarInput {
    pub input: String,
    pub output: String,
    pub similarity: f64,
}
impl LearningState {
    fn analyze_mistakes(&mut self, threshold: usize) -> Vec<String> {
        let mut mistakes: IndexMap<Category, usize> = IndexMap::new();
        for record in self.history.iter().filter(|r| r.reward < MISTAKE_REWARD) {
            *mistakes.entry(record.category).or_insert(0) += 1;
        }
        let mut penalized = Vec::new();
        for (category, count) in mistakes {
            if count > threshold {
                let key = category.as_str();
                let current = self.confidence.get(key).copied().unwrap_or(DEFAULT_CONFIDENCE);
                self.confidence.insert(key.to_string(), core::penalize(current));
                penalized.push(key.to_string());
            }
        }
        penalized
    }
    fn optimize_performance(&mut self) -> Vec<String> {
        let pruned: Vec<String> = self
            .confidence
            .iter()
            .filter(|(key, confidence)| {
                **confidence < PRUNE_CONFIDENCE
                    && self.frequency.get(*key).copied().unwrap_or(0) < PRUNE_FREQUENCY
            })
            .map(|(key, _)| key.clone())
            .collect();
        for key in &pruned {
            self.confidence.shift_remove(key);
            self.frequency.shift_remove(key);
        }
        if !pruned.is_empty() {
            self.recompute_average();
        }
        pruned
    }
    fn adapt_to_new_patterns(&mut self, cutoff: DateTime<Utc>, burst: usize) -> bool {
        let recent = self.history.count_since(cutoff);
        if recent > burst {
            self.rate.accelerate();
            true
        } else {
            false
        }
    }
}
impl LearningEngine {
    fn burst_cutoff(&self) -> DateTime<Utc> {
        let secs = i64::try_from(self.config.burst_window_secs).unwrap_or(i64::MAX);
        let window = Duration::try_seconds(secs).unwrap_or(Duration::MAX);
        Utc::now()
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
    /// Penalizes every category with more low-reward records than the
    /// configured mistake threshold. Returns the penalized categories.
    pub fn analyze_mistakes(&self) -> Vec<String> {
        let penalized = self.state.lock().analyze_mistakes(self.config.mistake_threshold);
        if !penalized.is_empty() {
            info!(
                target: "stylus::learning",
                categories = ?penalized,
                "maintenance.mistakes_penalized"
            );
        }
        self.report_mistakes(&penalized);
        penalized
    }
    fn report_mistakes(&self, penalized: &[String]) {
        for category in penalized {
            self.events.emit(&EngineEvent::Error {
                detail: format!("Frequent mistakes in category: {category}"),
            });
        }
    }
    /// Removes patterns that are both weak and rarely seen.
    pub fn optimize_performance(&self) -> Vec<String> {
        let pruned = self.state.lock().optimize_performance();
        if !pruned.is_empty() {
            info!(target: "stylus::learning", patterns = ?pruned, "maintenance.patterns_pruned");
        }
        pruned
    }
    pub fn adapt_to_new_patterns(&self) -> bool {
        let cutoff = self.burst_cutoff();
        let mut state = self.state.lock();
        let adapted = state.adapt_to_new_patterns(cutoff, self.config.burst_events);
        if adapted {
            debug!(
                target: "stylus::learning",
                learning_rate = state.rate.value(),
                "maintenance.rate_accelerated"
            );
        }
        adapted
    }
    /// Periodic self-reinforcement pass. Returns `false` when there is not
    /// enough history to work with.
    pub fn continuous_learning(&self) -> bool {
        let cutoff = self.burst_cutoff();
        let progress = {
            let mut state = self.state.lock();
            if state.history.len() < 2 {
                return false;
            }
            let rewarded: Vec<Category> = state
                .history
                .recent(REINFORCEMENT_WINDOW)
                .filter(|record| record.reward > core::HIGH_REWARD)
                .map(|record| record.category)
                .collect();
            for category in rewarded {
                let key = category.as_str();
                let current = state.confidence.get(key).copied().unwrap_or(DEFAULT_CONFIDENCE);
                state
                    .confidence
                    .insert(key.to_string(), (current + REINFORCEMENT_BONUS).min(1.0));
            }
            state.recompute_average();
            state.adapt_to_new_patterns(cutoff, self.config.burst_events);
            state.total_learning_events * state.confidence.len() as u64 / 100
        };
        debug!(target: "stylus::learning", progress, "maintenance.continuous_pass");
        self.events.emit(&EngineEvent::progress(progress));
        true
    }
    /// Mistake analysis followed by pruning, under one lock acquisition.
    pub fn evaluate_performance(&self) -> PerformanceReview {
        let review = {
            let mut state = self.state.lock();
            let penalized = state.analyze_mistakes(self.config.mistake_threshold);
            let pruned = state.optimize_performance();
            state.recompute_average();
            PerformanceReview {
                penalized,
                pruned,
                average_confidence: state.average_confidence,
            }
        };
        info!(
            target: "stylus::learning",
            penalized = review.penalized.len(),
            pruned = review.pruned.len(),
            average_confidence = review.average_confidence,
            "maintenance.evaluated"
        );
        self.report_mistakes(&review.penalized);
        self.events.emit(&EngineEvent::ConfidenceUpdated {
            value: review.average_confidence,
        });
        review
    }
    /// History inputs whose token overlap with `input` exceeds 0.3, best first.
    pub fn find_similar_inputs(&self, input: &str) -> Vec<SimilarInput> {
        let state = self.state.lock();
        let mut similar: Vec<SimilarInput> = state
            .history
            .iter()
            .filter_map(|record| {
                let similarity = jaccard_similarity(input, &record.input);
                (similarity > SIMILARITY_THRESHOLD).then(|| SimilarInput {
                    input: record.input.clone(),
                    output: record.output.clone(),
                    similarity,
                })
            })
            .collect();
        similar.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        similar
    }
    pub fn find_similar_input(&self, input: &str) -> Option<SimilarInput> {
        self.find_similar_inputs(input).into_iter().next()
    }
    /// Turns every category with more than two remembered inputs into a
    /// `<category>_cluster` entry. Returns the keys written.
    pub fn cluster_history(&self) -> Vec<String> {
        let written = {
            let mut state = self.state.lock();
            let mut groups: IndexMap<Category, Vec<String>> = IndexMap::new();
            for record in state.history.iter() {
                let members = groups.entry(record.category).or_default();
                if !members.contains(&record.input) {
                    members.push(record.input.clone());
                }
            }
            let mut written = Vec::new();
            for (category, members) in groups {
                if members.len() > CLUSTER_MIN_ITEMS {
                    let key = format!("{category}_cluster");
                    let size = members.len();
                    let entry = KnowledgeEntry::with_patterns(members, CLUSTER_CONFIDENCE)
                        .flag("cluster_size", size);
                    state.knowledge.upsert(key.clone(), entry);
                    written.push(key);
                }
            }
            written
        };
        for key in &written {
            self.events.emit(&EngineEvent::KnowledgeUpdated { key: key.clone() });
        }
        written
    }
}
