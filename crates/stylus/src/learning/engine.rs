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

use super::core::{self, AdaptiveRate};
use crate::config::{LearningConfig, SeedEntry, StylusConfig};
use crate::error::Result;
use crate::memory::knowledge::DEFAULT_CONFIDENCE;
use crate::memory::persistence::{self, CURRENT_VERSION};
use crate::memory::{
    KnowledgeEntry, KnowledgeSink, KnowledgeSnapshot, KnowledgeStore, LearningHistory,
    LearningRecord, LoadReport, NetworkShape, PartialSnapshot, ScoringNetwork,
};
use crate::nlu::{extract_features, Category, CategoryClassifier};
use crate::runtime::events::{EngineEvent, EventBus, EventListener};
use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
pub const UNRECOGNIZED_PATTERN: &str = "Unrecognized pattern - I need to learn more.";
pub const HIGH_MATCH: &str = "High match with learned patterns.";
pub const PARTIAL_MATCH: &str = "Partial match with learned patterns.";
pub const WEAK_MATCH: &str = "Weak match - I may need more information.";
pub const UNKNOWN_PATTERN: &str = "Unknown pattern - learning something new.";
pub const CANNOT_PREDICT: &str = "I cannot predict an output for this input.";
/// Confidence assumed for a recognized pattern that has never been scored.
const UNSCORED_PATTERN_CONFIDENCE: f64 = 0.1;
#[derive(Debug)]
pub(super) struct LearningState {
    /// Set from the start of `learn` until its events have been dispatched.
    pub(super) learning: bool,
    pub(super) knowledge: KnowledgeStore,
    pub(super) confidence: IndexMap<String, f64>,
    pub(super) frequency: IndexMap<String, u64>,
    pub(super) network: ScoringNetwork,
    pub(super) history: LearningHistory,
    pub(super) total_learning_events: u64,
    pub(super) average_confidence: f64,
    pub(super) rate: AdaptiveRate,
    pub(super) current_category: Category,
}
impl LearningState {
    pub(super) fn recompute_average(&mut self) {
        let total: f64 = self.confidence.values().sum();
        self.average_confidence = total / self.confidence.len().max(1) as f64;
    }
    fn features(&self, text: &str) -> Vec<f64> {
        extract_features(text, self.network.shape().input)
    }
    pub(super) fn recognize(&self, input: &str, threshold: f64) -> Vec<String> {
        let mut patterns = self.knowledge.matching_keys(input);
        let scores = self.network.forward(&self.features(input));
        for (i, score) in scores.iter().enumerate() {
            if *score > threshold {
                let label = format!("neural_pattern_{i}");
                if !patterns.contains(&label) {
                    patterns.push(label);
                }
            }
        }
        patterns
    }
    fn score(&self, input: &str, patterns: &[String]) -> f64 {
        let rule_score = if patterns.is_empty() {
            0.0
        } else {
            patterns
                .iter()
                .map(|p| {
                    self.confidence
                        .get(p)
                        .copied()
                        .unwrap_or(UNSCORED_PATTERN_CONFIDENCE)
                })
                .sum::<f64>()
                / patterns.len() as f64
        };
        let scores = self.network.forward(&self.features(input));
        if scores.is_empty() {
            return core::clamp_unit(rule_score);
        }
        let network_score = scores.iter().sum::<f64>() / scores.len() as f64;
        core::clamp_unit((rule_score + network_score) / 2.0)
    }
}
/// Resets the learning flag once the in-flight `learn` has finished dispatching.
struct LearningFlag<'a>(&'a Mutex<LearningState>);
impl Drop for LearningFlag<'_> {
    fn drop(&mut self) {
        self.0.lock().learning = false;
    }
}
/// Owns every piece of learned state behind a single lock. Shared between
/// the foreground caller and the maintenance worker through an `Arc`.
#[derive(Debug)]
pub struct LearningEngine {
    pub(super) state: Mutex<LearningState>,
    pub(super) classifier: CategoryClassifier,
    pub(super) config: LearningConfig,
    pub(super) events: EventBus,
}
impl Default for LearningEngine {
    fn default() -> Self {
        Self::new(&StylusConfig::default())
    }
}
impl LearningEngine {
    pub fn new(config: &StylusConfig) -> Self {
        let shape = NetworkShape::new(
            config.network.input_size,
            config.network.hidden_size,
            config.network.output_size,
        );
        let mut knowledge = KnowledgeStore::new();
        for SeedEntry {
            key,
            patterns,
            confidence,
            facts,
        } in &config.seeds
        {
            let mut entry = KnowledgeEntry::with_patterns(patterns.clone(), *confidence);
            entry.facts = facts.clone();
            knowledge.upsert(key.clone(), entry);
        }
        let state = LearningState {
            learning: false,
            knowledge,
            confidence: IndexMap::new(),
            frequency: IndexMap::new(),
            network: ScoringNetwork::new(shape, config.network.seed),
            history: LearningHistory::new(config.learning.max_history),
            total_learning_events: 0,
            average_confidence: 0.0,
            rate: AdaptiveRate::from_config(&config.learning),
            current_category: Category::General,
        };
        info!(
            target: "stylus::learning",
            input = shape.input,
            hidden = shape.hidden,
            output = shape.output,
            seeds = config.seeds.len(),
            "engine.initialized"
        );
        Self {
            state: Mutex::new(state),
            classifier: CategoryClassifier::new(&config.classifier),
            config: config.learning.clone(),
            events: EventBus::new(),
        }
    }
    pub fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.events.subscribe(listener);
    }
    pub const fn events(&self) -> &EventBus {
        &self.events
    }
    pub fn classify(&self, text: &str) -> Category {
        self.classifier.classify(text)
    }
    pub fn is_learning(&self) -> bool {
        self.state.lock().learning
    }
    /// Records one (input, output, reward) interaction. Returns `false`
    /// without touching any state when another `learn` is still in flight,
    /// including one whose listeners are calling back into the engine.
    pub fn learn(&self, input: &str, output: &str, reward: f64) -> bool {
        {
            let mut state = self.state.lock();
            if state.learning {
                debug!(target: "stylus::learning", "learn.reentry_ignored");
                return false;
            }
            state.learning = true;
        }
        let _flag = LearningFlag(&self.state);
        let events = {
            let mut state = self.state.lock();
            self.apply_learning(&mut state, input, output, reward)
        };
        self.events.emit_all(&events);
        true
    }
    fn apply_learning(
        &self,
        state: &mut LearningState,
        input: &str,
        output: &str,
        reward: f64,
    ) -> Vec<EngineEvent> {
        let category = self.classifier.classify(input);
        let record = LearningRecord::new(
            input,
            output,
            state.current_category.as_str(),
            reward,
            category,
        );
        state.history.push(record);
        state.current_category = category;
        let shape = state.network.shape();
        let features = state.features(input);
        let target = extract_features(output, shape.output);
        let learning_rate = state.rate.value();
        if let Some(summary) = state.network.update(&features, &target, learning_rate) {
            debug!(
                target: "stylus::learning",
                output_error = summary.output_error,
                hidden_error = summary.hidden_error,
                "network.updated"
            );
        }
        let patterns = state.recognize(input, self.config.recognition_threshold);
        let mut events = Vec::with_capacity(patterns.len() + 2);
        for pattern in &patterns {
            *state.frequency.entry(pattern.clone()).or_insert(0) += 1;
            let current = state
                .confidence
                .get(pattern)
                .copied()
                .unwrap_or(DEFAULT_CONFIDENCE);
            state
                .confidence
                .insert(pattern.clone(), core::nudge_confidence(current, reward));
            events.push(EngineEvent::PatternRecognized {
                pattern: pattern.clone(),
            });
        }
        state.total_learning_events += 1;
        state.recompute_average();
        let key = category.as_str();
        let mut entry = state.knowledge.get(key).cloned().unwrap_or_default();
        entry.set_confidence(
            state
                .confidence
                .get(key)
                .copied()
                .unwrap_or(DEFAULT_CONFIDENCE),
        );
        entry.frequency = state.frequency.get(key).copied().unwrap_or(1);
        entry.metadata.insert("input".to_string(), json!(input));
        entry.metadata.insert("output".to_string(), json!(output));
        state.knowledge.upsert(key, entry);
        info!(
            target: "stylus::learning",
            category = key,
            reward,
            patterns = patterns.len(),
            total = state.total_learning_events,
            "learn.applied"
        );
        events.push(EngineEvent::progress(state.total_learning_events / 10));
        events.push(EngineEvent::KnowledgeUpdated {
            key: key.to_string(),
        });
        events
    }
    /// Q-style update on `<current category>_<action>`, followed by the
    /// reward-driven learning-rate adaptation. Returns the new value.
    pub fn reinforce(&self, action: &str, reward: f64) -> f64 {
        let (key, value) = {
            let mut state = self.state.lock();
            let key = format!("{}_{action}", state.current_category);
            let current = state.confidence.get(&key).copied().unwrap_or(0.0);
            let value = core::q_update(current, reward, state.rate.value());
            state.confidence.insert(key.clone(), value);
            state.rate.after_reward(reward);
            (key, value)
        };
        debug!(target: "stylus::learning", key = %key, value, reward, "reinforce.applied");
        self.events.emit(&EngineEvent::ConfidenceUpdated { value });
        value
    }
    /// Groups raw items by category and stores one discovered entry per
    /// category. Returns the categories written, in first-seen order.
    pub fn unsupervised_learn<I, S>(&self, items: I) -> Vec<Category>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut clusters: IndexMap<Category, Vec<String>> = IndexMap::new();
        for item in items {
            let item = item.as_ref();
            clusters
                .entry(self.classifier.classify(item))
                .or_default()
                .push(item.to_string());
        }
        let mut events = Vec::with_capacity(clusters.len() + 1);
        {
            let mut state = self.state.lock();
            for (category, members) in &clusters {
                let entry =
                    KnowledgeEntry::with_patterns(members.clone(), 0.6).flag("discovered", true);
                state.knowledge.upsert(category.as_str(), entry);
                events.push(EngineEvent::KnowledgeUpdated {
                    key: category.as_str().to_string(),
                });
            }
        }
        events.push(EngineEvent::LearningComplete);
        self.events.emit_all(&events);
        clusters.into_keys().collect()
    }
    pub fn recognize_patterns(&self, input: &str) -> Vec<String> {
        let patterns = self
            .state
            .lock()
            .recognize(input, self.config.recognition_threshold);
        for pattern in &patterns {
            self.events.emit(&EngineEvent::PatternRecognized {
                pattern: pattern.clone(),
            });
        }
        patterns
    }
    pub fn predict(&self, input: &str) -> String {
        let state = self.state.lock();
        let patterns = state.recognize(input, self.config.recognition_threshold);
        if patterns.is_empty() {
            return UNRECOGNIZED_PATTERN.to_string();
        }
        let score = state.score(input, &patterns);
        if score > 0.0 {
            let best = state
                .history
                .iter()
                .find(|record| {
                    !record.output.is_empty()
                        && patterns.iter().any(|p| p == record.category.as_str())
                });
            if let Some(record) = best {
                return record.output.clone();
            }
        }
        let scores = state.network.forward(&state.features(input));
        let Some(first) = scores.first().copied() else {
            return CANNOT_PREDICT.to_string();
        };
        let bucket = if first > 0.8 {
            HIGH_MATCH
        } else if first > 0.6 {
            PARTIAL_MATCH
        } else if first > 0.4 {
            WEAK_MATCH
        } else {
            UNKNOWN_PATTERN
        };
        bucket.to_string()
    }
    /// Mean stored confidence over the patterns recognized in `input`,
    /// averaged with the mean network score. The candidate output does not
    /// influence the result.
    pub fn confidence(&self, input: &str, _output: &str) -> f64 {
        let state = self.state.lock();
        let patterns = state.recognize(input, self.config.recognition_threshold);
        state.score(input, &patterns)
    }
    pub fn forward_text(&self, text: &str) -> Vec<f64> {
        let state = self.state.lock();
        state.network.forward(&state.features(text))
    }
    pub fn train_network(&self, pairs: &[(String, String)]) -> usize {
        let mut state = self.state.lock();
        let shape = state.network.shape();
        let inputs: Vec<Vec<f64>> = pairs
            .iter()
            .map(|(i, _)| extract_features(i, shape.input))
            .collect();
        let targets: Vec<Vec<f64>> = pairs
            .iter()
            .map(|(_, o)| extract_features(o, shape.output))
            .collect();
        let learning_rate = state.rate.value();
        state.network.train_batch(&inputs, &targets, learning_rate)
    }
    pub fn upsert_knowledge(&self, key: &str, entry: KnowledgeEntry) {
        self.state.lock().knowledge.upsert(key, entry);
        self.events.emit(&EngineEvent::KnowledgeUpdated {
            key: key.to_string(),
        });
    }
    /// Edits (or creates) the entry under `key` in place.
    pub fn update_knowledge<F>(&self, key: &str, edit: F)
    where
        F: FnOnce(&mut KnowledgeEntry),
    {
        {
            let mut state = self.state.lock();
            if !state.knowledge.contains(key) {
                state.knowledge.upsert(key, KnowledgeEntry::default());
            }
            if let Some(entry) = state.knowledge.get_mut(key) {
                edit(entry);
                let confidence = entry.confidence;
                entry.set_confidence(confidence);
            }
        }
        self.events.emit(&EngineEvent::KnowledgeUpdated {
            key: key.to_string(),
        });
    }
    pub fn knowledge(&self, key: &str) -> Option<KnowledgeEntry> {
        self.state.lock().knowledge.get(key).cloned()
    }
    pub fn knowledge_keys(&self) -> Vec<String> {
        self.state.lock().knowledge.keys().cloned().collect()
    }
    /// Sets the bookkeeping for one pattern directly.
    pub fn record_pattern(&self, pattern: &str, confidence: f64, frequency: u64) {
        let mut state = self.state.lock();
        state
            .confidence
            .insert(pattern.to_string(), core::clamp_unit(confidence));
        state.frequency.insert(pattern.to_string(), frequency);
        state.recompute_average();
    }
    pub fn pattern_confidence(&self, pattern: &str) -> Option<f64> {
        self.state.lock().confidence.get(pattern).copied()
    }
    pub fn pattern_frequency(&self, pattern: &str) -> Option<u64> {
        self.state.lock().frequency.get(pattern).copied()
    }
    pub fn confidence_map(&self) -> IndexMap<String, f64> {
        self.state.lock().confidence.clone()
    }
    pub fn frequency_map(&self) -> IndexMap<String, u64> {
        self.state.lock().frequency.clone()
    }
    pub fn total_learning_events(&self) -> u64 {
        self.state.lock().total_learning_events
    }
    pub fn average_confidence(&self) -> f64 {
        self.state.lock().average_confidence
    }
    pub fn learning_rate(&self) -> f64 {
        self.state.lock().rate.value()
    }
    pub fn current_category(&self) -> Category {
        self.state.lock().current_category
    }
    pub fn history_len(&self) -> usize {
        self.state.lock().history.len()
    }
    pub fn recent_records(&self, n: usize) -> Vec<LearningRecord> {
        self.state.lock().history.recent(n).cloned().collect()
    }
    pub fn network_shape(&self) -> NetworkShape {
        self.state.lock().network.shape()
    }
    pub fn snapshot(&self) -> KnowledgeSnapshot {
        let state = self.state.lock();
        KnowledgeSnapshot {
            version: CURRENT_VERSION,
            saved_at: Utc::now(),
            knowledge_base: state.knowledge.as_map().clone(),
            pattern_confidence: state.confidence.clone(),
            pattern_frequency: state.frequency.clone(),
            neural_shape: state.network.shape(),
            neural_weights: vec![
                state.network.weights_in().to_vec(),
                state.network.weights_out().to_vec(),
            ],
            neural_biases: state.network.biases().to_vec(),
            total_learning_events: state.total_learning_events,
            average_confidence: state.average_confidence,
            learning_rate: state.rate.value(),
        }
    }
    /// Snapshots under the lock and writes after releasing it.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let snapshot = self.snapshot();
        persistence::write_snapshot(&path, &snapshot)?;
        info!(
            target: "stylus::learning",
            path = %path.as_ref().display(),
            events = snapshot.total_learning_events,
            "knowledge.saved"
        );
        Ok(())
    }
    /// Reads outside the lock and applies whatever sections parse. A missing
    /// file leaves the engine untouched.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<LoadReport> {
        let Some(partial) = persistence::read_snapshot(&path)? else {
            debug!(target: "stylus::learning", path = %path.as_ref().display(), "knowledge.absent");
            return Ok(LoadReport::default());
        };
        let report = self.apply_snapshot(partial);
        info!(
            target: "stylus::learning",
            path = %path.as_ref().display(),
            applied = report.applied.len(),
            skipped = report.skipped.len(),
            "knowledge.loaded"
        );
        Ok(report)
    }
    pub fn apply_snapshot(&self, partial: PartialSnapshot) -> LoadReport {
        let mut report = LoadReport {
            found: true,
            applied: Vec::new(),
            skipped: partial.skipped,
        };
        let mut keys = Vec::new();
        {
            let mut state = self.state.lock();
            if let Some(entries) = partial.knowledge_base {
                for (key, mut entry) in entries {
                    keys.push(key.clone());
                    entry.set_confidence(entry.confidence);
                    state.knowledge.upsert(key, entry);
                }
                report.applied.push("knowledge_base".to_string());
            }
            if let Some(confidence) = partial.pattern_confidence {
                for (key, value) in confidence {
                    state.confidence.insert(key, core::clamp_unit(value));
                }
                report.applied.push("pattern_confidence".to_string());
            }
            if let Some(frequency) = partial.pattern_frequency {
                state.frequency.extend(frequency);
                report.applied.push("pattern_frequency".to_string());
            }
            let current = state.network.shape();
            let shape_fits = partial.neural_shape.map_or(true, |shape| shape == current);
            if !shape_fits {
                warn!(
                    target: "stylus::learning",
                    ?current,
                    stored = ?partial.neural_shape,
                    "knowledge.network_shape_mismatch"
                );
            }
            if let Some(layers) = partial.neural_weights {
                let restored = shape_fits
                    && matches!(
                        layers.as_slice(),
                        [weights_in, weights_out]
                            if state.network.restore_weights(weights_in, weights_out)
                    );
                if restored {
                    report.applied.push("neural_weights".to_string());
                } else {
                    report.skipped.push("neural_weights".to_string());
                }
            }
            if let Some(biases) = partial.neural_biases {
                if shape_fits && state.network.restore_biases(&biases) {
                    report.applied.push("neural_biases".to_string());
                } else {
                    report.skipped.push("neural_biases".to_string());
                }
            }
            if let Some(total) = partial.total_learning_events {
                state.total_learning_events = total;
                report.applied.push("total_learning_events".to_string());
            }
            if let Some(average) = partial.average_confidence {
                state.average_confidence = core::clamp_unit(average);
                report.applied.push("average_confidence".to_string());
            }
            if let Some(rate) = partial.learning_rate {
                state.rate.set(rate);
                report.applied.push("learning_rate".to_string());
            }
        }
        for key in keys {
            self.events.emit(&EngineEvent::KnowledgeUpdated { key });
        }
        if !report.is_clean() {
            self.events.emit(&EngineEvent::Error {
                detail: format!(
                    "skipped damaged knowledge sections: {}",
                    report.skipped.join(", ")
                ),
            });
        }
        report
    }
}
impl KnowledgeSink for LearningEngine {
    fn fold_knowledge(&self, key: &str, entry: KnowledgeEntry) {
        self.upsert_knowledge(key, entry);
    }
}
