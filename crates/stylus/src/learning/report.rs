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

use super::engine::LearningEngine;
use serde::Serialize;
use std::fmt::Write as _;
const REPORT_TOP_PATTERNS: usize = 10;
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningStats {
    pub total_learning_events: u64,
    pub average_confidence: f64,
    pub learning_rate: f64,
    pub known_patterns: usize,
    pub knowledge_entries: usize,
    pub history_len: usize,
}
impl LearningEngine {
    pub fn stats(&self) -> LearningStats {
        let state = self.state.lock();
        LearningStats {
            total_learning_events: state.total_learning_events,
            average_confidence: state.average_confidence,
            learning_rate: state.rate.value(),
            known_patterns: state.confidence.len(),
            knowledge_entries: state.knowledge.len(),
            history_len: state.history.len(),
        }
    }
    /// Top `n` patterns by frequency, descending. Equal frequencies keep
    /// the order in which the patterns were first seen.
    pub fn most_learned_patterns(&self, n: usize) -> Vec<(String, u64)> {
        let mut ranked: Vec<(String, u64)> = self
            .state
            .lock()
            .frequency
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.truncate(n);
        ranked
    }
    pub fn learning_report(&self) -> String {
        let stats = self.stats();
        let top = self.most_learned_patterns(REPORT_TOP_PATTERNS);
        let mut report = String::from("=== Learning report ===\n\n");
        let _ = writeln!(report, "Learning events: {}", stats.total_learning_events);
        let _ = writeln!(report, "Average confidence: {:.1}%", stats.average_confidence * 100.0);
        let _ = writeln!(report, "Learning rate: {:.4}", stats.learning_rate);
        let _ = writeln!(report, "Known patterns: {}", stats.known_patterns);
        let _ = writeln!(report, "Knowledge entries: {}", stats.knowledge_entries);
        if !top.is_empty() {
            report.push_str("\nMost learned patterns:\n");
            for (pattern, frequency) in top {
                let _ = writeln!(report, "  {pattern}: {frequency}x");
            }
        }
        report
    }
}
#[cfg(test)]
mod tests {
    use crate::learning::LearningEngine;
    #[test]
    fn ranking_is_stable_for_ties() {
        let engine = LearningEngine::default();
        engine.record_pattern("first", 0.5, 3);
        engine.record_pattern("second", 0.5, 7);
        engine.record_pattern("third", 0.5, 3);
        engine.record_pattern("fourth", 0.5, 1);
        let top = engine.most_learned_patterns(3);
        assert_eq!(
            top,
            vec![
                ("second".to_string(), 7),
                ("first".to_string(), 3),
                ("third".to_string(), 3)
            ]
        );
        assert_eq!(engine.most_learned_patterns(3), top);
    }
    #[test]
    fn report_lists_counters() {
        let engine = LearningEngine::default();
        engine.record_pattern("greeting", 0.75, 2);
        let report = engine.learning_report();
        assert!(report.contains("Learning events: 0"));
        assert!(report.contains("Average confidence: 75.0%"));
        assert!(report.contains("greeting: 2x"));
    }
}
