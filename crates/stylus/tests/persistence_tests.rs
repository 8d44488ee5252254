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

use std::fs;
use stylus::config::NetworkConfig;
use stylus::memory::persistence::parse_snapshot;
use stylus::memory::KnowledgeEntry;
use stylus::{LearningEngine, StylusConfig};

fn trained_engine() -> LearningEngine {
    let engine = LearningEngine::new(&StylusConfig {
        network: NetworkConfig {
            seed: Some(17),
            ..NetworkConfig::default()
        },
        ..StylusConfig::default()
    });
    engine.learn("ahoj", "Ahoj!", 1.0);
    engine.learn("write a class", "class A {}", 0.2);
    engine.learn("what is a trait", "a set of methods", 0.9);
    engine.reinforce("explain", 0.95);
    engine.record_pattern("precise", 0.1 + 0.2, 3);
    engine.upsert_knowledge(
        "custom",
        KnowledgeEntry::with_patterns(["rust", "cargo"], 1.0 / 3.0).flag("source", "test"),
    );
    engine
}

#[test]
fn test_save_then_load_is_bit_exact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("knowledge.json");
    let original = trained_engine();
    original.save(&path).unwrap();

    let restored = LearningEngine::default();
    let report = restored.load(&path).unwrap();
    assert!(report.found);
    assert!(report.is_clean());

    let expected = original.snapshot();
    let actual = restored.snapshot();
    assert_eq!(actual.knowledge_base, expected.knowledge_base);
    assert_eq!(actual.pattern_frequency, expected.pattern_frequency);
    assert_eq!(actual.neural_shape, expected.neural_shape);
    assert_eq!(actual.total_learning_events, expected.total_learning_events);
    let bits = |values: &[f64]| values.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
    for (key, value) in &expected.pattern_confidence {
        assert_eq!(actual.pattern_confidence[key].to_bits(), value.to_bits(), "{key}");
    }
    for (left, right) in actual.neural_weights.iter().zip(&expected.neural_weights) {
        assert_eq!(bits(left), bits(right));
    }
    assert_eq!(bits(&actual.neural_biases), bits(&expected.neural_biases));
    assert_eq!(actual.average_confidence.to_bits(), expected.average_confidence.to_bits());
    assert_eq!(actual.learning_rate.to_bits(), expected.learning_rate.to_bits());
    assert_eq!(
        restored.forward_text("what is a trait"),
        original.forward_text("what is a trait")
    );
}

#[test]
fn test_missing_file_leaves_engine_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let engine = trained_engine();
    let before = engine.snapshot();
    let report = engine.load(dir.path().join("absent.json")).unwrap();
    assert!(!report.found);
    let after = engine.snapshot();
    assert_eq!(after.knowledge_base, before.knowledge_base);
    assert_eq!(after.pattern_confidence, before.pattern_confidence);
    assert_eq!(after.neural_weights, before.neural_weights);
}

#[test]
fn test_damaged_sections_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("knowledge.json");
    fs::write(
        &path,
        r#"{
            "version": 1,
            "knowledge_base": {
                "weather": {"patterns": ["rain"], "facts": [], "confidence": 0.4, "frequency": 2, "metadata": {}},
                "broken": {"patterns": 7}
            },
            "pattern_confidence": "not a map",
            "pattern_frequency": {"weather": 2},
            "neural_shape": {"input": 3, "hidden": 2, "output": 1},
            "neural_weights": [[0.1, 0.2, 0.3, 0.4, 0.5, 0.6], [0.7, 0.8]],
            "neural_biases": [0.0, 0.0, 0.0],
            "total_learning_events": 12,
            "learning_rate": 0.05
        }"#,
    )
    .unwrap();
    let engine = LearningEngine::default();
    let weights_before = engine.snapshot().neural_weights;
    let report = engine.load(&path).unwrap();
    assert!(report.skipped.contains(&"pattern_confidence".to_string()));
    assert!(report.skipped.iter().any(|s| s.contains("broken")));
    assert!(engine.knowledge("weather").is_some());
    assert!(engine.knowledge("broken").is_none());
    assert_eq!(engine.pattern_frequency("weather"), Some(2));
    assert_eq!(engine.total_learning_events(), 12);
    assert!((engine.learning_rate() - 0.05).abs() < f64::EPSILON);
    assert_eq!(engine.snapshot().neural_weights, weights_before);
}

#[test]
fn test_unreadable_path_is_storage_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let engine = LearningEngine::default();
    let err = engine.load(dir.path()).unwrap_err();
    assert!(err.is_storage_unavailable());
}

#[test]
fn test_loaded_entry_confidence_is_clamped() {
    let engine = LearningEngine::default();
    engine.apply_snapshot(parse_snapshot(
        r#"{"knowledge_base": {"x": {"patterns": ["y"], "confidence": 5.0}, "z": {"confidence": -2.0}}}"#,
    ));
    assert!((engine.knowledge("x").unwrap().confidence - 1.0).abs() < f64::EPSILON);
    assert!(engine.knowledge("z").unwrap().confidence.abs() < f64::EPSILON);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("knowledge.json");
    fs::write(
        &path,
        r#"{"knowledge_base": {"weather": {"patterns": ["rain"], "confidence": 7.5}}}"#,
    )
    .unwrap();
    let restored = LearningEngine::default();
    restored.load(&path).unwrap();
    let confidence = restored.knowledge("weather").unwrap().confidence;
    assert!((0.0..=1.0).contains(&confidence));
}
