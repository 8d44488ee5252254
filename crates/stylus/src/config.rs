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

use crate::error::ConfigError;
use crate::nlu::classifier::ClassifierConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StylusConfig {
    pub network: NetworkConfig,
    pub learning: LearningConfig,
    pub context: ContextConfig,
    pub storage: StorageConfig,
    pub maintenance: MaintenanceConfig,
    pub classifier: ClassifierConfig,
    pub seeds: Vec<SeedEntry>,
}
impl Default for StylusConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            learning: LearningConfig::default(),
            context: ContextConfig::default(),
            storage: StorageConfig::default(),
            maintenance: MaintenanceConfig::default(),
            classifier: ClassifierConfig::default(),
            seeds: SeedEntry::defaults(),
        }
    }
}
impl StylusConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_input_size")]
    pub input_size: usize,
    #[serde(default = "default_hidden_size")]
    pub hidden_size: usize,
    #[serde(default = "default_output_size")]
    pub output_size: usize,
    /// Fixed RNG seed; weights and update noise are drawn from OS entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}
fn default_input_size() -> usize {
    50
}
fn default_hidden_size() -> usize {
    25
}
fn default_output_size() -> usize {
    10
}
impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            input_size: default_input_size(),
            hidden_size: default_hidden_size(),
            output_size: default_output_size(),
            seed: None,
        }
    }
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    pub learning_rate: f64,
    pub max_history: usize,
    pub adaptive: bool,
    pub min_learning_rate: f64,
    pub max_learning_rate: f64,
    /// Upper bound applied when a burst of new interactions speeds learning up.
    pub burst_rate_ceiling: f64,
    pub burst_window_secs: u64,
    pub burst_events: usize,
    pub mistake_threshold: usize,
    pub recognition_threshold: f64,
}
impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            max_history: 1000,
            adaptive: true,
            min_learning_rate: 0.001,
            max_learning_rate: 0.1,
            burst_rate_ceiling: 0.05,
            burst_window_secs: 300,
            burst_events: 10,
            mistake_threshold: 3,
            recognition_threshold: 0.7,
        }
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "default_context_length")]
    pub max_turns: usize,
}
fn default_context_length() -> usize {
    10
}
impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_turns: default_context_length(),
        }
    }
}
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub knowledge_path: Option<PathBuf>,
    pub templates_path: Option<PathBuf>,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub continuous_interval_secs: u64,
    pub evaluation_interval_secs: u64,
    pub snapshot_interval_secs: Option<u64>,
}
impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            continuous_interval_secs: 10,
            evaluation_interval_secs: 60,
            snapshot_interval_secs: None,
        }
    }
}
impl MaintenanceConfig {
    pub fn continuous_interval(&self) -> Duration {
        Duration::from_secs(self.continuous_interval_secs.max(1))
    }
    pub fn evaluation_interval(&self) -> Duration {
        Duration::from_secs(self.evaluation_interval_secs.max(1))
    }
    pub fn snapshot_interval(&self) -> Option<Duration> {
        self.snapshot_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedEntry {
    pub key: String,
    pub patterns: Vec<String>,
    #[serde(default = "default_seed_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub facts: Vec<String>,
}
fn default_seed_confidence() -> f64 {
    0.5
}
impl SeedEntry {
    pub fn new(key: &str, patterns: &[&str], confidence: f64) -> Self {
        Self {
            key: key.to_string(),
            patterns: patterns.iter().map(|p| (*p).to_string()).collect(),
            confidence,
            facts: Vec::new(),
        }
    }
    pub fn with_fact(mut self, fact: &str) -> Self {
        self.facts.push(fact.to_string());
        self
    }
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("greeting", &["ahoj", "hello", "hi", "čau", "dobrý deň"], 0.9).with_fact(
                "Hello! I am an assistant. I can help with programming, answer questions and learn from our conversation.",
            ),
            Self::new(
                "programming",
                &["kód", "program", "funkcia", "trieda", "code", "function", "class"],
                0.8,
            )
            .with_fact("I can generate code in C++, Python, JavaScript and other languages."),
            Self::new(
                "question",
                &["čo", "ako", "prečo", "kde", "kedy", "what", "how", "why"],
                0.7,
            ),
        ]
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn empty_document_yields_defaults() {
        let config = StylusConfig::from_toml_str("").unwrap();
        assert_eq!(config.network, NetworkConfig::default());
        assert_eq!(config.learning, LearningConfig::default());
        assert_eq!(config.context.max_turns, 10);
        assert_eq!(config.seeds.len(), 3);
        assert!(config.storage.knowledge_path.is_none());
    }
    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let raw = r#"
            [network]
            hidden_size = 8
            seed = 7

            [learning]
            learning_rate = 0.02

            [maintenance]
            snapshot_interval_secs = 120

            [storage]
            knowledge_path = "/var/lib/stylus/knowledge.json"
        "#;
        let config = StylusConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.network.input_size, 50);
        assert_eq!(config.network.hidden_size, 8);
        assert_eq!(config.network.seed, Some(7));
        assert!((config.learning.learning_rate - 0.02).abs() < f64::EPSILON);
        assert_eq!(config.learning.max_history, 1000);
        assert_eq!(
            config.maintenance.snapshot_interval(),
            Some(Duration::from_secs(120))
        );
        assert_eq!(config.maintenance.continuous_interval(), Duration::from_secs(10));
        assert_eq!(
            config.storage.knowledge_path.as_deref(),
            Some(Path::new("/var/lib/stylus/knowledge.json"))
        );
    }
    #[test]
    fn seeds_replace_defaults_when_present() {
        let raw = r#"
            [[seeds]]
            key = "weather"
            patterns = ["rain", "sun"]
        "#;
        let config = StylusConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.seeds.len(), 1);
        assert_eq!(config.seeds[0].key, "weather");
        assert!((config.seeds[0].confidence - 0.5).abs() < f64::EPSILON);
    }
    #[test]
    fn malformed_document_is_a_parse_error() {
        let err = StylusConfig::from_toml_str("[network\ninput_size = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
    #[test]
    fn missing_file_is_an_io_error() {
        let err = StylusConfig::from_file("/definitely/not/here/stylus.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
