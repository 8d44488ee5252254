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

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
pub const DEFAULT_CONFIDENCE: f64 = 0.5;
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeEntry {
    pub patterns: Vec<String>,
    pub facts: Vec<String>,
    pub confidence: f64,
    pub frequency: u64,
    pub metadata: Map<String, Value>,
}
impl Default for KnowledgeEntry {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            facts: Vec::new(),
            confidence: DEFAULT_CONFIDENCE,
            frequency: 0,
            metadata: Map::new(),
        }
    }
}
impl KnowledgeEntry {
    pub fn with_patterns<I, S>(patterns: I, confidence: f64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
            confidence: confidence.clamp(0.0, 1.0),
            ..Self::default()
        }
    }
    pub fn set_confidence(&mut self, confidence: f64) {
        self.confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
    }
    pub fn flag(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
    pub fn is_discovered(&self) -> bool {
        self.metadata
            .get("discovered")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
    fn matches(&self, lowered_input: &str) -> bool {
        self.patterns
            .iter()
            .map(|p| p.to_lowercase())
            .any(|p| !p.is_empty() && lowered_input.contains(&p))
    }
}
/// Ordered key to entry map; keys are unique and iteration follows insertion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KnowledgeStore {
    entries: IndexMap<String, KnowledgeEntry>,
}
impl KnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn upsert(
        &mut self,
        key: impl Into<String>,
        entry: KnowledgeEntry,
    ) -> Option<KnowledgeEntry> {
        self.entries.insert(key.into(), entry)
    }
    pub fn get(&self, key: &str) -> Option<&KnowledgeEntry> {
        self.entries.get(key)
    }
    pub fn get_mut(&mut self, key: &str) -> Option<&mut KnowledgeEntry> {
        self.entries.get_mut(key)
    }
    pub fn remove(&mut self, key: &str) -> Option<KnowledgeEntry> {
        self.entries.shift_remove(key)
    }
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (&String, &KnowledgeEntry)> {
        self.entries.iter()
    }
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }
    /// Keys whose pattern list has a case-insensitive substring hit in `input`.
    pub fn matching_keys(&self, input: &str) -> Vec<String> {
        let lowered = input.to_lowercase();
        self.entries
            .iter()
            .filter(|(_, entry)| entry.matches(&lowered))
            .map(|(key, _)| key.clone())
            .collect()
    }
    pub fn as_map(&self) -> &IndexMap<String, KnowledgeEntry> {
        &self.entries
    }
}
impl From<IndexMap<String, KnowledgeEntry>> for KnowledgeStore {
    fn from(entries: IndexMap<String, KnowledgeEntry>) -> Self {
        Self { entries }
    }
}
/// Destination for artifacts that should become knowledge, such as generated code.
pub trait KnowledgeSink: Send + Sync {
    fn fold_knowledge(&self, key: &str, entry: KnowledgeEntry);
}
