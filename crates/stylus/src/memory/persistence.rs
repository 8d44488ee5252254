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

use super::knowledge::KnowledgeEntry;
use super::neural_models::NetworkShape;
use crate::error::{Result, StylusError};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};
pub const CURRENT_VERSION: u32 = 1;
/// Full on-disk image of the learned state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSnapshot {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub knowledge_base: IndexMap<String, KnowledgeEntry>,
    pub pattern_confidence: IndexMap<String, f64>,
    pub pattern_frequency: IndexMap<String, u64>,
    pub neural_shape: NetworkShape,
    pub neural_weights: Vec<Vec<f64>>,
    pub neural_biases: Vec<f64>,
    pub total_learning_events: u64,
    pub average_confidence: f64,
    pub learning_rate: f64,
}
/// Sections recovered from a document that may be damaged. Absent sections
/// are `None`; sections present but unparseable are listed in `skipped`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialSnapshot {
    pub version: Option<u32>,
    pub knowledge_base: Option<IndexMap<String, KnowledgeEntry>>,
    pub pattern_confidence: Option<IndexMap<String, f64>>,
    pub pattern_frequency: Option<IndexMap<String, u64>>,
    pub neural_shape: Option<NetworkShape>,
    pub neural_weights: Option<Vec<Vec<f64>>>,
    pub neural_biases: Option<Vec<f64>>,
    pub total_learning_events: Option<u64>,
    pub average_confidence: Option<f64>,
    pub learning_rate: Option<f64>,
    pub skipped: Vec<String>,
}
/// Outcome of applying a document to live state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub found: bool,
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
}
impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}
pub fn write_snapshot<P: AsRef<Path>>(path: P, snapshot: &KnowledgeSnapshot) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(snapshot)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StylusError::storage(path, e))?;
    }
    fs::write(path, json).map_err(|e| StylusError::storage(path, e))?;
    debug!(
        target: "stylus::memory",
        path = %path.display(),
        entries = snapshot.knowledge_base.len(),
        "snapshot.written"
    );
    Ok(())
}
/// Reads a document from disk. A missing file yields `Ok(None)`; any other
/// I/O failure is reported as storage unavailable.
pub fn read_snapshot<P: AsRef<Path>>(path: P) -> Result<Option<PartialSnapshot>> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(parse_snapshot(&raw))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StylusError::storage(path, e)),
    }
}
pub fn parse_snapshot(raw: &str) -> PartialSnapshot {
    let mut partial = PartialSnapshot::default();
    let root = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(root)) => root,
        Ok(_) => {
            warn!(target: "stylus::memory", "snapshot.root_not_object");
            partial.skipped.push("document".to_string());
            return partial;
        }
        Err(e) => {
            warn!(target: "stylus::memory", error = %e, "snapshot.unparseable");
            partial.skipped.push("document".to_string());
            return partial;
        }
    };
    let skipped = &mut partial.skipped;
    partial.version = section(&root, "version", skipped);
    if let Some(version) = partial.version.filter(|v| *v != CURRENT_VERSION) {
        warn!(
            target: "stylus::memory",
            version,
            current = CURRENT_VERSION,
            "snapshot.version_mismatch"
        );
    }
    partial.knowledge_base = knowledge_section(&root, skipped);
    partial.pattern_confidence = section(&root, "pattern_confidence", skipped);
    partial.pattern_frequency = section(&root, "pattern_frequency", skipped);
    partial.neural_shape = section(&root, "neural_shape", skipped);
    partial.neural_weights = section(&root, "neural_weights", skipped);
    partial.neural_biases = section(&root, "neural_biases", skipped);
    partial.total_learning_events = section(&root, "total_learning_events", skipped);
    partial.average_confidence = section(&root, "average_confidence", skipped);
    partial.learning_rate = section(&root, "learning_rate", skipped);
    partial
}
fn section<T: DeserializeOwned>(
    root: &Map<String, Value>,
    key: &str,
    skipped: &mut Vec<String>,
) -> Option<T> {
    let value = root.get(key)?;
    match serde_json::from_value(value.clone()) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(target: "stylus::memory", section = key, error = %e, "snapshot.section_skipped");
            skipped.push(key.to_string());
            None
        }
    }
}
/// Entries are recovered one by one so a single damaged entry does not
/// discard the rest of the knowledge base.
fn knowledge_section(
    root: &Map<String, Value>,
    skipped: &mut Vec<String>,
) -> Option<IndexMap<String, KnowledgeEntry>> {
    let value = root.get("knowledge_base")?;
    let Some(entries) = value.as_object() else {
        warn!(target: "stylus::memory", section = "knowledge_base", "snapshot.section_skipped");
        skipped.push("knowledge_base".to_string());
        return None;
    };
    let mut parsed = IndexMap::with_capacity(entries.len());
    for (key, raw) in entries {
        match serde_json::from_value::<KnowledgeEntry>(raw.clone()) {
            Ok(mut entry) => {
                entry.set_confidence(entry.confidence);
                parsed.insert(key.clone(), entry);
            }
            Err(e) => {
                warn!(target: "stylus::memory", entry = %key, error = %e, "snapshot.entry_skipped");
                skipped.push(format!("knowledge_base.{key}"));
            }
        }
    }
    Some(parsed)
}
