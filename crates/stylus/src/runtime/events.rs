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

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    ResponseReady { text: String },
    Progress { percent: u8 },
    Status { text: String },
    CodeGenerated { language: String, code: String },
    Error { detail: String },
    KnowledgeUpdated { key: String },
    PatternRecognized { pattern: String },
    ConfidenceUpdated { value: f64 },
    LearningComplete,
}
impl EngineEvent {
    pub fn progress(value: u64) -> Self {
        Self::Progress {
            percent: u8::try_from(value.min(100)).unwrap_or(100),
        }
    }
    pub fn status(text: impl Into<String>) -> Self {
        Self::Status { text: text.into() }
    }
}
/// Receives engine notifications. Implementations must not block; they are
/// called after the engine lock has been released and may call back into
/// the engine.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &EngineEvent);
}
impl EventListener for UnboundedSender<EngineEvent> {
    fn on_event(&self, event: &EngineEvent) {
        let _ = self.send(event.clone());
    }
}
/// Adapts a closure into a listener.
pub struct FnListener<F>(pub F);
impl<F> EventListener for FnListener<F>
where
    F: Fn(&EngineEvent) + Send + Sync,
{
    fn on_event(&self, event: &EngineEvent) {
        (self.0)(event);
    }
}
#[derive(Default, Clone)]
pub struct EventBus {
    listeners: Arc<parking_lot::RwLock<Vec<Arc<dyn EventListener>>>>,
}
impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.read().len())
            .finish()
    }
}
impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.listeners.write().push(listener);
    }
    pub fn emit(&self, event: &EngineEvent) {
        let listeners: Vec<_> = self.listeners.read().iter().cloned().collect();
        for listener in listeners {
            listener.on_event(event);
        }
    }
    pub fn emit_all(&self, events: &[EngineEvent]) {
        for event in events {
            self.emit(event);
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    #[test]
    fn progress_is_capped() {
        assert_eq!(EngineEvent::progress(250), EngineEvent::Progress { percent: 100 });
        assert_eq!(EngineEvent::progress(7), EngineEvent::Progress { percent: 7 });
    }
    #[test]
    fn bus_fans_out_to_every_listener() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = Arc::clone(&seen);
        bus.subscribe(Arc::new(FnListener(move |e: &EngineEvent| sink.lock().push(e.clone()))));
        bus.subscribe(Arc::new(tx));
        bus.emit(&EngineEvent::LearningComplete);
        assert_eq!(seen.lock().as_slice(), &[EngineEvent::LearningComplete]);
        assert_eq!(rx.try_recv().unwrap(), EngineEvent::LearningComplete);
    }
    #[test]
    fn listener_may_subscribe_while_dispatching() {
        let bus = EventBus::new();
        let inner = bus.clone();
        bus.subscribe(Arc::new(FnListener(move |_: &EngineEvent| {
            inner.subscribe(Arc::new(FnListener(|_: &EngineEvent| {})));
        })));
        bus.emit(&EngineEvent::status("ready"));
        assert!(format!("{bus:?}").contains("listeners: 2"));
    }
}
