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

use super::events::{EngineEvent, EventListener};
use super::responder::{Responder, RESPONSE_KEY_PREFIX};
use crate::codegen::{CodeGenerator, GeneratedArtifact};
use crate::config::StylusConfig;
use crate::error::Result;
use crate::learning::LearningEngine;
use crate::memory::{ConversationContext, LoadReport};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
pub const EXTERNAL_RESPONSE_PREFIX: &str = "Network response: ";
/// Host-facing facade: routes messages through the responder, keeps the
/// conversation window and feeds every exchange back into the engine.
#[derive(Debug)]
pub struct Assistant {
    engine: Arc<LearningEngine>,
    generator: Arc<CodeGenerator>,
    responder: Responder,
    context: Mutex<ConversationContext>,
    processing: AtomicBool,
}
impl Default for Assistant {
    fn default() -> Self {
        Self::new(&StylusConfig::default())
    }
}
impl Assistant {
    pub fn new(config: &StylusConfig) -> Self {
        let engine = Arc::new(LearningEngine::new(config));
        Self::with_engine(engine, config)
    }
    /// Builds around an existing engine; generated code and its events go
    /// through the engine's knowledge store and event bus.
    pub fn with_engine(engine: Arc<LearningEngine>, config: &StylusConfig) -> Self {
        let generator = Arc::new(
            CodeGenerator::new()
                .with_sink(engine.clone())
                .with_events(engine.events().clone()),
        );
        Self {
            responder: Responder::new(engine.clone(), generator.clone()),
            engine,
            generator,
            context: Mutex::new(ConversationContext::new(config.context.max_turns)),
            processing: AtomicBool::new(false),
        }
    }
    /// `new` followed by loading whatever persisted state the storage
    /// section points at. Damaged knowledge sections are reported, not fatal.
    pub fn open(config: &StylusConfig) -> Result<(Self, Option<LoadReport>)> {
        let assistant = Self::new(config);
        let report = match &config.storage.knowledge_path {
            Some(path) => Some(assistant.engine.load(path)?),
            None => None,
        };
        if let Some(path) = &config.storage.templates_path {
            let added = assistant.generator.load_templates(path)?;
            info!(target: "stylus::runtime", added, path = %path.display(), "templates.loaded");
        }
        Ok((assistant, report))
    }
    pub fn engine(&self) -> &Arc<LearningEngine> {
        &self.engine
    }
    pub fn generator(&self) -> &Arc<CodeGenerator> {
        &self.generator
    }
    pub fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.engine.subscribe(listener);
    }
    fn emit(&self, event: EngineEvent) {
        self.engine.events().emit(&event);
    }
    /// Answers one user message. Returns `None` while another message is
    /// still being processed.
    pub fn process_input(&self, message: &str) -> Option<String> {
        if self
            .processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(target: "stylus::runtime", "process.busy");
            self.emit(EngineEvent::Error {
                detail: "already processing another message".to_string(),
            });
            return None;
        }
        self.emit(EngineEvent::status("Analyzing message..."));
        let response = self.responder.respond(message);
        self.engine.learn(message, &response.text, 1.0);
        {
            let mut context = self.context.lock();
            context.push(message, &response.text);
            context.set_topic(self.engine.classify(message));
        }
        self.processing.store(false, Ordering::Release);
        info!(target: "stylus::runtime", rule = response.rule.as_str(), "process.answered");
        self.emit(EngineEvent::ResponseReady {
            text: response.text.clone(),
        });
        self.emit(EngineEvent::status("Ready"));
        Some(response.text)
    }
    /// Generates code and learns the description to code mapping.
    pub fn generate_code(&self, description: &str, language: Option<&str>) -> GeneratedArtifact {
        let artifact = self.generator.generate(description, language);
        self.learn_from_interaction(description, &artifact.code);
        artifact
    }
    /// Stores `output` as a token-keyed reply for `input` and trains the
    /// network on the pair. Returns the number of tokens learned.
    pub fn learn_from_interaction(&self, input: &str, output: &str) -> usize {
        let learned = self.responder.learn_token_responses(input, output);
        self.engine
            .train_network(&[(input.to_string(), output.to_string())]);
        let known = self
            .engine
            .knowledge_keys()
            .iter()
            .filter(|key| key.starts_with(RESPONSE_KEY_PREFIX))
            .count();
        self.emit(EngineEvent::progress(known as u64));
        learned
    }
    pub fn report(&self) -> String {
        self.engine.learning_report()
    }
    /// Relays a reply produced by an external service.
    pub fn accept_external_response(&self, text: &str) -> String {
        let relayed = format!("{EXTERNAL_RESPONSE_PREFIX}{text}");
        self.emit(EngineEvent::ResponseReady {
            text: relayed.clone(),
        });
        relayed
    }
    pub fn add_to_context(&self, message: &str, response: &str) {
        self.context.lock().push(message, response);
    }
    pub fn clear_context(&self) {
        self.context.lock().clear();
    }
    pub fn context_summary(&self) -> String {
        self.context.lock().summary()
    }
    pub fn context_len(&self) -> usize {
        self.context.lock().len()
    }
    /// Replaces the facts stored under `topic`.
    pub fn update_knowledge_base(&self, topic: &str, information: &str) {
        self.engine.update_knowledge(topic, |entry| {
            entry.facts = vec![information.to_string()];
        });
        self.emit(EngineEvent::status("Knowledge base updated"));
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use crate::runtime::events::FnListener;
    use crate::runtime::responder::PROGRAMMING_PROMPT;
    fn assistant() -> Assistant {
        Assistant::new(&StylusConfig {
            network: NetworkConfig {
                seed: Some(11),
                ..NetworkConfig::default()
            },
            ..StylusConfig::default()
        })
    }
    #[test]
    fn process_input_answers_learns_and_remembers() {
        let assistant = assistant();
        let reply = assistant.process_input("I need a function").unwrap();
        assert_eq!(reply, PROGRAMMING_PROMPT);
        assert_eq!(assistant.engine().total_learning_events(), 1);
        assert_eq!(assistant.context_len(), 1);
        let summary = assistant.context_summary();
        assert!(summary.contains("Topic: programming"));
        assert!(summary.contains("User: I need a function"));
    }
    #[test]
    fn nested_processing_is_rejected() {
        let assistant = Arc::new(assistant());
        let nested = Arc::new(Mutex::new(Vec::new()));
        let inner = assistant.clone();
        let sink = nested.clone();
        assistant.subscribe(Arc::new(FnListener(move |event: &EngineEvent| {
            if matches!(event, EngineEvent::Status { text } if text == "Analyzing message...") {
                sink.lock().push(inner.process_input("hello again"));
            }
        })));
        assert!(assistant.process_input("hello").is_some());
        assert_eq!(*nested.lock(), vec![None]);
        assert_eq!(assistant.context_len(), 1);
    }
    #[test]
    fn generated_code_becomes_a_learned_reply() {
        let assistant = assistant();
        let artifact = assistant.generate_code("calculator", Some("cpp"));
        assert!(artifact.code.contains("switch (operation)"));
        assert!(assistant.engine().knowledge("code:calculator").is_some());
        let learned = assistant.engine().knowledge("response:calculator").unwrap();
        assert_eq!(learned.facts, vec![artifact.code]);
    }
    #[test]
    fn external_responses_are_prefixed() {
        let assistant = assistant();
        assert_eq!(assistant.accept_external_response("42"), "Network response: 42");
    }
    #[test]
    fn knowledge_updates_replace_facts() {
        let assistant = assistant();
        assistant.update_knowledge_base("greeting", "Hi there!");
        assert_eq!(assistant.process_input("hi").as_deref(), Some("Hi there!"));
        assistant.update_knowledge_base("weather", "Sunny");
        assert_eq!(assistant.engine().knowledge("weather").unwrap().facts, vec!["Sunny"]);
    }
    #[test]
    fn context_can_be_edited_directly() {
        let assistant = assistant();
        assistant.add_to_context("a", "1");
        assistant.add_to_context("b", "2");
        assert_eq!(assistant.context_len(), 2);
        assistant.clear_context();
        assert_eq!(assistant.context_len(), 0);
        assert_eq!(assistant.context_summary(), "Recent messages:\n");
    }
}
