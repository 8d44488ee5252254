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

use crate::codegen::{CodeGenerator, GeneratedArtifact};
use crate::learning::LearningEngine;
use crate::nlu::{preprocess, tokenize};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
pub const FALLBACK_GREETING: &str = "Hello! How can I help you?";
pub const PROGRAMMING_PROMPT: &str =
    "I can help with programming! What kind of code do you need? Name the language and what the code should do.";
pub const NEURAL_FALLBACK: &str =
    "Sorry, I do not fully understand. Could you explain it differently?";
const NEURAL_REPLIES: [(f64, &str); 3] = [
    (0.7, "That is an interesting question. Could you give me more details?"),
    (0.5, "I understand your question. Let me help based on what I have learned."),
    (0.3, "Hmm, I am not sure. Could you rephrase the question?"),
];
/// Knowledge key prefix for responses learned per input token.
pub const RESPONSE_KEY_PREFIX: &str = "response:";
pub const MAX_TOKEN_RESPONSES: usize = 50;
const TOKEN_CONFIDENCE_STEP: f64 = 0.1;
static GREETING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(ahoj|hello|hi|čau|dobrý)\b").expect("static regex"));
static PROGRAMMING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(kód|program|funkci|trieda|class|function)").expect("static regex"));
static CREATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(vytvor|generuj|napíš|create|generate)").expect("static regex"));
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseRule {
    Greeting,
    Programming,
    CodeGeneration,
    Learned,
    Neural,
}
impl ResponseRule {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Programming => "programming",
            Self::CodeGeneration => "code_generation",
            Self::Learned => "learned",
            Self::Neural => "neural",
        }
    }
}
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub text: String,
    pub rule: ResponseRule,
    pub artifact: Option<GeneratedArtifact>,
}
impl Response {
    fn text(text: impl Into<String>, rule: ResponseRule) -> Self {
        Self {
            text: text.into(),
            rule,
            artifact: None,
        }
    }
}
/// Language named in free text, if any.
pub fn detect_language(text: &str) -> Option<&'static str> {
    let tokens = tokenize(text);
    let lowered = text.to_lowercase();
    if tokens.iter().any(|t| t == "python" || t == "py") {
        Some("python")
    } else if tokens.iter().any(|t| t == "javascript" || t == "js") {
        Some("javascript")
    } else if tokens.iter().any(|t| t == "java") {
        Some("java")
    } else if lowered.contains("c++") || tokens.iter().any(|t| t == "cpp") {
        Some("cpp")
    } else {
        None
    }
}
fn response_key(token: &str) -> String {
    format!("{RESPONSE_KEY_PREFIX}{token}")
}
/// Ordered rule chain that picks a reply for one user message. Learned
/// replies and the neural fallback read the shared engine state.
#[derive(Debug, Clone)]
pub struct Responder {
    engine: Arc<LearningEngine>,
    generator: Arc<CodeGenerator>,
}
impl Responder {
    pub fn new(engine: Arc<LearningEngine>, generator: Arc<CodeGenerator>) -> Self {
        Self { engine, generator }
    }
    pub fn respond(&self, input: &str) -> Response {
        let processed = preprocess(input);
        let response = if GREETING_RE.is_match(&processed) {
            let greeting = self
                .engine
                .knowledge("greeting")
                .and_then(|entry| entry.facts.into_iter().next())
                .unwrap_or_else(|| FALLBACK_GREETING.to_string());
            Response::text(greeting, ResponseRule::Greeting)
        } else if PROGRAMMING_RE.is_match(&processed) {
            Response::text(PROGRAMMING_PROMPT, ResponseRule::Programming)
        } else if CREATION_RE.is_match(&processed) {
            let artifact = self.generator.generate(input, detect_language(input));
            Response {
                text: artifact.code.clone(),
                rule: ResponseRule::CodeGeneration,
                artifact: Some(artifact),
            }
        } else if let Some(learned) = self.best_learned_response(&processed) {
            Response::text(learned, ResponseRule::Learned)
        } else {
            Response::text(self.neural_reply(&processed), ResponseRule::Neural)
        };
        debug!(target: "stylus::runtime", rule = response.rule.as_str(), "response.selected");
        response
    }
    /// Most recent response stored under the highest-confidence token of
    /// `input`; earlier tokens win ties.
    pub fn best_learned_response(&self, input: &str) -> Option<String> {
        let mut best: Option<(f64, String)> = None;
        for token in tokenize(input) {
            let Some(entry) = self.engine.knowledge(&response_key(&token)) else {
                continue;
            };
            let Some(reply) = entry.facts.last() else {
                continue;
            };
            if best.as_ref().map_or(entry.confidence > 0.0, |(top, _)| entry.confidence > *top) {
                best = Some((entry.confidence, reply.clone()));
            }
        }
        best.map(|(_, reply)| reply)
    }
    /// Stores `output` as a candidate reply for every token of `input`.
    /// Returns the number of tokens updated.
    pub fn learn_token_responses(&self, input: &str, output: &str) -> usize {
        let tokens = tokenize(input);
        for token in &tokens {
            self.engine.update_knowledge(&response_key(token), |entry| {
                entry.facts.push(output.to_string());
                if entry.facts.len() > MAX_TOKEN_RESPONSES {
                    entry.facts.remove(0);
                }
                entry.confidence = (entry.confidence + TOKEN_CONFIDENCE_STEP).min(1.0);
                entry.frequency += 1;
            });
        }
        tokens.len()
    }
    fn neural_reply(&self, processed: &str) -> &'static str {
        let score = self
            .engine
            .forward_text(processed)
            .first()
            .copied()
            .unwrap_or(0.0);
        NEURAL_REPLIES
            .iter()
            .find(|(threshold, _)| score > *threshold)
            .map_or(NEURAL_FALLBACK, |(_, reply)| *reply)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NetworkConfig, StylusConfig};
    fn responder() -> Responder {
        let config = StylusConfig {
            network: NetworkConfig {
                seed: Some(3),
                ..NetworkConfig::default()
            },
            ..StylusConfig::default()
        };
        let engine = Arc::new(LearningEngine::new(&config));
        let generator = Arc::new(CodeGenerator::new().with_sink(engine.clone()));
        Responder::new(engine, generator)
    }
    #[test]
    fn greeting_uses_the_stored_fact() {
        let responder = responder();
        let response = responder.respond("Ahoj!");
        assert_eq!(response.rule, ResponseRule::Greeting);
        assert!(response.text.starts_with("Hello! I am an assistant."));
        assert_eq!(responder.respond("this is it").rule, ResponseRule::Neural);
    }
    #[test]
    fn programming_keywords_win_over_creation_verbs() {
        let responder = responder();
        let response = responder.respond("create a function");
        assert_eq!(response.rule, ResponseRule::Programming);
        assert_eq!(response.text, PROGRAMMING_PROMPT);
    }
    #[test]
    fn creation_verbs_generate_code() {
        let responder = responder();
        let response = responder.respond("generate a sorting routine in python");
        assert_eq!(response.rule, ResponseRule::CodeGeneration);
        let artifact = response.artifact.unwrap();
        assert_eq!(artifact.language, "python");
        assert_eq!(response.text, artifact.code);
        assert!(responder
            .engine
            .knowledge("code:generate a sorting routine in python")
            .is_some());
    }
    #[test]
    fn learned_replies_follow_token_confidence() {
        let responder = responder();
        assert_eq!(responder.learn_token_responses("weather today", "Sunny."), 2);
        responder.learn_token_responses("weather", "Rainy.");
        let entry = responder.engine.knowledge("response:weather").unwrap();
        assert!((entry.confidence - 0.7).abs() < 1e-12);
        let response = responder.respond("today weather?");
        assert_eq!(response.rule, ResponseRule::Learned);
        assert_eq!(response.text, "Rainy.");
        assert_eq!(responder.respond("today").text, "Sunny.");
    }
    #[test]
    fn token_replies_are_capped() {
        let responder = responder();
        for i in 0..(MAX_TOKEN_RESPONSES + 5) {
            responder.learn_token_responses("rust", &format!("reply {i}"));
        }
        let entry = responder.engine.knowledge("response:rust").unwrap();
        assert_eq!(entry.facts.len(), MAX_TOKEN_RESPONSES);
        assert_eq!(entry.facts[0], "reply 5");
        assert!((entry.confidence - 1.0).abs() < f64::EPSILON);
    }
    #[test]
    fn neural_fallback_is_one_of_the_buckets() {
        let responder = responder();
        let response = responder.respond("xyzzy plugh");
        assert_eq!(response.rule, ResponseRule::Neural);
        let known: Vec<&str> = NEURAL_REPLIES.iter().map(|(_, r)| *r).collect();
        assert!(known.contains(&response.text.as_str()) || response.text == NEURAL_FALLBACK);
    }
    #[test]
    fn detects_named_languages() {
        assert_eq!(detect_language("write it in Python"), Some("python"));
        assert_eq!(detect_language("node js please"), Some("javascript"));
        assert_eq!(detect_language("a java app"), Some("java"));
        assert_eq!(detect_language("modern C++"), Some("cpp"));
        assert_eq!(detect_language("anything"), None);
    }
}
