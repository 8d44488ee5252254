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

use super::syntax::{canonical_language, find_dependencies, validate_syntax};
use super::templates::{fill_template, CodeTemplate, TemplateRegistry};
use crate::error::Result;
use crate::memory::{KnowledgeEntry, KnowledgeSink};
use crate::runtime::events::{EngineEvent, EventBus, EventListener};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
pub const TEMPLATE_CONFIDENCE: f64 = 0.8;
pub const FALLBACK_CONFIDENCE: f64 = 0.6;
const DEFAULT_TEMPLATE_CONFIDENCE: f64 = 0.7;
const PATTERN_STEP: f64 = 0.1;
const DESCRIPTION_PATTERNS: [(&str, &[&str]); 4] = [
    ("input_output", &["vstup", "výstup", "input", "output", "print", "cout", "cin"]),
    ("loops", &["cyklus", "loop", "for", "while", "opakuj", "repeat"]),
    ("conditions", &["podmienka", "condition", "if", "else", "ak", "inak"]),
    ("functions", &["funkcia", "function", "metóda", "method", "def"]),
];
static CODE_SHAPES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("for_loop", r"\bfor\s*\("),
        ("while_loop", r"\bwhile\s*\("),
        ("conditional", r"\bif\s*\("),
        ("class_definition", r"\bclass\s+\w+"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("static regex")))
    .collect()
});
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub code: String,
    pub language: String,
    pub description: String,
    pub dependencies: Vec<String>,
    pub confidence: f64,
    pub is_valid: bool,
}
#[derive(Debug, Default)]
struct GeneratorState {
    registry: TemplateRegistry,
    confidence: IndexMap<String, f64>,
    learned: IndexMap<String, Vec<String>>,
    examples: IndexMap<String, String>,
}
impl GeneratorState {
    fn learn_from_code(&mut self, code: &str, description: &str) -> usize {
        for (name, re) in CODE_SHAPES.iter() {
            if re.is_match(code) {
                self.learned.entry((*name).to_string()).or_default().push(code.to_string());
            }
        }
        self.examples.insert(description.to_string(), code.to_string());
        for pattern in identify_patterns(description) {
            self.learned.entry(pattern.to_string()).or_default().push(code.to_string());
            let current = self.confidence.get(pattern).copied().unwrap_or(0.5);
            self.confidence
                .insert(pattern.to_string(), (current + PATTERN_STEP).min(1.0));
        }
        self.learned.len()
    }
}
/// Description keyword groups present in `description`, in a fixed order.
pub fn identify_patterns(description: &str) -> Vec<&'static str> {
    let lowered = description.to_lowercase();
    DESCRIPTION_PATTERNS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(name, _)| *name)
        .collect()
}
fn fallback_language(requested: &str, description: &str) -> &'static str {
    let lowered = description.to_lowercase();
    if requested == "cpp" || lowered.contains("c++") {
        "cpp"
    } else if requested == "python" || lowered.contains("python") {
        "python"
    } else if requested == "javascript" || lowered.contains("javascript") {
        "javascript"
    } else if requested == "java" || lowered.contains("java") {
        "java"
    } else {
        "cpp"
    }
}
fn says_hello(description: &str) -> bool {
    let lowered = description.to_lowercase();
    lowered.contains("hello") || lowered.contains("ahoj")
}
fn cpp_program(description: &str) -> String {
    if says_hello(description) {
        return "#include <iostream>\nusing namespace std;\n\nint main() {\n    cout << \"Hello World!\" << endl;\n    return 0;\n}"
            .to_string();
    }
    format!(
        "// Generated C++ code for: {description}\n#include <iostream>\nusing namespace std;\n\nint main() {{\n    // TODO: implement the requested behaviour\n    cout << \"Program started!\" << endl;\n    return 0;\n}}"
    )
}
fn python_program(description: &str) -> String {
    if says_hello(description) {
        return "def main():\n    print(\"Hello World!\")\n\nif __name__ == \"__main__\":\n    main()"
            .to_string();
    }
    format!(
        "# Generated Python code for: {description}\ndef main():\n    # TODO: implement the requested behaviour\n    print(\"Program started!\")\n\nif __name__ == \"__main__\":\n    main()"
    )
}
fn javascript_program(description: &str) -> String {
    if says_hello(description) {
        return "function main() {\n    console.log(\"Hello World!\");\n}\n\nmain();".to_string();
    }
    format!(
        "// Generated JavaScript code for: {description}\nfunction main() {{\n    // TODO: implement the requested behaviour\n    console.log(\"Program started!\");\n}}\n\nmain();"
    )
}
fn java_program(description: &str) -> String {
    format!(
        "// Generated Java code for: {description}\npublic class Main {{\n    public static void main(String[] args) {{\n        // TODO: implement the requested behaviour\n        System.out.println(\"Program started!\");\n    }}\n}}"
    )
}
/// Template-first code generation with per-language fallbacks. Every
/// artifact is learned from and, when a sink is attached, folded into the
/// knowledge store under `code:<description>`.
pub struct CodeGenerator {
    state: Mutex<GeneratorState>,
    sink: Option<Arc<dyn KnowledgeSink>>,
    events: EventBus,
}
impl std::fmt::Debug for CodeGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeGenerator")
            .field("templates", &self.state.lock().registry.len())
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}
impl CodeGenerator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GeneratorState {
                registry: TemplateRegistry::with_builtins(),
                ..GeneratorState::default()
            }),
            sink: None,
            events: EventBus::new(),
        }
    }
    pub fn with_sink(mut self, sink: Arc<dyn KnowledgeSink>) -> Self {
        self.sink = Some(sink);
        self
    }
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }
    pub fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.events.subscribe(listener);
    }
    pub fn generate(&self, description: &str, language: Option<&str>) -> GeneratedArtifact {
        let requested = language.map(canonical_language).unwrap_or_default();
        let (artifact, learned) = {
            let mut state = self.state.lock();
            let filter = Some(requested.as_str()).filter(|l| !l.is_empty());
            let template = {
                let confidence = &state.confidence;
                state
                    .registry
                    .find_best(description, filter, |pattern| {
                        confidence
                            .get(pattern)
                            .copied()
                            .unwrap_or(DEFAULT_TEMPLATE_CONFIDENCE)
                    })
                    .cloned()
            };
            let (code, language, confidence) = match template {
                Some(template) => (
                    fill_template(&template, description),
                    template.language,
                    TEMPLATE_CONFIDENCE,
                ),
                None => {
                    let language = fallback_language(&requested, description);
                    let code = match language {
                        "python" => python_program(description),
                        "javascript" => javascript_program(description),
                        "java" => java_program(description),
                        _ => cpp_program(description),
                    };
                    (code, language.to_string(), FALLBACK_CONFIDENCE)
                }
            };
            let artifact = GeneratedArtifact {
                is_valid: validate_syntax(&code, &language),
                dependencies: find_dependencies(&code, &language),
                code,
                language,
                description: description.to_string(),
                confidence,
            };
            let learned = state.learn_from_code(&artifact.code, description);
            (artifact, learned)
        };
        info!(
            target: "stylus::codegen",
            language = %artifact.language,
            confidence = artifact.confidence,
            valid = artifact.is_valid,
            "code.generated"
        );
        if let Some(sink) = &self.sink {
            let entry = KnowledgeEntry {
                patterns: identify_patterns(description)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                facts: vec![artifact.code.clone()],
                confidence: artifact.confidence,
                frequency: 1,
                ..KnowledgeEntry::default()
            }
            .flag("language", artifact.language.as_str())
            .flag("valid", artifact.is_valid);
            sink.fold_knowledge(&format!("code:{description}"), entry);
        }
        self.events.emit_all(&[
            EngineEvent::progress(learned as u64 * 2),
            EngineEvent::CodeGenerated {
                language: artifact.language.clone(),
                code: artifact.code.clone(),
            },
        ]);
        artifact
    }
    /// Learns from a code sample that did not come from `generate`.
    /// Returns the number of distinct learned patterns.
    pub fn learn_from_code(&self, code: &str, description: &str) -> usize {
        let learned = self.state.lock().learn_from_code(code, description);
        debug!(target: "stylus::codegen", learned, "code.learned");
        self.events.emit(&EngineEvent::progress(learned as u64 * 2));
        learned
    }
    pub fn rate_template(&self, pattern: &str, confidence: f64) {
        let confidence = if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) };
        self.state.lock().confidence.insert(pattern.to_string(), confidence);
    }
    pub fn pattern_confidence(&self, pattern: &str) -> Option<f64> {
        self.state.lock().confidence.get(pattern).copied()
    }
    pub fn learned_patterns(&self) -> Vec<(String, usize)> {
        self.state
            .lock()
            .learned
            .iter()
            .map(|(name, samples)| (name.clone(), samples.len()))
            .collect()
    }
    pub fn example(&self, description: &str) -> Option<String> {
        self.state.lock().examples.get(description).cloned()
    }
    pub fn add_template(&self, template: CodeTemplate) {
        self.state.lock().registry.add(template);
    }
    pub fn template_count(&self) -> usize {
        self.state.lock().registry.len()
    }
    pub fn load_templates<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let mut staged = TemplateRegistry::new();
        let added = staged.load(path)?;
        let mut state = self.state.lock();
        for template in staged.iter() {
            state.registry.add(template.clone());
        }
        Ok(added)
    }
    pub fn save_templates<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let registry = self.state.lock().registry.clone();
        registry.save(path)
    }
}
/// C++ function skeleton with a default return matching `return_type`.
pub fn generate_function(
    name: &str,
    description: &str,
    parameters: &[&str],
    return_type: &str,
) -> String {
    let mut code = format!(
        "// {description}\n{return_type} {name}({}) {{\n",
        parameters.join(", ")
    );
    code.push_str("    // TODO: implement\n");
    match return_type {
        "void" => {}
        "int" => code.push_str("    return 0;\n"),
        "bool" => code.push_str("    return true;\n"),
        "string" | "std::string" => code.push_str("    return \"\";\n"),
        other => code.push_str(&format!("    return {other}();\n")),
    }
    code.push_str("}\n");
    code
}
/// C++ class skeleton with default constructor and destructor.
pub fn generate_class(name: &str, description: &str, methods: &[&str], members: &[&str]) -> String {
    let mut code = format!("// {description}\nclass {name} {{\nprivate:\n");
    for member in members {
        code.push_str(&format!("    {member};\n"));
    }
    code.push_str(&format!("\npublic:\n    {name}() {{}}\n    ~{name}() {{}}\n\n"));
    for method in methods {
        code.push_str(&format!("    {method};\n"));
    }
    code.push_str("};\n");
    code
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::events::FnListener;
    use serde_json::json;
    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<(String, KnowledgeEntry)>>);
    impl KnowledgeSink for RecordingSink {
        fn fold_knowledge(&self, key: &str, entry: KnowledgeEntry) {
            self.0.lock().push((key.to_string(), entry));
        }
    }
    #[test]
    fn template_match_wins_over_fallback() {
        let generator = CodeGenerator::new();
        let artifact = generator.generate("hello world", Some("python"));
        assert_eq!(artifact.language, "python");
        assert_eq!(artifact.confidence, TEMPLATE_CONFIDENCE);
        assert!(artifact.code.contains("print(\"Hello World!\")"));
        assert!(artifact.is_valid);
    }
    #[test]
    fn class_template_is_filled() {
        let generator = CodeGenerator::new();
        let artifact = generator.generate("class Person", Some("c++"));
        assert_eq!(artifact.language, "cpp");
        assert!(artifact.code.contains("class Person {"));
        assert_eq!(artifact.dependencies, vec!["iostream", "string"]);
        assert!(artifact.is_valid);
    }
    #[test]
    fn fallback_generators_cover_each_language() {
        let generator = CodeGenerator::new();
        let js = generator.generate("sum two numbers", Some("javascript"));
        assert_eq!(js.confidence, FALLBACK_CONFIDENCE);
        assert!(js.code.starts_with("// Generated JavaScript code for: sum two numbers"));
        assert!(js.is_valid);
        let java = generator.generate("sum two numbers", Some("java"));
        assert!(java.code.contains("public class Main"));
        assert!(java.is_valid);
        let unknown = generator.generate("sum two numbers", Some("cobol"));
        assert_eq!(unknown.language, "cpp");
        assert!(unknown.is_valid);
    }
    #[test]
    fn artifacts_fold_into_the_sink() {
        let sink = Arc::new(RecordingSink::default());
        let generator = CodeGenerator::new().with_sink(sink.clone());
        generator.generate("print a loop", None);
        let folded = sink.0.lock();
        assert_eq!(folded.len(), 1);
        assert_eq!(folded[0].0, "code:print a loop");
        assert_eq!(folded[0].1.patterns, vec!["input_output", "loops"]);
        assert_eq!(folded[0].1.metadata["language"], json!("cpp"));
    }
    #[test]
    fn generation_emits_code_event() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let generator = CodeGenerator::new();
        let sink = seen.clone();
        generator.subscribe(Arc::new(FnListener(move |event: &EngineEvent| {
            sink.lock().push(event.clone());
        })));
        let artifact = generator.generate("calculator", None);
        let events = seen.lock();
        assert!(events.contains(&EngineEvent::CodeGenerated {
            language: "cpp".to_string(),
            code: artifact.code.clone(),
        }));
    }
    #[test]
    fn learning_raises_description_patterns() {
        let generator = CodeGenerator::new();
        let learned = generator.learn_from_code("for (int i = 0; i < 3; ++i) {}", "loop function");
        assert_eq!(learned, 3);
        assert!((generator.pattern_confidence("loops").unwrap() - 0.6).abs() < 1e-12);
        generator.learn_from_code("x", "loop");
        assert!((generator.pattern_confidence("loops").unwrap() - 0.7).abs() < 1e-12);
        assert_eq!(generator.example("loop").as_deref(), Some("x"));
    }
    #[test]
    fn rating_changes_template_preference() {
        let generator = CodeGenerator::new();
        let description = "hello world class Greeter";
        assert!(generator.generate(description, Some("cpp")).code.contains("Hello World!"));
        generator.rate_template("(class|trieda)", 0.95);
        assert!(generator.generate(description, Some("cpp")).code.contains("class Greeter {"));
    }
    #[test]
    fn skeletons_have_expected_shape() {
        let function = generate_function("area", "Computes area", &["int w", "int h"], "int");
        assert_eq!(
            function,
            "// Computes area\nint area(int w, int h) {\n    // TODO: implement\n    return 0;\n}\n"
        );
        let class = generate_class("Shape", "A shape", &["void draw()"], &["int sides"]);
        assert!(class.contains("class Shape {\nprivate:\n    int sides;\n"));
        assert!(class.contains("    ~Shape() {}\n"));
        assert!(class.ends_with("    void draw();\n};\n"));
    }
}
