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

use super::syntax::canonical_language;
use crate::error::{Result, StylusError};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};
static CLASS_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:class|trieda)\s+(\w+)").expect("static regex"));
/// A parametrized code skeleton. Placeholders are written `${Name}` and
/// every name listed in `variables` is substituted when filling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeTemplate {
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub variables: Vec<String>,
}
impl CodeTemplate {
    pub fn new(language: &str, pattern: &str, code: &str, description: &str) -> Self {
        Self {
            language: canonical_language(language),
            pattern: pattern.to_string(),
            code: code.to_string(),
            description: description.to_string(),
            variables: Vec::new(),
        }
    }
    pub fn with_variables(mut self, variables: &[&str]) -> Self {
        self.variables = variables.iter().map(|v| (*v).to_string()).collect();
        self
    }
}
pub fn builtin_templates() -> Vec<CodeTemplate> {
    vec![
        CodeTemplate::new(
            "cpp",
            "hello.*world",
            "#include <iostream>\nusing namespace std;\n\nint main() {\n    cout << \"Hello World!\" << endl;\n    return 0;\n}",
            "Basic Hello World program in C++",
        ),
        CodeTemplate::new(
            "cpp",
            "(class|trieda)",
            "#include <iostream>\n#include <string>\nusing namespace std;\n\nclass ${ClassName} {\nprivate:\n    ${MemberType} ${memberName};\n\npublic:\n    ${ClassName}(${MemberType} ${paramName}) : ${memberName}(${paramName}) {}\n\n    void display() {\n        cout << \"${ClassName}: \" << ${memberName} << endl;\n    }\n\n    ${MemberType} get${MemberName}() const { return ${memberName}; }\n    void set${MemberName}(${MemberType} value) { ${memberName} = value; }\n};\n\nint main() {\n    ${ClassName} obj(${defaultValue});\n    obj.display();\n    return 0;\n}",
            "Basic class template in C++",
        )
        .with_variables(&[
            "ClassName",
            "MemberType",
            "memberName",
            "MemberName",
            "paramName",
            "defaultValue",
        ]),
        CodeTemplate::new(
            "cpp",
            "(kalkulačka|calculator|počítanie)",
            "#include <iostream>\nusing namespace std;\n\nint main() {\n    double a, b, result;\n    char operation;\n\n    cout << \"First number: \";\n    cin >> a;\n    cout << \"Operator (+, -, *, /): \";\n    cin >> operation;\n    cout << \"Second number: \";\n    cin >> b;\n\n    switch (operation) {\n        case '+':\n            result = a + b;\n            cout << \"Result: \" << result << endl;\n            break;\n        case '-':\n            result = a - b;\n            cout << \"Result: \" << result << endl;\n            break;\n        case '*':\n            result = a * b;\n            cout << \"Result: \" << result << endl;\n            break;\n        case '/':\n            if (b != 0) {\n                result = a / b;\n                cout << \"Result: \" << result << endl;\n            } else {\n                cout << \"Error: division by zero!\" << endl;\n            }\n            break;\n        default:\n            cout << \"Unknown operator!\" << endl;\n    }\n\n    return 0;\n}",
            "Simple calculator in C++",
        ),
        CodeTemplate::new(
            "python",
            "hello.*world",
            "def main():\n    print(\"Hello World!\")\n\nif __name__ == \"__main__\":\n    main()",
            "Basic Hello World program in Python",
        ),
        CodeTemplate::new(
            "python",
            "(class|trieda)",
            "class ${ClassName}:\n    def __init__(self, ${paramName}):\n        self.${memberName} = ${paramName}\n\n    def display(self):\n        print(f\"${ClassName}: {self.${memberName}}\")\n\n    def get_${memberName}(self):\n        return self.${memberName}\n\n    def set_${memberName}(self, value):\n        self.${memberName} = value\n\ndef main():\n    obj = ${ClassName}(${defaultValue})\n    obj.display()\n\nif __name__ == \"__main__\":\n    main()",
            "Basic class template in Python",
        )
        .with_variables(&["ClassName", "memberName", "paramName", "defaultValue"]),
    ]
}
/// Values for the well-known placeholders, derived from a `class <Name>`
/// phrase in the description when there is one.
pub fn extract_variables(description: &str) -> HashMap<&'static str, String> {
    let mut variables = HashMap::new();
    if let Some(name) = CLASS_NAME_RE
        .captures(description)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
    {
        variables.insert("ClassName", name.to_string());
        variables.insert("MemberName", name.to_string());
        variables.insert("memberName", name.to_lowercase());
    } else {
        variables.insert("ClassName", "MyClass".to_string());
        variables.insert("MemberName", "Value".to_string());
        variables.insert("memberName", "value".to_string());
    }
    variables.insert("MemberType", "int".to_string());
    variables.insert("paramName", "param".to_string());
    variables.insert("defaultValue", "42".to_string());
    variables
}
/// Substitutes each declared variable; unknown names are replaced by the
/// variable name itself.
pub fn fill_template(template: &CodeTemplate, description: &str) -> String {
    let values = extract_variables(description);
    template.variables.iter().fold(template.code.clone(), |code, name| {
        let value = values.get(name.as_str()).map_or(name.as_str(), String::as_str);
        code.replace(&format!("${{{name}}}"), value)
    })
}
fn compile(pattern: &str) -> Option<Regex> {
    match RegexBuilder::new(pattern).case_insensitive(true).build() {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(target: "stylus::codegen", pattern, error = %e, "template.pattern_invalid");
            None
        }
    }
}
/// Append-only template collection with each pattern compiled once.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: Vec<CodeTemplate>,
    matchers: Vec<Option<Regex>>,
}
impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for template in builtin_templates() {
            registry.add(template);
        }
        registry
    }
    pub fn add(&mut self, mut template: CodeTemplate) {
        template.language = canonical_language(&template.language);
        self.matchers.push(compile(&template.pattern));
        self.templates.push(template);
    }
    pub fn len(&self) -> usize {
        self.templates.len()
    }
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &CodeTemplate> {
        self.templates.iter()
    }
    /// Highest-confidence template whose pattern matches the lower-cased
    /// description, restricted to `language` when given. Earlier templates
    /// win ties.
    pub fn find_best<F>(
        &self,
        description: &str,
        language: Option<&str>,
        confidence: F,
    ) -> Option<&CodeTemplate>
    where
        F: Fn(&str) -> f64,
    {
        let lowered = description.to_lowercase();
        let language = language.map(canonical_language).filter(|l| !l.is_empty());
        let mut best: Option<(&CodeTemplate, f64)> = None;
        for (template, matcher) in self.templates.iter().zip(&self.matchers) {
            if language.as_ref().is_some_and(|l| *l != template.language) {
                continue;
            }
            let Some(matcher) = matcher else {
                continue;
            };
            if !matcher.is_match(&lowered) {
                continue;
            }
            let score = confidence(&template.pattern);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((template, score));
            }
        }
        best.map(|(template, _)| template)
    }
    /// Appends templates from a JSON array. A missing file adds nothing;
    /// entries without code are skipped.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(StylusError::storage(path, e)),
        };
        let entries = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(entries)) => entries,
            Ok(_) | Err(_) => {
                warn!(
                    target: "stylus::codegen",
                    path = %path.display(),
                    "templates.document_skipped"
                );
                return Ok(0);
            }
        };
        let mut added = 0;
        for entry in entries {
            match serde_json::from_value::<CodeTemplate>(entry) {
                Ok(template) if !template.code.is_empty() => {
                    self.add(template);
                    added += 1;
                }
                Ok(_) => warn!(target: "stylus::codegen", "templates.entry_without_code"),
                Err(e) => warn!(target: "stylus::codegen", error = %e, "templates.entry_skipped"),
            }
        }
        debug!(target: "stylus::codegen", path = %path.display(), added, "templates.loaded");
        Ok(added)
    }
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.templates)?;
        fs::write(path, json).map_err(|e| StylusError::storage(path, e))
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn class_name_drives_variables() {
        let vars = extract_variables("create a class Person please");
        assert_eq!(vars["ClassName"], "Person");
        assert_eq!(vars["memberName"], "person");
        let vars = extract_variables("something else");
        assert_eq!(vars["ClassName"], "MyClass");
        assert_eq!(vars["defaultValue"], "42");
    }
    #[test]
    fn fill_replaces_every_declared_placeholder() {
        let registry = TemplateRegistry::with_builtins();
        let template = registry.find_best("trieda Auto", Some("cpp"), |_| 0.7).unwrap();
        let code = fill_template(template, "trieda Auto");
        assert!(code.contains("class Auto {"));
        assert!(code.contains("int getAuto() const"));
        assert!(!code.contains("${"));
    }
    #[test]
    fn undeclared_values_fall_back_to_the_name() {
        let template = CodeTemplate::new("cpp", "x", "${Unknown} ${ClassName}", "")
            .with_variables(&["Unknown", "ClassName"]);
        assert_eq!(fill_template(&template, "x"), "Unknown MyClass");
    }
    #[test]
    fn language_filter_and_confidence_ranking() {
        let registry = TemplateRegistry::with_builtins();
        let best = registry.find_best("Hello World", Some("python"), |_| 0.7).unwrap();
        assert_eq!(best.language, "python");
        let best = registry.find_best("hello world class", None, |_| 0.7).unwrap();
        assert_eq!(best.description, "Basic Hello World program in C++");
        let best = registry
            .find_best("hello world class", None, |p| if p == "(class|trieda)" { 0.9 } else { 0.7 })
            .unwrap();
        assert_eq!(best.description, "Basic class template in C++");
        assert!(registry.find_best("sort a list", Some("cpp"), |_| 0.7).is_none());
        assert!(registry.find_best("hello world", Some("cobol"), |_| 0.7).is_none());
    }
    #[test]
    fn invalid_patterns_never_match() {
        let mut registry = TemplateRegistry::new();
        registry.add(CodeTemplate::new("cpp", "(unclosed", "int main() {}", "broken"));
        assert_eq!(registry.len(), 1);
        assert!(registry.find_best("(unclosed", None, |_| 1.0).is_none());
    }
    #[test]
    fn save_then_load_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("templates.json");
        let source = TemplateRegistry::with_builtins();
        source.save(&path).unwrap();
        let mut target = TemplateRegistry::new();
        assert_eq!(target.load(&path).unwrap(), source.len());
        assert_eq!(target.iter().collect::<Vec<_>>(), source.iter().collect::<Vec<_>>());
        assert_eq!(target.load(dir.path().join("missing.json")).unwrap(), 0);
    }
    #[test]
    fn malformed_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("templates.json");
        fs::write(
            &path,
            r#"[{"language":"js","pattern":"sum","code":"function sum(a, b) { return a + b; }"},
               {"language":"cpp","pattern":"x"},
               42]"#,
        )
        .unwrap();
        let mut registry = TemplateRegistry::new();
        assert_eq!(registry.load(&path).unwrap(), 1);
        assert_eq!(registry.iter().next().unwrap().language, "javascript");
    }
}
