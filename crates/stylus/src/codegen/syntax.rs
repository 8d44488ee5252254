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

use once_cell::sync::Lazy;
use regex::Regex;
static PY_DEF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*def\s+\w+\s*\(.*\)\s*:").expect("static regex"));
static CPP_INCLUDE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"#include\s*[<"]([^>"]+)[>"]"#).expect("static regex"));
static PY_IMPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:import|from)\s+(\w+)").expect("static regex"));
static JS_IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:require\(\s*['"]([^'"]+)['"]\s*\)|\bfrom\s+['"]([^'"]+)['"])"#)
        .expect("static regex")
});
static JAVA_IMPORT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*import\s+([\w.]+)\s*;").expect("static regex"));
static C_FUNCTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\w+\s+(\w+)\s*\([^)]*\)\s*\{").expect("static regex"));
static PY_FUNCTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bdef\s+(\w+)\s*\([^)]*\)\s*:").expect("static regex"));
static CLASS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bclass\s+(\w+)").expect("static regex"));
static BLANK_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n\s*\n").expect("static regex"));
const CONTROL_KEYWORDS: [&str; 5] = ["if", "for", "while", "switch", "catch"];
/// Maps user-facing language names onto the tags templates are registered under.
pub fn canonical_language(language: &str) -> String {
    match language.trim().to_lowercase().as_str() {
        "c++" | "cpp" | "cxx" => "cpp".to_string(),
        "py" | "python" | "python3" => "python".to_string(),
        "js" | "javascript" | "node" => "javascript".to_string(),
        other => other.to_string(),
    }
}
fn balanced(code: &str, open: char, close: char) -> bool {
    code.matches(open).count() == code.matches(close).count()
}
/// Cheap structural check. Unknown languages are accepted.
pub fn validate_syntax(code: &str, language: &str) -> bool {
    match canonical_language(language).as_str() {
        "cpp" => {
            code.contains("#include")
                && code.contains("main")
                && balanced(code, '{', '}')
                && balanced(code, '(', ')')
        }
        "python" => {
            PY_DEF_RE.is_match(code) && balanced(code, '(', ')') && balanced(code, '[', ']')
        }
        "javascript" => {
            balanced(code, '{', '}') && balanced(code, '(', ')') && balanced(code, '[', ']')
        }
        "java" => code.contains("class") && balanced(code, '{', '}') && balanced(code, '(', ')'),
        _ => true,
    }
}
fn captures(re: &Regex, code: &str) -> Vec<String> {
    re.captures_iter(code)
        .filter_map(|caps| caps.iter().skip(1).flatten().next().map(|m| m.as_str().to_string()))
        .collect()
}
pub fn find_dependencies(code: &str, language: &str) -> Vec<String> {
    match canonical_language(language).as_str() {
        "cpp" => captures(&CPP_INCLUDE_RE, code),
        "python" => captures(&PY_IMPORT_RE, code),
        "javascript" => captures(&JS_IMPORT_RE, code),
        "java" => captures(&JAVA_IMPORT_RE, code),
        _ => Vec::new(),
    }
}
pub fn extract_functions(code: &str) -> Vec<String> {
    let mut functions: Vec<String> = captures(&C_FUNCTION_RE, code)
        .into_iter()
        .filter(|name| !CONTROL_KEYWORDS.contains(&name.as_str()))
        .collect();
    functions.extend(captures(&PY_FUNCTION_RE, code));
    functions
}
pub fn extract_classes(code: &str) -> Vec<String> {
    let mut classes: Vec<String> = Vec::new();
    for name in captures(&CLASS_RE, code) {
        if !classes.contains(&name) {
            classes.push(name);
        }
    }
    classes
}
/// Drops an unused `<iostream>` include from C++ and squeezes runs of blank lines.
pub fn optimize_code(code: &str, language: &str) -> String {
    let mut optimized = code.to_string();
    if canonical_language(language) == "cpp"
        && !optimized.contains("cout")
        && !optimized.contains("cin")
    {
        optimized = optimized.replace("#include <iostream>\n", "");
    }
    BLANK_RUN_RE.replace_all(&optimized, "\n\n").into_owned()
}
pub fn add_comments(code: &str, language: &str) -> String {
    let marker = if canonical_language(language) == "python" { "#" } else { "//" };
    let mut commented = Vec::new();
    for line in code.split('\n') {
        commented.push(line.to_string());
        let note = if line.contains("main") {
            Some("Program entry point")
        } else if line.contains("class") {
            Some("Class definition")
        } else if line.contains("for") || line.contains("while") {
            Some("Loop")
        } else {
            None
        };
        if let Some(note) = note {
            commented.push(format!("    {marker} {note}"));
        }
    }
    commented.join("\n")
}
/// Re-indents brace-delimited code four spaces per level. Python is only
/// stripped of trailing whitespace since its indentation is significant.
pub fn format_code(code: &str, language: &str) -> String {
    if canonical_language(language) == "python" {
        return code
            .split('\n')
            .map(str::trim_end)
            .collect::<Vec<_>>()
            .join("\n");
    }
    let mut depth = 0usize;
    let mut formatted = Vec::new();
    for line in code.split('\n') {
        let trimmed = line.trim();
        if trimmed.contains('}') {
            depth = depth.saturating_sub(1);
        }
        if trimmed.is_empty() {
            formatted.push(String::new());
        } else {
            formatted.push(format!("{}{trimmed}", "    ".repeat(depth)));
        }
        if trimmed.contains('{') {
            depth += 1;
        }
    }
    formatted.join("\n")
}
#[cfg(test)]
mod tests {
    use super::*;
    const CPP: &str = "#include <iostream>\n#include \"util.h\"\nusing namespace std;\n\nint main() {\n    cout << \"hi\" << endl;\n    return 0;\n}";
    #[test]
    fn cpp_needs_anchors_and_balance() {
        assert!(validate_syntax(CPP, "cpp"));
        assert!(validate_syntax(CPP, "C++"));
        assert!(!validate_syntax("int main() { return 0; }", "cpp"));
        assert!(!validate_syntax("#include <x>\nint main() {", "cpp"));
    }
    #[test]
    fn python_needs_a_def_line() {
        assert!(validate_syntax("def main():\n    print(\"x\")\n", "python"));
        assert!(!validate_syntax("print('no def')", "python"));
        assert!(!validate_syntax("def main():\n    print([1, 2)\n", "py"));
    }
    #[test]
    fn javascript_checks_all_brackets() {
        assert!(validate_syntax("function f() { return [1]; }", "javascript"));
        assert!(!validate_syntax("function f() { return [1; }", "js"));
        assert!(validate_syntax("anything (", "cobol"));
    }
    #[test]
    fn dependencies_per_language() {
        assert_eq!(find_dependencies(CPP, "cpp"), vec!["iostream", "util.h"]);
        assert_eq!(
            find_dependencies("import os\nfrom collections import deque", "python"),
            vec!["os", "collections", "deque"]
        );
        assert_eq!(
            find_dependencies("const fs = require('fs');\nimport x from \"lodash\";", "javascript"),
            vec!["fs", "lodash"]
        );
        assert_eq!(find_dependencies("import java.util.List;", "java"), vec!["java.util.List"]);
        assert!(find_dependencies(CPP, "ruby").is_empty());
    }
    #[test]
    fn extracts_definitions() {
        let code = "class Foo {\n};\nint add(int a, int b) {\n    if (a) {\n    }\n    return a + b;\n}\ndef helper(x):\n    pass\nclass Foo:\n";
        assert_eq!(extract_functions(code), vec!["add", "helper"]);
        assert_eq!(extract_classes(code), vec!["Foo"]);
    }
    #[test]
    fn optimize_drops_unused_iostream() {
        let code = "#include <iostream>\nint main() {\n\n\n\n    return 0;\n}";
        assert_eq!(optimize_code(code, "cpp"), "int main() {\n\n    return 0;\n}");
        assert!(optimize_code(CPP, "cpp").contains("#include <iostream>"));
    }
    #[test]
    fn comments_follow_language_marker() {
        let commented = add_comments("def main():\n    for x in y:\n        pass", "python");
        assert!(commented.contains("# Program entry point"));
        assert!(commented.contains("# Loop"));
        assert!(add_comments("class A {};", "cpp").contains("// Class definition"));
    }
    #[test]
    fn formatting_reindents_braces() {
        let formatted = format_code("int main() {\nif (x) {\nreturn 1;\n}\n}", "cpp");
        assert_eq!(
            formatted,
            "int main() {\n    if (x) {\n        return 1;\n    }\n}"
        );
        assert_eq!(format_code("def f():  \n    pass  ", "python"), "def f():\n    pass");
    }
}
