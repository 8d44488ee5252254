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

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Greeting,
    Programming,
    Question,
    Gratitude,
    HelpRequest,
    #[default]
    General,
}
impl Category {
    /// Order in which keyword rules are tried; the first hit wins.
    pub const RULE_ORDER: [Self; 5] = [
        Self::Greeting,
        Self::Programming,
        Self::Question,
        Self::Gratitude,
        Self::HelpRequest,
    ];
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Programming => "programming",
            Self::Question => "question",
            Self::Gratitude => "gratitude",
            Self::HelpRequest => "help_request",
            Self::General => "general",
        }
    }
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "greeting" => Some(Self::Greeting),
            "programming" => Some(Self::Programming),
            "question" => Some(Self::Question),
            "gratitude" => Some(Self::Gratitude),
            "help_request" => Some(Self::HelpRequest),
            "general" => Some(Self::General),
            _ => None,
        }
    }
}
impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
/// Keyword membership per category. Greeting keywords must match a whole
/// word; the others match anywhere in the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub greeting: Vec<String>,
    pub programming: Vec<String>,
    pub question: Vec<String>,
    pub gratitude: Vec<String>,
    pub help_request: Vec<String>,
}
fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| (*w).to_string()).collect()
}
impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            greeting: words(&["ahoj", "hello", "hi", "čau", "dobrý"]),
            programming: words(&[
                "kód", "program", "funkcia", "trieda", "code", "function", "class",
            ]),
            question: words(&[
                "čo", "ako", "prečo", "kde", "kedy", "what", "how", "why", "where", "when",
            ]),
            gratitude: words(&["ďakujem", "thanks", "thank you", "vďaka"]),
            help_request: words(&["pomoc", "help", "assist"]),
        }
    }
}
impl ClassifierConfig {
    fn keywords(&self, category: Category) -> &[String] {
        match category {
            Category::Greeting => &self.greeting,
            Category::Programming => &self.programming,
            Category::Question => &self.question,
            Category::Gratitude => &self.gratitude,
            Category::HelpRequest => &self.help_request,
            Category::General => &[],
        }
    }
}
#[derive(Debug, Clone)]
pub struct CategoryClassifier {
    rules: Vec<(Category, Regex)>,
}
impl Default for CategoryClassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}
impl CategoryClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        let rules = Category::RULE_ORDER
            .iter()
            .filter_map(|&category| {
                let keywords = config.keywords(category);
                if keywords.iter().all(|k| k.trim().is_empty()) {
                    return None;
                }
                let alternation = keywords
                    .iter()
                    .filter(|k| !k.trim().is_empty())
                    .map(|k| regex::escape(&k.to_lowercase()))
                    .collect::<Vec<_>>()
                    .join("|");
                let pattern = format!(r"\b({alternation})\b");
                match RegexBuilder::new(&pattern).case_insensitive(true).build() {
                    Ok(re) => Some((category, re)),
                    Err(e) => {
                        warn!(
                            target: "stylus::nlu",
                            category = %category,
                            error = %e,
                            "classifier.rule_skipped"
                        );
                        None
                    }
                }
            })
            .collect();
        Self { rules }
    }
    pub fn classify(&self, text: &str) -> Category {
        let lowered = text.to_lowercase();
        self.rules
            .iter()
            .find(|(_, re)| re.is_match(&lowered))
            .map_or(Category::General, |(category, _)| *category)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn classifies_in_rule_order() {
        let classifier = CategoryClassifier::default();
        assert_eq!(classifier.classify("Ahoj"), Category::Greeting);
        assert_eq!(classifier.classify("hello, what is a class?"), Category::Greeting);
        assert_eq!(classifier.classify("what is a class?"), Category::Programming);
        assert_eq!(classifier.classify("Prečo?"), Category::Question);
        assert_eq!(classifier.classify("thank you!"), Category::Gratitude);
        assert_eq!(classifier.classify("I need help"), Category::HelpRequest);
        assert_eq!(classifier.classify("lorem ipsum"), Category::General);
    }
    #[test]
    fn keywords_match_whole_words_only() {
        let classifier = CategoryClassifier::default();
        assert_ne!(classifier.classify("this chip"), Category::Greeting);
        assert_eq!(classifier.classify("show me the weather"), Category::General);
        assert_eq!(classifier.classify("whelp"), Category::General);
        assert_eq!(classifier.classify("my programs"), Category::General);
        assert_eq!(classifier.classify("my program"), Category::Programming);
        assert_eq!(classifier.classify("thank you kindly"), Category::Gratitude);
    }
    #[test]
    fn keyword_membership_is_configurable() {
        let config = ClassifierConfig {
            gratitude: vec!["cheers".into()],
            ..ClassifierConfig::default()
        };
        let classifier = CategoryClassifier::new(&config);
        assert_eq!(classifier.classify("cheers mate"), Category::Gratitude);
        assert_eq!(classifier.classify("vďaka"), Category::General);
    }
    #[test]
    fn empty_keyword_lists_disable_the_category() {
        let config = ClassifierConfig {
            greeting: Vec::new(),
            ..ClassifierConfig::default()
        };
        assert_eq!(CategoryClassifier::new(&config).classify("hello"), Category::General);
    }
    #[test]
    fn labels_round_trip() {
        for category in Category::RULE_ORDER {
            assert_eq!(Category::parse(category.as_str()), Some(category));
        }
        assert_eq!(Category::parse("general"), Some(Category::General));
        assert_eq!(Category::parse("weather"), None);
    }
}
