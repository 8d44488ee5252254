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

use crate::nlu::Category;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt::Write as _;
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub message: String,
    pub response: String,
}
/// Recent (message, response) pairs of one session. Pairs are stored
/// together so message and response counts never diverge.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    turns: VecDeque<Turn>,
    capacity: usize,
    topic: Option<Category>,
}
impl Default for ConversationContext {
    fn default() -> Self {
        Self::new(10)
    }
}
impl ConversationContext {
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
            topic: None,
        }
    }
    pub fn push(&mut self, message: &str, response: &str) {
        self.turns.push_back(Turn {
            message: message.to_string(),
            response: response.to_string(),
        });
        while self.turns.len() > self.capacity {
            self.turns.pop_front();
        }
    }
    pub fn clear(&mut self) {
        self.turns.clear();
        self.topic = None;
    }
    pub fn len(&self) -> usize {
        self.turns.len()
    }
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.turns.iter().map(|t| t.message.as_str())
    }
    pub fn responses(&self) -> impl Iterator<Item = &str> {
        self.turns.iter().map(|t| t.response.as_str())
    }
    pub const fn topic(&self) -> Option<Category> {
        self.topic
    }
    pub fn set_topic(&mut self, topic: Category) {
        self.topic = Some(topic);
    }
    pub fn summary(&self) -> String {
        let mut summary = String::from("Recent messages:\n");
        if let Some(topic) = self.topic {
            let _ = writeln!(summary, "Topic: {topic}");
        }
        for turn in &self.turns {
            let _ = write!(summary, "User: {}\nAssistant: {}\n\n", turn.message, turn.response);
        }
        summary
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn evicts_pairs_fifo() {
        let mut context = ConversationContext::new(2);
        context.push("a", "1");
        context.push("b", "2");
        context.push("c", "3");
        assert_eq!(context.messages().collect::<Vec<_>>(), vec!["b", "c"]);
        assert_eq!(context.responses().collect::<Vec<_>>(), vec!["2", "3"]);
    }
    #[test]
    fn clear_drops_topic() {
        let mut context = ConversationContext::default();
        context.push("hello", "hi");
        context.set_topic(Category::Greeting);
        assert!(context.summary().contains("Topic: greeting"));
        assert!(context.summary().contains("User: hello\nAssistant: hi"));
        context.clear();
        assert!(context.is_empty());
        assert_eq!(context.topic(), None);
        assert_eq!(context.summary(), "Recent messages:\n");
    }
}
