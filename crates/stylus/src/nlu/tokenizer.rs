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
use std::collections::HashSet;
static NON_WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").expect("static regex"));
static DISALLOWED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s\?!\.]").expect("static regex"));
/// Scale applied to a token's character count when it becomes a feature.
pub const TOKEN_LENGTH_SCALE: f64 = 10.0;
pub fn tokenize(text: &str) -> Vec<String> {
    NON_WORD_RE
        .split(&text.to_lowercase())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}
/// Fixed-length numeric view of `text`: the first `size` tokens mapped to
/// their character count over [`TOKEN_LENGTH_SCALE`], zero-padded.
pub fn extract_features(text: &str, size: usize) -> Vec<f64> {
    let mut features: Vec<f64> = tokenize(text)
        .iter()
        .take(size)
        .map(|token| token.chars().count() as f64 / TOKEN_LENGTH_SCALE)
        .collect();
    features.resize(size, 0.0);
    features
}
pub fn token_features(text: &str, size: usize) -> Vec<String> {
    let mut tokens: Vec<String> = tokenize(text).into_iter().take(size).collect();
    tokens.resize(size, String::new());
    tokens
}
pub fn preprocess(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped = DISALLOWED_RE.replace_all(&lowered, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let left: HashSet<String> = tokenize(a).into_iter().collect();
    let right: HashSet<String> = tokenize(b).into_iter().collect();
    let union = left.union(&right).count();
    if union == 0 {
        return 0.0;
    }
    left.intersection(&right).count() as f64 / union as f64
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn tokenize_lowercases_and_drops_empty_runs() {
        assert_eq!(
            tokenize("  Hello,   World!! How's it?"),
            vec!["hello", "world", "how", "s", "it"]
        );
        assert!(tokenize("").is_empty());
        assert!(tokenize("?!. ,,").is_empty());
    }
    #[test]
    fn tokenize_keeps_non_ascii_letters() {
        assert_eq!(tokenize("Čau, ďakujem!"), vec!["čau", "ďakujem"]);
    }
    #[test]
    fn features_pad_and_truncate() {
        assert_eq!(extract_features("", 3), vec![0.0, 0.0, 0.0]);
        assert_eq!(extract_features("ahoj", 3), vec![0.4, 0.0, 0.0]);
        assert_eq!(extract_features("a bb ccc dddd", 2), vec![0.1, 0.2]);
        assert!(extract_features("anything", 0).is_empty());
    }
    #[test]
    fn features_count_characters_not_bytes() {
        assert_eq!(extract_features("čau", 1), vec![0.3]);
    }
    #[test]
    fn token_features_pad_with_empty_strings() {
        assert_eq!(token_features("one two", 3), vec!["one", "two", ""]);
    }
    #[test]
    fn preprocess_strips_and_collapses() {
        assert_eq!(preprocess("  Hello,\tWORLD!!  (ok)? "), "hello world!! ok?");
        assert_eq!(preprocess("a.b#c"), "a.bc");
    }
    #[test]
    fn jaccard_over_token_sets() {
        assert!((jaccard_similarity("a b c", "b c d") - 0.5).abs() < 1e-12);
        assert!((jaccard_similarity("same words", "Same, words!") - 1.0).abs() < 1e-12);
        assert_eq!(jaccard_similarity("", ""), 0.0);
    }
}
