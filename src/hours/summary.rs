//! Condenses a day's commit messages into one short line.
//!
//! Merge messages usually name a finished feature, so they lead; the rest
//! follow in commit order. Messages are cleaned of merge boilerplate and
//! filler words, deduplicated, and whole messages are appended until the word
//! budget would be exceeded, at which point `...` marks the cut.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

const PULL_REQUEST_MARKER: &str = "Merge pull request";
const BRANCH_MARKER: &str = "Merge branch";
const ELLIPSIS: &str = "...";
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '?', '!'];

static STOP_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:ditto|almost\s+there|stable|ready)\b").expect("stop word pattern is valid")
});

static PULL_REQUEST_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*#\d+(?:\s+from\s+)?").expect("pull request pattern is valid"));

static QUOTED_BRANCH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*['"]([^'"]+)['"]"#).expect("branch pattern is valid"));

fn is_merge(message: &str) -> bool {
    let message = message.trim_start();
    message.starts_with(PULL_REQUEST_MARKER) || message.starts_with(BRANCH_MARKER)
}

/// Drops PR numbers, source owners and branch descriptors, keeping the marker
/// and the branch name: `Merge pull request #3 from team/feature-x` becomes
/// `Merge pull request feature-x`.
fn strip_merge_affixes(message: &str) -> String {
    let message = message.trim();
    if let Some(rest) = message.strip_prefix(PULL_REQUEST_MARKER) {
        let source = rest.rsplit('/').next().unwrap_or(rest);
        let source = PULL_REQUEST_NUMBER.replace(source, "");
        return format!("{PULL_REQUEST_MARKER} {}", source.trim());
    }
    if let Some(rest) = message.strip_prefix(BRANCH_MARKER) {
        let branch = match QUOTED_BRANCH.captures(rest) {
            Some(caps) => caps[1].to_string(),
            None => rest.split_whitespace().next().unwrap_or_default().to_string(),
        };
        return format!("{BRANCH_MARKER} {branch}");
    }
    message.to_string()
}

pub fn sanitize(message: &str) -> String {
    let subject = message.lines().next().unwrap_or_default();
    let stripped = if is_merge(subject) {
        strip_merge_affixes(subject)
    } else {
        subject.to_string()
    };

    let spaced = stripped.replace(['-', '_'], " ");
    let filtered = STOP_WORDS.replace_all(&spaced, " ");
    let collapsed = filtered.split_whitespace().collect::<Vec<_>>().join(" ");

    let trimmed = collapsed.trim();
    trimmed
        .strip_suffix(TRAILING_PUNCTUATION)
        .unwrap_or(trimmed)
        .trim_end()
        .to_string()
}

pub fn summarize<S: AsRef<str>>(messages: &[S], max_words: usize) -> String {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merges = Vec::new();
    let mut substantive = Vec::new();

    for raw in messages {
        let raw = raw.as_ref();
        let clean = sanitize(raw);
        if clean.is_empty() || !seen.insert(clean.clone()) {
            continue;
        }
        if is_merge(raw) {
            merges.push(clean);
        } else {
            substantive.push(clean);
        }
    }

    let mut parts: Vec<String> = Vec::new();
    let mut word_count = 0;
    for message in merges.into_iter().chain(substantive) {
        let words = message.split_whitespace().count();
        if word_count + words > max_words {
            parts.push(ELLIPSIS.to_string());
            break;
        }
        word_count += words;
        parts.push(message);
    }
    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn words_without_marker(summary: &str) -> usize {
        summary
            .trim_end_matches(ELLIPSIS)
            .split_whitespace()
            .count()
    }

    #[test]
    fn empty_input_empty_summary() {
        let none: [&str; 0] = [];
        assert_eq!(summarize(&none, 50), "");
    }

    #[test]
    fn merge_first_and_duplicates_collapsed() {
        let messages = ["Fix bug", "Fix bug", "Merge pull request #3 from team/feature-x"];
        assert_eq!(summarize(&messages, 50), "Merge pull request feature x; Fix bug");
    }

    #[test]
    fn merge_branch_keeps_only_the_branch_name() {
        assert_eq!(
            sanitize("Merge branch 'hotfix_login' of github.com:org/app into main"),
            "Merge branch hotfix login"
        );
        assert_eq!(sanitize("Merge branch develop into main"), "Merge branch develop");
    }

    #[test]
    fn pull_request_without_owner() {
        assert_eq!(sanitize("Merge pull request #12 from hotfix"), "Merge pull request hotfix");
    }

    #[test]
    fn stop_words_are_whole_words_only() {
        assert_eq!(sanitize("Ready for review, almost there"), "for review");
        assert_eq!(sanitize("Add already-stable flag"), "Add already flag");
        assert_eq!(sanitize("Readying the unstable parser"), "Readying the unstable parser");
    }

    #[test]
    fn strips_one_trailing_punctuation_mark() {
        assert_eq!(sanitize("Update docs."), "Update docs");
        assert_eq!(sanitize("Really?!"), "Really?");
        assert_eq!(sanitize("  spaced out ;  "), "spaced out");
    }

    #[test]
    fn filler_only_messages_vanish() {
        let messages = ["ditto", "Stable.", "ready!", "Wire up cache"];
        assert_eq!(summarize(&messages, 50), "Wire up cache");
    }

    #[test]
    fn cuts_at_whole_messages_with_marker() {
        let messages = ["Add parser", "Write tests for parser", "Fix lint"];
        assert_eq!(summarize(&messages, 6), "Add parser; Write tests for parser; ...");
        assert_eq!(summarize(&messages, 1), "...");
    }

    #[test]
    fn never_exceeds_the_word_budget() {
        let messages: Vec<String> = (0..40)
            .map(|i| format!("Change number {i} touches {} files", i % 7))
            .collect();
        for budget in [0, 3, 5, 11, 50, 500] {
            let summary = summarize(&messages, budget);
            assert!(words_without_marker(&summary) <= budget, "{budget}: {summary}");
        }
    }

    #[test]
    fn deterministic() {
        let messages = ["b", "Merge branch 'x'", "a", "b"];
        assert_eq!(summarize(&messages, 10), summarize(&messages, 10));
    }
}
