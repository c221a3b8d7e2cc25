// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! `@mention` parsing
//!
//! Two forms are recognized: bracketed `@[Display Name]` and bare
//! `@handle`. A bare mention must not follow a word character, so e-mail
//! addresses are left alone. `@all` addresses the whole roster.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// Mention that addresses every agent
pub const ALL: &str = "all";

static BRACKETED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@\[([^\]]+)\]").unwrap());

static BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[^\w@])@(\w(?:[\w.-]*\w)?)").unwrap());

/// A mention found in text: byte span of the whole syntax plus the name
struct Span {
    start: usize,
    end: usize,
    name: String,
}

fn mention_spans(text: &str) -> Vec<Span> {
    let mut spans: Vec<Span> = Vec::new();

    for caps in BRACKETED.captures_iter(text) {
        if let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) {
            spans.push(Span {
                start: whole.start(),
                end: whole.end(),
                name: name.as_str().trim().to_string(),
            });
        }
    }
    for caps in BARE.captures_iter(text) {
        if let Some(name) = caps.get(2) {
            spans.push(Span {
                // the '@' sits right before the handle
                start: name.start() - 1,
                end: name.end(),
                name: name.as_str().to_string(),
            });
        }
    }
    spans.sort_by_key(|span| span.start);
    spans
}

/// Extract mentions in order of appearance, de-duplicated case-insensitively.
///
/// Any spelling of `all` is normalized to [`ALL`].
pub fn extract_mentions(text: &str) -> Vec<String> {
    dedup(mention_spans(text).into_iter().map(|span| {
        if span.name.eq_ignore_ascii_case(ALL) {
            ALL.to_string()
        } else {
            span.name
        }
    }))
}

/// Merge explicitly supplied mentions with those found in the text.
///
/// Explicit mentions come first; duplicates are dropped case-insensitively,
/// keeping the first spelling seen.
pub fn merge_mentions(explicit: &[String], from_text: Vec<String>) -> Vec<String> {
    dedup(
        explicit
            .iter()
            .map(|m| m.trim().to_string())
            .chain(from_text)
            .filter(|m| !m.is_empty()),
    )
}

/// Whether the mention list addresses the whole roster
pub fn mentions_all(mentions: &[String]) -> bool {
    mentions.iter().any(|m| m.eq_ignore_ascii_case(ALL))
}

fn dedup(mentions: impl Iterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    mentions
        .filter(|m| seen.insert(m.to_lowercase()))
        .collect()
}

/// Remove all mention syntax from a prompt.
///
/// Text without mentions is returned untouched. Otherwise mentions are
/// removed together with the whitespace that follows them and the result is
/// trimmed; removal repeats until nothing changes, so the operation is
/// idempotent.
pub fn strip_mentions(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_once(text: &str) -> String {
    let spans = mention_spans(text);
    if spans.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for span in spans {
        // Overlapping syntax, e.g. a bare handle inside brackets
        if span.start < cursor {
            continue;
        }
        out.push_str(&text[cursor..span.start]);
        let rest = &text[span.end..];
        let trailing = rest.len() - rest.trim_start().len();
        if trailing == 0 {
            // Glued to punctuation or the end: drop the space before instead
            let kept = out.trim_end().len();
            out.truncate(kept);
        }
        cursor = span.end + trailing;
    }
    out.push_str(&text[cursor..]);
    out.trim().to_string()
}
