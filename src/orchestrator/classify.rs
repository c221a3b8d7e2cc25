// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Keyword classification of user prompts
//!
//! Counts how many keywords of each category occur (as substrings) in the
//! lowercased prompt. A category wins only with strictly more hits than both
//! others; ties and zero scores fall back to `General`.

use super::types::AgentRole;

const PLANNING_KEYWORDS: &[&str] = &[
    "plan",
    "planning",
    "brainstorm",
    "ideas",
    "think about",
    "design",
    "architect",
    "strategy",
    "approach",
    "outline",
    "what should",
    "how should",
    "let's discuss",
    "think through",
    "consider",
    "propose",
    "suggest",
    "recommendation",
];

const CODING_KEYWORDS: &[&str] = &[
    "code",
    "coding",
    "implement",
    "write",
    "build",
    "create",
    "function",
    "class",
    "method",
    "api",
    "endpoint",
    "database",
    "fix bug",
    "debug",
    "refactor",
    "program",
    "script",
    "develop",
    "html",
    "css",
    "javascript",
    "python",
    "go",
    "swift",
    "react",
];

const REVIEW_KEYWORDS: &[&str] = &[
    "review",
    "check",
    "analyze",
    "evaluate",
    "assess",
    "feedback",
    "improve",
    "optimize",
    "critique",
    "look at",
    "what's wrong",
    "find issues",
    "bugs in",
];

/// Hit counts per category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CategoryScores {
    pub planning: usize,
    pub coding: usize,
    pub review: usize,
}

fn hits(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|k| text.contains(*k)).count()
}

/// Score a prompt against every keyword list
pub fn score(prompt: &str) -> CategoryScores {
    let lower = prompt.to_lowercase();
    CategoryScores {
        planning: hits(&lower, PLANNING_KEYWORDS),
        coding: hits(&lower, CODING_KEYWORDS),
        review: hits(&lower, REVIEW_KEYWORDS),
    }
}

/// Classify a prompt into the role best suited to answer it
pub fn classify_task(prompt: &str) -> AgentRole {
    let s = score(prompt);
    if s.planning > s.coding && s.planning > s.review {
        AgentRole::Planner
    } else if s.coding > s.planning && s.coding > s.review {
        AgentRole::Coder
    } else if s.review > s.planning && s.review > s.coding {
        AgentRole::Reviewer
    } else {
        AgentRole::General
    }
}
