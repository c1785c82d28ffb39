//! Content rules for rendered review documents.
//!
//! [`validate_html_document`] runs a flat checklist over the HTML text. Every
//! rule is evaluated independently and all violations are reported in one
//! pass, in this order:
//!
//! | Rule | Violation text |
//! |------|----------------|
//! | `<html`, `<head`, `<body` present | `missing <html> tag` (one per tag) |
//! | no banned literal (case-insensitive) | `contains banned token: <literal>` |
//! | no emoji | `contains emoji` |
//! | no review wording without recent reviews | `mentions reviews without recent review data: <keyword>` |
//! | no line that is a double-quoted sentence | `contains quoted full-sentence emphasis: <line>` |
//!
//! The same banned literals and emoji ranges are used by the composer's
//! sanitizer, so composed text can never trip the first three content rules.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Substrings a published document must not contain.
pub const BANNED_LITERALS: [&str; 4] = ["**", "<hr", ".gif", "image/gif"];

/// Wording that claims review-derived content. Only allowed when recent
/// reviews were actually retrieved.
pub const REVIEW_REFERENCE_KEYWORDS: [&str; 3] = ["최근 리뷰", "리뷰에서", "review"];

/// Pictograph blocks treated as emoji.
pub const EMOJI_RANGES: [(u32, u32); 5] = [
    (0x1F300, 0x1F5FF),
    (0x1F600, 0x1F64F),
    (0x1F680, 0x1F6FF),
    (0x1F900, 0x1F9FF),
    (0x1FA70, 0x1FAFF),
];

/// Double quotes, straight and curly.
pub const QUOTE_CHARS: [char; 3] = ['"', '\u{201C}', '\u{201D}'];

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

pub fn is_emoji(c: char) -> bool {
    let code = c as u32;
    EMOJI_RANGES
        .iter()
        .any(|&(start, end)| (start..=end).contains(&code))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesReport {
    pub passed: bool,
    pub violations: Vec<String>,
}

impl RulesReport {
    fn from_violations(violations: Vec<String>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
        }
    }
}

/// Check a rendered document against every content rule.
pub fn validate_html_document(html: &str, recent_review_count: usize) -> RulesReport {
    let lowered = html.to_lowercase();
    let mut violations = Vec::new();

    for tag in ["html", "head", "body"] {
        if !lowered.contains(&format!("<{tag}")) {
            violations.push(format!("missing <{tag}> tag"));
        }
    }

    for literal in BANNED_LITERALS {
        if lowered.contains(literal) {
            violations.push(format!("contains banned token: {literal}"));
        }
    }

    if html.chars().any(is_emoji) {
        violations.push("contains emoji".to_string());
    }

    if recent_review_count == 0 {
        if let Some(keyword) = REVIEW_REFERENCE_KEYWORDS
            .iter()
            .find(|keyword| lowered.contains(&keyword.to_lowercase()))
        {
            violations.push(format!(
                "mentions reviews without recent review data: {keyword}"
            ));
        }
    }

    if let Some(line) = find_quoted_sentence(html) {
        violations.push(format!("contains quoted full-sentence emphasis: {line}"));
    }

    RulesReport::from_violations(violations)
}

/// First text line (outside tags) that is entirely a quoted sentence.
fn find_quoted_sentence(html: &str) -> Option<String> {
    let text = TAG.replace_all(html, "\n");
    let text = text
        .replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&ldquo;", "\u{201C}")
        .replace("&rdquo;", "\u{201D}");

    text.lines()
        .map(str::trim)
        .find(|line| is_quoted_sentence(line))
        .map(str::to_string)
}

fn is_quoted_sentence(line: &str) -> bool {
    let mut chars = line.chars();
    let (Some(first), Some(last)) = (chars.next(), chars.next_back()) else {
        return false;
    };
    if !QUOTE_CHARS.contains(&first) || !QUOTE_CHARS.contains(&last) {
        return false;
    }
    let inner = chars.as_str().trim();
    if inner.is_empty() {
        return false;
    }
    inner.split_whitespace().count() >= 2
        || inner.ends_with(['.', '!', '?', '\u{3002}'])
}
