//! Review text composition.
//!
//! Turns a manifest, its restaurant record and the per-image vision results
//! into the plain-text pieces of a review document: a title, info lines and
//! narrative paragraphs. All wording comes from the [`PromptSet`]; this module
//! only decides which pieces appear and what values fill them.
//!
//! Paragraph order:
//!
//! 1. intro (always)
//! 2. scene summary: top three scene types by image count
//! 3. observations: up to three distinct snippets
//! 4. food guesses: up to three distinct snippets
//! 5. review teaser from the most recent review
//! 6. fallback paragraph, only when nothing but the intro was written
//!
//! Every line goes through [`sanitize_text`] and lines that end up empty are
//! dropped.

use crate::places::{RestaurantInfo, RestaurantReview};
use crate::prompts::PromptSet;
use crate::rules::{QUOTE_CHARS, is_emoji};
use crate::scan::Manifest;
use crate::vision::VisionImageResult;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Review teaser length in characters, before the ellipsis.
const REVIEW_SUMMARY_CHARS: usize = 90;
const SNIPPET_LIMIT: usize = 3;
const TOP_SCENES: usize = 3;
const OPENING_HOURS_SHOWN: usize = 2;

/// Replacements applied by the sanitizer, matched case-insensitively.
/// Covers every entry of [`crate::rules::BANNED_LITERALS`].
const REPLACEMENTS: [(&str, &str); 4] = [
    ("**", ""),
    ("<hr", "hr"),
    ("image/gif", "image"),
    (".gif", ".img"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedDocument {
    pub title: String,
    pub restaurant_name: String,
    pub visit_date: String,
    pub info_heading: String,
    pub info_lines: Vec<String>,
    pub paragraphs: Vec<String>,
}

/// Compose the document text for one visit folder.
pub fn compose(
    manifest: &Manifest,
    info: &RestaurantInfo,
    vision: &[VisionImageResult],
    prompts: &PromptSet,
) -> ComposedDocument {
    let title = format_template(
        &prompts.title_template,
        &[("restaurant_name", manifest.restaurant_name.clone())],
    );
    ComposedDocument {
        title: sanitize_text(&title),
        restaurant_name: sanitize_text(&manifest.restaurant_name),
        visit_date: manifest.visit_date.clone(),
        info_heading: sanitize_text(&prompts.info_heading),
        info_lines: build_info_lines(info, prompts),
        paragraphs: build_paragraphs(manifest, info, vision, prompts),
    }
}

/// Address, hours, rating, website and map lines; or the missing-info line.
pub fn build_info_lines(info: &RestaurantInfo, prompts: &PromptSet) -> Vec<String> {
    let mut lines = Vec::new();
    if info.found {
        if !info.address.is_empty() {
            lines.push(format!("주소: {}", info.address));
        }
        if !info.opening_hours.is_empty() {
            let shown: Vec<&str> = info
                .opening_hours
                .iter()
                .take(OPENING_HOURS_SHOWN)
                .map(String::as_str)
                .collect();
            lines.push(format!("영업시간: {}", shown.join(", ")));
        }
        if let Some(rating) = info.rating {
            let mut line = format!("평점 정보: {}", format_rating(rating));
            if let Some(total) = info.user_ratings_total {
                line.push_str(&format!(" ({total}건 기준)"));
            }
            lines.push(line);
        }
        if !info.website.is_empty() {
            lines.push(format!("웹사이트: {}", info.website));
        }
        if !info.maps_url.is_empty() {
            lines.push(format!("지도: {}", info.maps_url));
        }
    } else {
        lines.push(prompts.missing_info_line.clone());
    }
    sanitize_all(lines)
}

/// Ratings always show a decimal point: `4.0`, `4.35`.
fn format_rating(rating: f64) -> String {
    if rating.is_finite() && rating.fract() == 0.0 {
        format!("{rating:.1}")
    } else {
        rating.to_string()
    }
}

pub fn build_paragraphs(
    manifest: &Manifest,
    info: &RestaurantInfo,
    vision: &[VisionImageResult],
    prompts: &PromptSet,
) -> Vec<String> {
    let mut paragraphs = vec![format_template(
        &prompts.intro_template,
        &[
            ("visit_date", manifest.visit_date.clone()),
            ("image_count", manifest.images.len().to_string()),
            ("restaurant_name", manifest.restaurant_name.clone()),
        ],
    )];

    // Scene counts in first-seen order; the stable sort keeps that order on ties.
    let mut scene_counts: Vec<(&str, usize)> = Vec::new();
    let mut observations = Vec::new();
    let mut food_guesses = Vec::new();
    for analysis in vision.iter().filter_map(|r| r.analysis.as_ref()) {
        let scene = analysis.scene_type.as_str();
        match scene_counts.iter_mut().find(|(name, _)| *name == scene) {
            Some((_, count)) => *count += 1,
            None => scene_counts.push((scene, 1)),
        }
        observations.extend(analysis.observations.iter().map(String::as_str));
        food_guesses.extend(analysis.food_guess.iter().map(String::as_str));
    }

    if !scene_counts.is_empty() {
        scene_counts.sort_by(|a, b| b.1.cmp(&a.1));
        let scene_text = scene_counts
            .iter()
            .take(TOP_SCENES)
            .map(|(scene, count)| format!("{scene} {count}장"))
            .collect::<Vec<_>>()
            .join(", ");
        paragraphs.push(format_template(
            &prompts.scene_summary_template,
            &[
                ("scene_text", scene_text),
                ("restaurant_name", manifest.restaurant_name.clone()),
            ],
        ));
    }

    let observations = unique_limited(&observations, SNIPPET_LIMIT);
    if !observations.is_empty() {
        paragraphs.push(format!(
            "{}{}",
            prompts.observations_prefix,
            observations.join(" / ")
        ));
    }

    let food_guesses = unique_limited(&food_guesses, SNIPPET_LIMIT);
    if !food_guesses.is_empty() {
        paragraphs.push(format!(
            "{}{}",
            prompts.food_guess_prefix,
            food_guesses.join(", ")
        ));
    }

    if let Some(latest) = most_recent(&info.recent_reviews) {
        let summary = trim_text(&latest.text, REVIEW_SUMMARY_CHARS);
        if !summary.is_empty() {
            paragraphs.push(format_template(
                &prompts.recent_review_template,
                &[
                    ("review_count", info.recent_reviews.len().to_string()),
                    ("summary", summary),
                    ("cutoff_days", info.recent_reviews_cutoff_days.to_string()),
                    ("restaurant_name", manifest.restaurant_name.clone()),
                ],
            ));
        }
    }

    if paragraphs.len() == 1 {
        paragraphs.push(prompts.fallback_paragraph.clone());
    }

    sanitize_all(paragraphs)
}

/// Latest review by timestamp; the earliest listed wins a tie.
fn most_recent(reviews: &[RestaurantReview]) -> Option<&RestaurantReview> {
    reviews
        .iter()
        .reduce(|best, review| if review.time > best.time { review } else { best })
}

fn sanitize_all(lines: Vec<String>) -> Vec<String> {
    lines
        .iter()
        .map(|line| sanitize_text(line))
        .filter(|line| !line.is_empty())
        .collect()
}

/// Distinct trimmed non-empty values in input order, at most `limit`.
pub fn unique_limited(values: &[&str], limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && seen.insert(*v))
        .take(limit)
        .map(str::to_string)
        .collect()
}

/// Collapse newlines and cut to `max_chars`, marking a cut with `...`.
pub fn trim_text(value: &str, max_chars: usize) -> String {
    let cleaned = value.trim().replace(['\r', '\n'], " ");
    if cleaned.chars().count() <= max_chars {
        return cleaned;
    }
    let cut: String = cleaned.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

/// Fill `{name}` placeholders from `values`.
///
/// `{{` and `}}` are literal braces. An unknown placeholder or an unbalanced
/// brace returns the template unchanged.
pub fn format_template(template: &str, values: &[(&str, String)]) -> String {
    try_format(template, values).unwrap_or_else(|| template.to_string())
}

fn try_format(template: &str, values: &[(&str, String)]) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut key = String::new();
                loop {
                    match chars.next()? {
                        '}' => break,
                        '{' => return None,
                        c => key.push(c),
                    }
                }
                let (_, value) = values.iter().find(|(name, _)| *name == key)?;
                out.push_str(value);
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return None,
            c => out.push(c),
        }
    }
    Some(out)
}

/// Strip banned literals, emoji and double quotes (straight or curly), then trim.
///
/// Applied until nothing changes, so the result is a fixed point.
pub fn sanitize_text(value: &str) -> String {
    let mut current = sanitize_once(value);
    loop {
        let next = sanitize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn sanitize_once(value: &str) -> String {
    let mut text: String = value
        .chars()
        .filter(|c| !QUOTE_CHARS.contains(c) && !is_emoji(*c))
        .collect();
    for (from, to) in REPLACEMENTS {
        text = replace_ignore_ascii_case(&text, from, to);
    }
    text.trim().to_string()
}

/// Replace every ASCII-case-insensitive occurrence of `from` (ASCII only).
fn replace_ignore_ascii_case(text: &str, from: &str, to: &str) -> String {
    let haystack = text.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (start, _) in haystack.match_indices(from) {
        out.push_str(&text[last..start]);
        out.push_str(to);
        last = start + from.len();
    }
    out.push_str(&text[last..]);
    out
}
