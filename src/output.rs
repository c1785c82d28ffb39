//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Run
//!
//! One summary line per completed stage, then one entry per visit folder:
//!
//! ```text
//! Stage 1 completed. selected_folders=1
//! Stage 2 completed. restaurant_infos=1 found=1
//! Stage 3 completed. vision_images=2 analyzed=2
//! Stage 4 completed. outputs=1 rules_passed=0/1
//!
//! 001 20260214_스시로쿠 (2 photos)
//!     Restaurant: found
//!     Vision: 2/2 analyzed
//!     Rules: failed
//!         - mentions reviews without recent review data: review
//! ```
//!
//! ## Validate
//!
//! ```text
//! Rules: failed
//!     - missing <body> tag
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::pipeline::{FolderOutcome, RunReport, Stage};
use crate::rules::RulesReport;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn rules_lines(report: &RulesReport, depth: usize) -> Vec<String> {
    let status = if report.passed { "passed" } else { "failed" };
    let mut lines = vec![format!("{}Rules: {}", indent(depth), status)];
    lines.extend(
        report
            .violations
            .iter()
            .map(|v| format!("{}- {}", indent(depth + 1), v)),
    );
    lines
}

fn folder_lines(index: usize, folder: &FolderOutcome) -> Vec<String> {
    let mut lines = vec![format!(
        "{} {} ({} photos)",
        format_index(index),
        folder.folder_name,
        folder.image_count
    )];
    if let Some(found) = folder.restaurant_found {
        let status = if found { "found" } else { "not found" };
        lines.push(format!("{}Restaurant: {}", indent(1), status));
    }
    if let Some(analyzed) = folder.analyzed_images {
        lines.push(format!(
            "{}Vision: {}/{} analyzed",
            indent(1),
            analyzed,
            folder.image_count
        ));
    }
    if let Some(rules) = &folder.rules {
        lines.extend(rules_lines(rules, 1));
    }
    lines
}

/// Stage summaries followed by the per-folder listing.
pub fn format_run_report(report: &RunReport) -> Vec<String> {
    let folders = &report.folders;
    let mut lines = vec![format!(
        "Stage 1 completed. selected_folders={}",
        report.selected_folders
    )];

    if report.completed_stage >= Stage::Restaurant {
        let found = folders
            .iter()
            .filter(|f| f.restaurant_found == Some(true))
            .count();
        lines.push(format!(
            "Stage 2 completed. restaurant_infos={} found={}",
            folders.len(),
            found
        ));
    }
    if report.completed_stage >= Stage::Vision {
        let images: usize = folders.iter().map(|f| f.image_count).sum();
        let analyzed: usize = folders.iter().filter_map(|f| f.analyzed_images).sum();
        lines.push(format!(
            "Stage 3 completed. vision_images={} analyzed={}",
            images, analyzed
        ));
    }
    if report.completed_stage >= Stage::Compose {
        lines.push(format!(
            "Stage 4 completed. outputs={} rules_passed={}/{}",
            folders.len(),
            report.passed_count(),
            folders.len()
        ));
    }

    for (i, folder) in folders.iter().enumerate() {
        lines.push(String::new());
        lines.extend(folder_lines(i + 1, folder));
    }
    lines
}

/// Print run output to stdout.
pub fn print_run_report(report: &RunReport) {
    for line in format_run_report(report) {
        println!("{}", line);
    }
}

/// Validation result for a single document.
pub fn format_rules_report(report: &RulesReport) -> Vec<String> {
    rules_lines(report, 0)
}

/// Print validation output to stdout.
pub fn print_rules_report(report: &RulesReport) {
    for line in format_rules_report(report) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(rules: Option<RulesReport>) -> FolderOutcome {
        FolderOutcome {
            folder_name: "20260214_스시로쿠".into(),
            image_count: 2,
            restaurant_found: Some(false),
            analyzed_images: Some(1),
            rules,
        }
    }

    fn failed() -> RulesReport {
        RulesReport {
            passed: false,
            violations: vec!["missing <body> tag".into()],
        }
    }

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(100), "100");
    }

    // =========================================================================
    // Run report
    // =========================================================================

    #[test]
    fn full_run_output() {
        let report = RunReport {
            selected_folders: 1,
            completed_stage: Stage::Compose,
            folders: vec![folder(Some(failed()))],
        };
        assert_eq!(
            format_run_report(&report),
            vec![
                "Stage 1 completed. selected_folders=1",
                "Stage 2 completed. restaurant_infos=1 found=0",
                "Stage 3 completed. vision_images=2 analyzed=1",
                "Stage 4 completed. outputs=1 rules_passed=0/1",
                "",
                "001 20260214_스시로쿠 (2 photos)",
                "    Restaurant: not found",
                "    Vision: 1/2 analyzed",
                "    Rules: failed",
                "        - missing <body> tag",
            ]
        );
    }

    #[test]
    fn stage_one_output_has_single_summary() {
        let report = RunReport {
            selected_folders: 1,
            completed_stage: Stage::Discover,
            folders: vec![FolderOutcome {
                restaurant_found: None,
                analyzed_images: None,
                ..folder(None)
            }],
        };
        assert_eq!(
            format_run_report(&report),
            vec![
                "Stage 1 completed. selected_folders=1",
                "",
                "001 20260214_스시로쿠 (2 photos)",
            ]
        );
    }

    // =========================================================================
    // Rules report
    // =========================================================================

    #[test]
    fn passed_rules_report() {
        let report = RulesReport {
            passed: true,
            violations: vec![],
        };
        assert_eq!(format_rules_report(&report), vec!["Rules: passed"]);
    }

    #[test]
    fn failed_rules_report_lists_violations() {
        assert_eq!(
            format_rules_report(&failed()),
            vec!["Rules: failed", "    - missing <body> tag"]
        );
    }
}
