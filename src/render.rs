//! Review document rendering.
//!
//! Wraps a [`ComposedDocument`] in a fixed, minimal HTML page:
//!
//! ```text
//! <!DOCTYPE html>
//! html lang="ko"
//! ├── head: charset, viewport, title
//! └── body > article
//!     ├── h1            restaurant name
//!     ├── p.visit-date  YYYYMMDD
//!     ├── section.info  h2 + ul (only when there are info lines)
//!     └── p             one per paragraph, or a single empty p
//! ```
//!
//! Uses [maud](https://maud.lambda.xyz/), so every dynamic string is escaped.

use crate::compose::ComposedDocument;
use maud::{DOCTYPE, Markup, html};

fn base_document(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="ko" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) }
            }
            body {
                (content)
            }
        }
    }
}

fn info_section(heading: &str, lines: &[String]) -> Markup {
    html! {
        section.info {
            h2 { (heading) }
            ul {
                @for line in lines {
                    li { (line) }
                }
            }
        }
    }
}

/// Render the review page as an HTML string.
pub fn render_document(doc: &ComposedDocument) -> String {
    let content = html! {
        article {
            h1 { (doc.restaurant_name) }
            p.visit-date { (doc.visit_date) }
            @if !doc.info_lines.is_empty() {
                (info_section(&doc.info_heading, &doc.info_lines))
            }
            @if doc.paragraphs.is_empty() {
                p {}
            }
            @for paragraph in &doc.paragraphs {
                p { (paragraph) }
            }
        }
    };
    base_document(&doc.title, content).into_string()
}
