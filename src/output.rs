//! CLI output formatting.
//!
//! # Information-First Display
//!
//! The primary line for every entity (asset, breakpoint, source) is its
//! identity; URLs and sizes follow as indented context lines. Long data URLs
//! are shortened so a plan stays readable in a terminal.
//!
//! ## Plan
//!
//! ```text
//! main::dawn.jpg → /assets/dawn.jpg (2400×1800)
//!     Attributes: alt="Dawn" class="hero"
//!     Placeholder: included
//! 001 default
//!     webp (image/webp): 16 entries
//!         /img/dawn.jpg?fm=webp&q=90&fit=crop-50-50&w=2400&h=1800 2400w
//!         ...
//! 002 md (min-width: 768px)
//!     ...
//! ```
//!
//! ## Widths
//!
//! ```text
//! Widths (3)
//! 001 340×280
//! 002 284×234
//! 003 237×195
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions do
//! no I/O.

use crate::config::Config;
use crate::dimensions::Dimensions;
use crate::responsive::{PlannedBreakpoint, RenderPlan};

/// Data URLs longer than this are shortened.
const MAX_DATA_URL: usize = 40;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Shorten the URL part of a srcset entry when it is a data URL.
fn srcset_entry_line(entry: &str) -> String {
    if !entry.starts_with("data:") {
        return entry.to_string();
    }
    match entry.rsplit_once(' ') {
        Some((url, descriptor)) => format!("{} {}", truncate(url, MAX_DATA_URL), descriptor),
        None => truncate(entry, MAX_DATA_URL),
    }
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

// ============================================================================
// Plan
// ============================================================================

fn breakpoint_lines(index: usize, breakpoint: &PlannedBreakpoint) -> Vec<String> {
    let mut lines = Vec::new();
    if breakpoint.media.is_empty() {
        lines.push(format!("{} {}", format_index(index), breakpoint.label));
    } else {
        lines.push(format!(
            "{} {} {}",
            format_index(index),
            breakpoint.label,
            breakpoint.media
        ));
    }

    if breakpoint.sources.is_empty() {
        lines.push(format!("{}(no sources)", indent(1)));
    }
    for source in &breakpoint.sources {
        let entries: Vec<&str> = if source.srcset.is_empty() {
            Vec::new()
        } else {
            source.srcset.split(", ").collect()
        };
        lines.push(format!(
            "{}{} ({}): {}",
            indent(1),
            source.format,
            source.mime_type,
            plural(entries.len(), "entry", "entries")
        ));
        for entry in entries {
            lines.push(format!("{}{}", indent(2), srcset_entry_line(entry)));
        }
    }
    lines
}

/// Format a render plan as an indented tree.
pub fn format_plan(plan: &RenderPlan) -> Vec<String> {
    let mut lines = vec![format!(
        "{} → {} ({}×{})",
        plan.asset, plan.img.src, plan.img.width, plan.img.height
    )];

    if !plan.attributes.is_empty() {
        let attributes: Vec<String> = plan
            .attributes
            .iter()
            .map(|(name, value)| format!("{name}=\"{value}\""))
            .collect();
        lines.push(format!("{}Attributes: {}", indent(1), attributes.join(" ")));
    }
    if plan.passthrough {
        lines.push(format!("{}Passthrough: served as-is", indent(1)));
        return lines;
    }
    lines.push(format!(
        "{}Placeholder: {}",
        indent(1),
        if plan.placeholder.is_some() {
            "included"
        } else {
            "none"
        }
    ));

    for (i, breakpoint) in plan.breakpoints.iter().enumerate() {
        lines.extend(breakpoint_lines(i + 1, breakpoint));
    }
    lines
}

pub fn print_plan(plan: &RenderPlan) {
    for line in format_plan(plan) {
        println!("{}", line);
    }
}

// ============================================================================
// Widths
// ============================================================================

pub fn format_widths(dimensions: &[Dimensions]) -> Vec<String> {
    let mut lines = vec![format!("Widths ({})", dimensions.len())];
    for (i, dims) in dimensions.iter().enumerate() {
        lines.push(format!(
            "{} {}×{}",
            format_index(i + 1),
            dims.width,
            dims.height
        ));
    }
    lines
}

pub fn print_widths(dimensions: &[Dimensions]) {
    for line in format_widths(dimensions) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// Summarize a validated configuration.
pub fn format_check(config: &Config, source: Option<&str>) -> Vec<String> {
    let mut lines = vec!["Config".to_string()];
    lines.push(format!("{}{}", indent(1), source.unwrap_or("(stock defaults)")));

    lines.push("Breakpoints".to_string());
    for (label, min_width) in config.breakpoint_table() {
        lines.push(format!(
            "{}{} {}{}",
            indent(1),
            label,
            min_width,
            config.breakpoint_unit
        ));
    }

    let mut formats = Vec::new();
    if config.avif {
        formats.push("avif");
    }
    if config.webp {
        formats.push("webp");
    }
    formats.push("original");
    lines.push(format!("Formats: {}", formats.join(", ")));
    if let Some(max) = config.max_width {
        lines.push(format!("Max width: {max}"));
    }
    lines
}

pub fn print_check(config: &Config, source: Option<&str>) {
    for line in format_check(config, source) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Format;
    use crate::responsive::{ImgTag, PlannedSource};

    fn plan() -> RenderPlan {
        RenderPlan {
            asset: "main::dawn.jpg".into(),
            passthrough: false,
            img: ImgTag {
                src: "/assets/dawn.jpg".into(),
                width: 340,
                height: 280,
            },
            attributes: vec![("alt".into(), "Dawn".into())],
            include_placeholder: true,
            placeholder: Some("data:image/svg+xml;base64,AAAA".into()),
            breakpoints: vec![
                PlannedBreakpoint {
                    label: "default".into(),
                    min_width: 0,
                    media: String::new(),
                    sources: vec![PlannedSource {
                        format: Format::Webp,
                        mime_type: "image/webp".into(),
                        srcset: format!(
                            "data:image/svg+xml;base64,{} 32w, /img/dawn.jpg?w=340 340w",
                            "A".repeat(100)
                        ),
                    }],
                    placeholder: String::new(),
                },
                PlannedBreakpoint {
                    label: "md".into(),
                    min_width: 768,
                    media: "(min-width: 768px)".into(),
                    sources: vec![],
                    placeholder: String::new(),
                },
            ],
        }
    }

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(100), "100");
    }

    #[test]
    fn truncate_short_and_long() {
        assert_eq!(truncate("short", 40), "short");
        assert_eq!(truncate(&"a".repeat(50), 40), format!("{}...", "a".repeat(40)));
    }

    #[test]
    fn data_url_entries_are_shortened() {
        let entry = format!("data:image/png;base64,{} 32w", "A".repeat(100));
        let line = srcset_entry_line(&entry);
        assert!(line.ends_with("... 32w"));
        assert!(line.len() < 60);
        assert_eq!(srcset_entry_line("/img/a.jpg?w=1 1w"), "/img/a.jpg?w=1 1w");
    }

    // =========================================================================
    // Plan
    // =========================================================================

    #[test]
    fn plan_header_and_context() {
        let lines = format_plan(&plan());
        assert_eq!(lines[0], "main::dawn.jpg → /assets/dawn.jpg (340×280)");
        assert_eq!(lines[1], "    Attributes: alt=\"Dawn\"");
        assert_eq!(lines[2], "    Placeholder: included");
    }

    #[test]
    fn plan_breakpoints_and_sources() {
        let lines = format_plan(&plan());
        assert_eq!(lines[3], "001 default");
        assert_eq!(lines[4], "    webp (image/webp): 2 entries");
        assert!(lines[5].starts_with("        data:image/svg+xml;base64,"));
        assert_eq!(lines[6], "        /img/dawn.jpg?w=340 340w");
        assert_eq!(lines[7], "002 md (min-width: 768px)");
        assert_eq!(lines[8], "    (no sources)");
    }

    #[test]
    fn passthrough_plan_stops_after_header() {
        let mut plan = plan();
        plan.passthrough = true;
        let lines = format_plan(&plan);
        assert_eq!(lines.last().unwrap(), "    Passthrough: served as-is");
        assert_eq!(lines.len(), 3);
    }

    // =========================================================================
    // Widths and check
    // =========================================================================

    #[test]
    fn widths_listing() {
        let lines = format_widths(&[Dimensions::new(340, 280), Dimensions::new(284, 234)]);
        assert_eq!(lines, vec!["Widths (2)", "001 340×280", "002 284×234"]);
    }

    #[test]
    fn check_lists_breakpoints_and_formats() {
        let lines = format_check(&Config::default(), Some("respimg.toml"));
        assert_eq!(lines[0], "Config");
        assert_eq!(lines[1], "    respimg.toml");
        assert_eq!(lines[2], "Breakpoints");
        assert_eq!(lines[3], "    default 0px");
        assert!(lines.contains(&"Formats: webp, original".to_string()));
    }
}
