// SPDX-License-Identifier: Apache-2.0
// Copyright (C) 2025 Michael Dippery <michael@monkey-robot.com>

//! Helpful utilities for working with text.

use htmlentity::entity::{self, ICodedDataTrait};

/// Converts HTML entities into their single-character equivalents.
///
/// For example, Reddit returns "&" as "&amp;", ">" as "&gt;",
/// and "<" as "&lt;"; this function will convert those HTML
/// entities into single, human-readable characters.
///
/// Leading and trailing whitespace will also be trimmed from the string.
///
/// # Examples
///
/// ```
/// use redscout::text::convert_html_entities;
/// let raw = "  &lt;This &amp; That&gt;  ";
/// let converted = convert_html_entities(raw);
/// assert_eq!(converted, "<This & That>");
/// ```
///
/// ```
/// use redscout::text::convert_html_entities;
/// let raw = "";
/// let converted = convert_html_entities(raw);
/// assert_eq!(converted, raw);
/// ```
pub fn convert_html_entities(text: &str) -> String {
    let text = text.trim();
    entity::decode(text.as_bytes())
        .to_string()
        .unwrap_or(text.to_string())
}

/// Flattens `text` onto a single line and shortens it to at most `max`
/// characters, ending it with "..." if anything was cut.
///
/// # Examples
///
/// ```
/// use redscout::text::truncate;
/// assert_eq!(truncate("short", 10), "short");
/// assert_eq!(truncate("a much longer line", 10), "a much ...");
/// assert_eq!(truncate("two\nlines", 20), "two lines");
/// ```
pub fn truncate(text: &str, max: usize) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() <= max {
        flat.to_string()
    } else {
        let keep = max.saturating_sub(3);
        let head: String = flat.chars().take(keep).collect();
        format!("{head}...")
    }
}

/// Formats a count compactly, such as "1.2M" or "3.4k".
///
/// # Examples
///
/// ```
/// use redscout::text::compact_count;
/// assert_eq!(compact_count(999), "999");
/// assert_eq!(compact_count(3_400), "3.4k");
/// assert_eq!(compact_count(1_240_000), "1.2M");
/// ```
pub fn compact_count(count: u64) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}k", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}
