//! Codepoint-oriented string helpers backing the guest `unicode` table.
//!
//! Indices are 1-based and negative indices count from the end, matching
//! the interpreter's own string conventions. Widths are terminal display
//! widths.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthChar;

pub fn len(s: &str) -> usize {
    s.chars().count()
}

pub fn char_from(codepoints: &[u32]) -> String {
    codepoints
        .iter()
        .map(|&cp| char::from_u32(cp).unwrap_or('\u{FFFD}'))
        .collect()
}

/// Substring by codepoint indices, `string.sub` style: 1-based, inclusive,
/// negative indices from the end, out-of-range clamped.
pub fn sub(s: &str, i: i64, j: i64) -> String {
    let n = len(s) as i64;
    let start = if i < 0 { (n + i + 1).max(1) } else { i.max(1) };
    let end = if j < 0 { n + j + 1 } else { j.min(n) };
    if start > end {
        return String::new();
    }
    s.chars()
        .skip((start - 1) as usize)
        .take((end - start + 1) as usize)
        .collect()
}

/// Display width of the whole string.
pub fn display_width(s: &str) -> usize {
    s.chars().map(|c| c.width().unwrap_or(1)).sum()
}

/// Display width of the first codepoint; 0 for the empty string.
pub fn char_width(s: &str) -> usize {
    s.chars().next().map(|c| c.width().unwrap_or(1)).unwrap_or(0)
}

pub fn is_wide(s: &str) -> bool {
    char_width(s) > 1
}

/// Longest prefix whose display width is strictly below `limit`. Errors
/// when the string is too short to be truncated against that limit.
pub fn wtrunc(s: &str, limit: i64) -> Result<String, &'static str> {
    let total = display_width(s) as i64;
    if total < limit - 1 {
        return Err("not enough characters");
    }
    for take in (0..=len(s)).rev() {
        let prefix: String = s.chars().take(take).collect();
        if (display_width(&prefix) as i64) < limit {
            return Ok(prefix);
        }
    }
    Ok(String::new())
}

pub fn lower(s: &str) -> String {
    s.to_lowercase()
}

pub fn upper(s: &str) -> String {
    s.to_uppercase()
}

/// Grapheme-aware reversal so combining sequences survive intact.
pub fn reverse(s: &str) -> String {
    s.graphemes(true).rev().collect()
}
