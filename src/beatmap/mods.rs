//! Requested mod extraction.

use regex::Regex;
use std::sync::LazyLock;

/// Mod codes accepted in requests.
pub const KNOWN_MODS: [&str; 10] = ["EZ", "HD", "HR", "DT", "HT", "NC", "FL", "SO", "PF", "SD"];

/// Runs of known codes, optionally wrapped in one of the separator characters.
static MOD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[-+~|]?(?:EZ|HD|HR|DT|HT|NC|FL|SO|PF|SD)+[~|]?").expect("mod pattern is valid")
});

/// Extract the requested mods from `text`.
///
/// Matching is case-insensitive, duplicates are dropped keeping first-seen
/// order, and the result is `+` followed by the concatenated codes. Text with
/// no recognizable mods yields an empty string.
pub fn extract_mods(text: &str) -> String {
    let mut seen: Vec<String> = Vec::new();

    for found in MOD_PATTERN.find_iter(text) {
        let run = found
            .as_str()
            .trim_matches(|c| matches!(c, '-' | '+' | '~' | '|'))
            .to_ascii_uppercase();

        // The regex only admits whole two-letter codes, so chunking is exact.
        for code in run.as_bytes().chunks(2) {
            let code = String::from_utf8_lossy(code).into_owned();
            if !seen.contains(&code) {
                seen.push(code);
            }
        }
    }

    if seen.is_empty() {
        return String::new();
    }
    format!("+{}", seen.concat())
}

/// Mods requested after `link` in `content`.
///
/// Only the text following the last occurrence of the link is inspected.
pub fn mods_after_link(content: &str, link: &str) -> String {
    let tail = match content.rfind(link) {
        Some(pos) => &content[pos + link.len()..],
        None => content,
    };
    extract_mods(tail.trim())
}
