//! Extracts and normalizes a quality label from free-form torrent/release text.

use once_cell::sync::Lazy;
use regex::Regex;

static QUALITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(2160p|1080p|720p|480p|4k|uhd)\b").unwrap());

/// Scan `text` case-insensitively for the first word-bounded quality token,
/// canonicalizing `4k`/`uhd` to `2160p`. Returns `None` when nothing matches.
pub fn extract(text: &str) -> Option<&'static str> {
    let m = QUALITY_RE.find(text)?;
    Some(canonicalize(m.as_str()))
}

fn canonicalize(token: &str) -> &'static str {
    match token.to_ascii_lowercase().as_str() {
        "2160p" | "4k" | "uhd" => "2160p",
        "1080p" => "1080p",
        "720p" => "720p",
        "480p" => "480p",
        _ => unreachable!("regex only matches the above tokens"),
    }
}
