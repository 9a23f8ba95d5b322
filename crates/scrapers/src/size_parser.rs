//! Parses human-readable size labels (`"1.4 GB"`) into a byte count.
//!
//! Deliberately uses `1024` as the multiplier base for both the SI-named
//! units (`KB`/`MB`/`GB`/`TB`) and the binary ones (`KiB`/`MiB`/`GiB`/`TiB`):
//! the upstream sources format either way and the original implementation
//! never distinguished them. Preserved rather than "fixed".

use once_cell::sync::Lazy;
use regex::Regex;

static SIZE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([\d.]+)\s*(B|KI?B|MI?B|GI?B|TI?B)").unwrap());

pub fn parse_size(label: &str) -> Option<u64> {
    let caps = SIZE_RE.captures(label)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps.get(2)?.as_str().to_ascii_uppercase();
    let factor: f64 = match unit.chars().next()? {
        'B' => 1.0,
        'K' => 1024.0,
        'M' => 1024.0 * 1024.0,
        'G' => 1024.0 * 1024.0 * 1024.0,
        'T' => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    Some((value * factor).round() as u64)
}
