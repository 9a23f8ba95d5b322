//! Parses `magnet:` URIs into a normalized info hash plus tracker list.

use streamforge_core::models::MagnetInfo;

/// Parse a magnet URI. Returns `None` for anything that isn't a `magnet:` URI
/// carrying a recognizable `xt=urn:btih:<hash>` parameter.
pub fn parse(uri: &str) -> Option<MagnetInfo> {
    let rest = uri.strip_prefix("magnet:")?;
    let query = rest.strip_prefix('?').unwrap_or(rest);

    let mut xt_values = Vec::new();
    let mut trackers = Vec::new();

    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, raw_value) = match pair.split_once('=') {
            Some((k, v)) => (k, v),
            None => continue,
        };
        let value = urlencoding::decode(raw_value).ok()?.into_owned();
        match key {
            "xt" => xt_values.push(value),
            "tr" if !value.is_empty() => trackers.push(value),
            _ => {}
        }
    }

    let info_hash = xt_values
        .iter()
        .find_map(|xt| decode_btih(xt))?;

    let mut seen = std::collections::HashSet::new();
    let mut sources = Vec::new();
    for tracker in trackers {
        let prefixed = if tracker.starts_with("tracker:") {
            tracker
        } else {
            format!("tracker:{tracker}")
        };
        if seen.insert(prefixed.clone()) {
            sources.push(prefixed);
        }
    }

    Some(MagnetInfo { info_hash, sources })
}

const BTIH_PREFIX: &str = "urn:btih:";

fn decode_btih(xt: &str) -> Option<String> {
    if xt.len() < BTIH_PREFIX.len() || !xt[..BTIH_PREFIX.len()].eq_ignore_ascii_case(BTIH_PREFIX) {
        return None;
    }
    let hash = &xt[BTIH_PREFIX.len()..];

    if hash.len() == 40 && hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Some(hash.to_ascii_lowercase());
    }

    if hash.len() == 32 && hash.chars().all(|c| c.is_ascii_alphanumeric()) {
        let bytes = base32::decode(base32::Alphabet::RFC4648 { padding: false }, hash)?;
        if bytes.len() != 20 {
            return None;
        }
        return Some(bytes.iter().map(|b| format!("{b:02x}")).collect());
    }

    None
}

/// Synthesize a `magnet:` URI from a bare info hash, used when a scraper
/// only yields a hash without tracker context (e.g. ApiBay).
pub fn synthesize(info_hash: &str) -> String {
    format!("magnet:?xt=urn:btih:{info_hash}")
}
