//! Recognizes season/episode markers embedded in release names, shared by
//! the query builder and by scrapers that need to filter listings against a
//! target episode.

use once_cell::sync::Lazy;
use regex::Regex;

static EPISODE_RE_VERBOSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)S(?:eason)?\s*0?(\d{1,2})\s*E(?:pisode)?\s*0?(\d{1,2})").unwrap()
});
static EPISODE_RE_COMPACT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)S(\d{1,2})E(\d{1,2})").unwrap());
static EPISODE_RE_X: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,2})x(\d{1,2})").unwrap());

/// Try, in order, the three episode-marker shapes recognized throughout
/// the resolver: verbose (`Season 2 Episode 3`), compact (`S02E03`), and
/// the `2x03` form.
pub fn parse_episode(text: &str) -> Option<(u32, u32)> {
    for re in [&*EPISODE_RE_VERBOSE, &*EPISODE_RE_COMPACT, &*EPISODE_RE_X] {
        if let Some(caps) = re.captures(text) {
            let season: u32 = caps.get(1)?.as_str().parse().ok()?;
            let episode: u32 = caps.get(2)?.as_str().parse().ok()?;
            return Some((season, episode));
        }
    }
    None
}

/// `true` if `season`/`episode` are unset (no filter applies), `false` if
/// set but `name` doesn't parse to a matching episode marker.
pub fn matches_episode(name: &str, season: Option<u32>, episode: Option<u32>) -> bool {
    match (season, episode) {
        (None, None) => true,
        (Some(s), Some(e)) => match parse_episode(name) {
            Some((ns, ne)) => ns == s && ne == e,
            None => false,
        },
        _ => true,
    }
}
