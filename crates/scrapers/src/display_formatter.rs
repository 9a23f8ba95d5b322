//! Builds the user-visible `name`/`title`/`description` lines for a stream.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::quality_tagger;

static SEPARATOR_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[._]+").unwrap());
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static EPISODE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)S\d{1,2}E\d{1,2}").unwrap());

/// Everything the formatter needs to build one stream's display lines.
#[derive(Debug, Clone, Default)]
pub struct FormatInput {
    pub imdb_title: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub torrent_name: Option<String>,
    /// Raw quality descriptor as surfaced by the scraper, e.g. `"1080p WEB"`.
    pub quality: Option<String>,
    pub source: Option<String>,
    pub seeders: Option<i64>,
    pub size_bytes: Option<u64>,
    pub size_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formatted {
    pub name: String,
    pub title: String,
    pub description: String,
}

pub fn format(input: &FormatInput) -> Formatted {
    let name = input.source.clone().unwrap_or_else(|| "Stream".to_string());

    let quality_hint = input
        .quality
        .as_deref()
        .and_then(quality_tagger::extract)
        .or_else(|| input.torrent_name.as_deref().and_then(quality_tagger::extract));

    let title_quality = match quality_hint {
        Some("2160p") => "4K".to_string(),
        Some(q) => q.to_string(),
        None => "480p".to_string(),
    };
    let title = format!("Watch {title_quality}");

    let mut lines = Vec::new();
    if !input.imdb_title.is_empty() {
        lines.push(input.imdb_title.clone());
    }
    if let (Some(s), Some(e)) = (input.season, input.episode) {
        lines.push(format!("Season {s} Episode {e}"));
    }

    let slug = build_slug(input);
    let source_label = input.source.clone().unwrap_or_else(|| "Unknown".to_string());
    lines.push(format!("{slug} ({source_label})"));

    let seeders = input.seeders.unwrap_or(0);
    let size = input
        .size_label
        .clone()
        .or_else(|| input.size_bytes.map(format_bytes))
        .unwrap_or_else(|| "Unknown size".to_string());
    lines.push(format!("\u{1f331} {seeders} \u{2022} \u{1f4be} {size}"));

    Formatted {
        name,
        title,
        description: lines.join("\n"),
    }
}

fn build_slug(input: &FormatInput) -> String {
    let raw = match &input.torrent_name {
        Some(name) => name.clone(),
        None => String::new(),
    };

    let without_title = strip_imdb_title(&raw, &input.imdb_title);
    let without_episode = EPISODE_MARKER.replacen(&without_title, 1, "").into_owned();
    let collapsed = SEPARATOR_RUN.replace_all(&without_episode, " ");
    let slug = WHITESPACE_RUN
        .replace_all(collapsed.trim(), " ")
        .trim()
        .to_string();

    if !slug.is_empty() {
        return slug;
    }
    input
        .quality
        .clone()
        .filter(|q| !q.is_empty())
        .unwrap_or_else(|| "Unknown release".to_string())
}

fn strip_imdb_title(name: &str, imdb_title: &str) -> String {
    let words: Vec<String> = imdb_title
        .split_whitespace()
        .map(|w| regex::escape(w))
        .collect();
    if words.is_empty() {
        return name.to_string();
    }
    let pattern = format!("(?i){}", words.join(r"[\s._-]+"));
    match Regex::new(&pattern) {
        Ok(re) => re.replacen(name, 1, "").into_owned(),
        Err(_) => name.to_string(),
    }
}

/// Greatest unit for which value >= 1; zero decimals at unit `B` or value
/// >= 10, otherwise two decimals. Uses 1024 as the base for every unit,
/// including the SI-named ones -- a known, deliberately preserved quirk.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = bytes as f64;
    let mut unit_idx = 0;
    while value >= 1024.0 && unit_idx < UNITS.len() - 1 {
        value /= 1024.0;
        unit_idx += 1;
    }
    let decimals = if UNITS[unit_idx] == "B" || value >= 10.0 {
        0
    } else {
        2
    };
    format!("{:.*} {}", decimals, value, UNITS[unit_idx])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn e2e3_handmaids_tale_episode() {
        let input = FormatInput {
            imdb_title: "The Handmaid's Tale".to_string(),
            season: Some(6),
            episode: Some(7),
            torrent_name: Some("The.Handmaid's.Tale.S06E07.1080p.WEB.h264-ETHEL".to_string()),
            quality: Some("1080p".to_string()),
            source: Some("EZTV".to_string()),
            seeders: Some(231),
            size_bytes: None,
            size_label: Some("1.4 GB".to_string()),
        };
        let out = format(&input);
        assert_eq!(out.name, "EZTV");
        assert_eq!(out.title, "Watch 1080p");
        let lines: Vec<&str> = out.description.split('\n').collect();
        assert_eq!(lines[0], "The Handmaid's Tale");
        assert_eq!(lines[1], "Season 6 Episode 7");
        assert_eq!(lines[2], "1080p WEB h264-ETHEL (EZTV)");
        assert_eq!(lines[3], "\u{1f331} 231 \u{2022} \u{1f4be} 1.4 GB");
    }

    #[test]
    fn quality_2160p_renders_as_4k_in_title() {
        let input = FormatInput {
            imdb_title: "Movie".to_string(),
            quality: Some("2160p".to_string()),
            ..Default::default()
        };
        assert_eq!(format(&input).title, "Watch 4K");
    }

    #[test]
    fn default_quality_is_480p_when_no_hint() {
        let input = FormatInput {
            imdb_title: "Movie".to_string(),
            ..Default::default()
        };
        assert_eq!(format(&input).title, "Watch 480p");
    }

    #[test]
    fn slug_falls_back_to_quality_then_unknown_release() {
        let with_quality = FormatInput {
            imdb_title: "Movie".to_string(),
            torrent_name: Some("Movie".to_string()),
            quality: Some("1080p".to_string()),
            ..Default::default()
        };
        // Whole torrent_name is the imdb title -- strips to empty, falls back to quality.
        assert!(format(&with_quality).description.contains("1080p (Unknown)"));

        let bare = FormatInput {
            imdb_title: "Movie".to_string(),
            torrent_name: Some("Movie".to_string()),
            ..Default::default()
        };
        assert!(format(&bare).description.contains("Unknown release (Unknown)"));
    }

    #[test]
    fn format_bytes_units_and_decimals() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(10 * 1024), "10 KB");
        assert_eq!(format_bytes(1024 * 1024 * 3), "3.00 MB");
        assert_eq!(format_bytes(1024u64.pow(4) * 2), "2.00 TB");
    }

    #[test]
    fn description_omits_season_episode_line_for_movies() {
        let input = FormatInput {
            imdb_title: "Movie".to_string(),
            torrent_name: Some("Movie.2021.1080p".to_string()),
            quality: Some("1080p".to_string()),
            source: Some("YTS".to_string()),
            seeders: Some(10),
            ..Default::default()
        };
        let out = format(&input);
        assert!(!out.description.contains("Season"));
    }
}
