//! Domain model for the stream resolver: request ids, title metadata,
//! torrent candidates, and the exported stream envelope.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The two resource types the addon protocol recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Movie,
    Series,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Series => "series",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "movie" => Some(MediaType::Movie),
            "series" => Some(MediaType::Series),
            _ => None,
        }
    }
}

/// The decoded form of a request id: `tt\d+` optionally followed by a season/episode pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequestId {
    pub base_id: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl ParsedRequestId {
    pub fn is_episode(&self) -> bool {
        self.season.is_some() && self.episode.is_some()
    }

    /// The reverse of `IdParser::parse` for the recognized shapes (testable property 8).
    pub fn format(&self) -> String {
        match (self.season, self.episode) {
            (Some(s), Some(e)) => format!("{}:{}:{}", self.base_id, s, e),
            _ => self.base_id.clone(),
        }
    }
}

/// Title metadata resolved from the local IMDb TSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleBasics {
    pub tconst: String,
    pub title_type: String,
    pub primary_title: String,
    pub original_title: String,
    pub is_adult: bool,
    pub start_year: Option<u32>,
    pub end_year: Option<u32>,
    pub runtime_minutes: Option<u32>,
    pub genres: Vec<String>,
}

impl TitleBasics {
    pub fn is_series(&self) -> bool {
        matches!(
            self.title_type.to_ascii_lowercase().as_str(),
            "tvseries" | "tvminiseries" | "tvepisode"
        )
    }
}

/// The pair of search queries built from an id, plus the pieces used to build them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queries {
    pub base_title: String,
    pub query: String,
    pub fallback_query: Option<String>,
    pub episode_suffix: Option<String>,
}

/// A single torrent listing/detail candidate produced by a scraper, before it is
/// promoted into an exported `Stream`.
#[derive(Debug, Clone, Default)]
pub struct TorrentCandidate {
    pub name: String,
    pub detail_url: Option<String>,
    pub magnet: Option<String>,
    pub info_hash: Option<String>,
    pub seeders: i64,
    pub leechers: i64,
    pub size_bytes: Option<u64>,
    pub size_label: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub source: String,
}

impl TorrentCandidate {
    /// A candidate only promotes to a stream once it yields an info hash.
    pub fn has_info_hash(&self) -> bool {
        self.info_hash.is_some()
    }
}

/// A parsed magnet URI: normalized info hash plus deduplicated tracker list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagnetInfo {
    pub info_hash: String,
    pub sources: Vec<String>,
}

/// Behavior hints attached to a stream, mirroring the addon protocol's optional fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BehaviorHints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_whitelist: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_web_ready: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binge_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_headers: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl BehaviorHints {
    pub fn is_empty(&self) -> bool {
        self == &BehaviorHints::default()
    }
}

/// One resolvable stream. Exactly one of `info_hash`/`url` is set; `seeders` is
/// carried internally for ranking and stripped before serialization.
#[derive(Debug, Clone)]
pub struct Stream {
    pub name: String,
    pub description: String,
    pub info_hash: Option<String>,
    pub url: Option<String>,
    pub sources: Vec<String>,
    pub behavior_hints: BehaviorHints,
    pub seeders: i64,
}

impl Stream {
    /// `infoHash ?? url` — the field the dedupe/merge stage keys on.
    pub fn identity_key(&self) -> &str {
        self.info_hash.as_deref().unwrap_or_else(|| {
            self.url
                .as_deref()
                .expect("invariant: stream has infoHash or url")
        })
    }

    /// A "dead" magnet: zero-seed and identified by info hash or a magnet: url.
    pub fn is_dead_magnet(&self) -> bool {
        let is_magnet = self.info_hash.is_some()
            || self
                .url
                .as_deref()
                .map(|u| u.starts_with("magnet:?"))
                .unwrap_or(false);
        self.seeders == 0 && is_magnet
    }

    /// Union `other`'s sources into this stream's, deduplicated, order-independent.
    pub fn merge_sources(&mut self, other: &Stream) {
        let mut set: BTreeSet<String> = self.sources.iter().cloned().collect();
        for s in &other.sources {
            set.insert(s.clone());
        }
        self.sources = set.into_iter().collect();
    }
}

/// The wire representation of a `Stream`: `seeders` never appears here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamWire {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "infoHash")]
    pub info_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "behaviorHints")]
    pub behavior_hints: Option<BehaviorHints>,
}

impl From<&Stream> for StreamWire {
    fn from(s: &Stream) -> Self {
        StreamWire {
            name: s.name.clone(),
            description: if s.description.is_empty() {
                None
            } else {
                Some(s.description.clone())
            },
            url: s.url.clone(),
            info_hash: s.info_hash.clone(),
            sources: if s.sources.is_empty() {
                None
            } else {
                Some(s.sources.clone())
            },
            behavior_hints: if s.behavior_hints.is_empty() {
                None
            } else {
                Some(s.behavior_hints.clone())
            },
        }
    }
}

/// `{streams: [...]}`, the exact response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamResponse {
    pub streams: Vec<StreamWire>,
}

impl StreamResponse {
    pub fn empty() -> Self {
        StreamResponse { streams: vec![] }
    }

    pub fn from_streams(streams: &[Stream]) -> Self {
        StreamResponse {
            streams: streams.iter().map(StreamWire::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_request_id_roundtrips_movie_shape() {
        let parsed = ParsedRequestId {
            base_id: "tt10872600".into(),
            season: None,
            episode: None,
        };
        assert_eq!(parsed.format(), "tt10872600");
    }

    #[test]
    fn parsed_request_id_roundtrips_episode_shape() {
        let parsed = ParsedRequestId {
            base_id: "tt5834204".into(),
            season: Some(2),
            episode: Some(3),
        };
        assert_eq!(parsed.format(), "tt5834204:2:3");
    }

    #[test]
    fn dead_magnet_requires_zero_seeders_and_a_magnet_identity() {
        let seeded = Stream {
            name: "YTS".into(),
            description: String::new(),
            info_hash: Some("a".repeat(40)),
            url: None,
            sources: vec![],
            behavior_hints: BehaviorHints::default(),
            seeders: 0,
        };
        assert!(seeded.is_dead_magnet());

        let non_magnet = Stream {
            info_hash: None,
            url: Some("https://example.com/file.mp4".into()),
            ..seeded.clone()
        };
        assert!(!non_magnet.is_dead_magnet());
    }

    #[test]
    fn stream_wire_never_serializes_seeders() {
        let s = Stream {
            name: "YTS".into(),
            description: "desc".into(),
            info_hash: Some("b".repeat(40)),
            url: None,
            sources: vec![],
            behavior_hints: BehaviorHints::default(),
            seeders: 42,
        };
        let wire = StreamWire::from(&s);
        let json = serde_json::to_string(&wire).unwrap();
        assert!(!json.contains("seeders"));
    }

    #[test]
    fn merge_sources_is_a_deduplicated_union() {
        let mut a = Stream {
            name: "A".into(),
            description: String::new(),
            info_hash: Some("c".repeat(40)),
            url: None,
            sources: vec!["tracker:x".into()],
            behavior_hints: BehaviorHints::default(),
            seeders: 5,
        };
        let b = Stream {
            sources: vec!["tracker:x".into(), "tracker:y".into()],
            ..a.clone()
        };
        a.merge_sources(&b);
        assert_eq!(a.sources, vec!["tracker:x".to_string(), "tracker:y".to_string()]);
    }
}
