//! Shared post-processing every scraper applies to its own raw candidates:
//! dedupe by detail URL/magnet, rank by seeders, and promotion into a
//! `Stream` once an info hash is known.

use std::collections::HashSet;

use streamforge_core::models::{BehaviorHints, ParsedRequestId, Stream, TorrentCandidate};

use crate::display_formatter::{self, FormatInput};
use crate::magnet_codec;
use crate::size_parser;

/// Dedupe a single scraper's own candidates by detail URL, falling back to
/// the magnet when no detail URL is present. First occurrence wins.
pub fn dedupe_candidates(candidates: Vec<TorrentCandidate>) -> Vec<TorrentCandidate> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let key = candidate
            .detail_url
            .clone()
            .or_else(|| candidate.magnet.clone());
        match key {
            Some(key) => {
                if seen.insert(key) {
                    out.push(candidate);
                }
            }
            None => out.push(candidate),
        }
    }
    out
}

/// Stable sort by seeders descending.
pub fn rank_by_seeders(candidates: &mut [TorrentCandidate]) {
    candidates.sort_by(|a, b| b.seeders.cmp(&a.seeders));
}

/// Promote a candidate into an exported `Stream`, resolving its info hash
/// from the magnet when the candidate didn't carry one directly. Returns
/// `None` when neither is available -- such a candidate never surfaces.
pub fn build_stream(
    candidate: &TorrentCandidate,
    queries_base_title: &str,
    parsed: &ParsedRequestId,
) -> Option<Stream> {
    let magnet_info = candidate
        .magnet
        .as_deref()
        .and_then(magnet_codec::parse);

    let info_hash = candidate
        .info_hash
        .clone()
        .or_else(|| magnet_info.as_ref().map(|m| m.info_hash.clone()))?;

    let sources = magnet_info.map(|m| m.sources).unwrap_or_default();

    let formatted = display_formatter::format(&FormatInput {
        imdb_title: queries_base_title.to_string(),
        season: candidate.season.or(parsed.season),
        episode: candidate.episode.or(parsed.episode),
        torrent_name: Some(candidate.name.clone()),
        quality: None,
        source: Some(candidate.source.clone()),
        seeders: Some(candidate.seeders),
        size_bytes: candidate.size_bytes,
        size_label: candidate.size_label.clone(),
    });

    let video_size = candidate
        .size_bytes
        .or_else(|| candidate.size_label.as_deref().and_then(size_parser::parse_size));

    let behavior_hints = BehaviorHints {
        video_size,
        filename: Some(candidate.name.clone()),
        ..Default::default()
    };

    Some(Stream {
        name: formatted.name,
        description: formatted.description,
        info_hash: Some(info_hash),
        url: None,
        sources,
        behavior_hints,
        seeders: candidate.seeders,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(detail_url: Option<&str>, magnet: Option<&str>, seeders: i64) -> TorrentCandidate {
        TorrentCandidate {
            name: "Example.1080p".into(),
            detail_url: detail_url.map(str::to_string),
            magnet: magnet.map(str::to_string),
            info_hash: None,
            seeders,
            leechers: 0,
            size_bytes: None,
            size_label: None,
            season: None,
            episode: None,
            source: "YTS".into(),
        }
    }

    #[test]
    fn dedupe_keeps_first_occurrence_by_detail_url() {
        let candidates = vec![
            candidate(Some("https://x/1"), None, 5),
            candidate(Some("https://x/1"), None, 99),
        ];
        let result = dedupe_candidates(candidates);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].seeders, 5);
    }

    #[test]
    fn dedupe_falls_back_to_magnet_when_no_detail_url() {
        let hash = "a".repeat(40);
        let magnet = format!("magnet:?xt=urn:btih:{hash}");
        let candidates = vec![
            candidate(None, Some(&magnet), 1),
            candidate(None, Some(&magnet), 2),
        ];
        assert_eq!(dedupe_candidates(candidates).len(), 1);
    }

    #[test]
    fn rank_sorts_descending_by_seeders() {
        let mut candidates = vec![
            candidate(Some("a"), None, 3),
            candidate(Some("b"), None, 10),
            candidate(Some("c"), None, 1),
        ];
        rank_by_seeders(&mut candidates);
        assert_eq!(
            candidates.iter().map(|c| c.seeders).collect::<Vec<_>>(),
            vec![10, 3, 1]
        );
    }

    #[test]
    fn build_stream_resolves_info_hash_from_magnet() {
        let hash = "b".repeat(40);
        let magnet = format!("magnet:?xt=urn:btih:{hash}&tr=tracker%3Ax");
        let mut c = candidate(None, Some(&magnet), 12);
        c.size_label = Some("1.4 GB".into());
        let parsed = ParsedRequestId {
            base_id: "tt1".into(),
            season: None,
            episode: None,
        };
        let stream = build_stream(&c, "Movie", &parsed).unwrap();
        assert_eq!(stream.info_hash.as_deref(), Some(hash.as_str()));
        assert_eq!(stream.sources, vec!["tracker:x".to_string()]);
        assert_eq!(stream.seeders, 12);
        assert_eq!(
            stream.behavior_hints.video_size,
            Some((1.4 * 1024.0 * 1024.0 * 1024.0).round() as u64)
        );
    }

    #[test]
    fn build_stream_returns_none_without_a_resolvable_hash() {
        let c = candidate(Some("https://x/1"), None, 5);
        let parsed = ParsedRequestId {
            base_id: "tt1".into(),
            season: None,
            episode: None,
        };
        assert!(build_stream(&c, "Movie", &parsed).is_none());
    }
}
