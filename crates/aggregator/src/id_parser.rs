//! Decodes a request id (`tt1234567` or `tt1234567:2:3`) into a [`ParsedRequestId`].

use once_cell::sync::Lazy;
use regex::Regex;
use streamforge_core::models::ParsedRequestId;
use thiserror::Error;

static BASE_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^tt\d+$").unwrap());

/// The ways a request id can fail to parse. Variant names match the
/// scenarios the protocol's id shape distinguishes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdParseError {
    #[error("id must have 1 or 3 colon-separated segments, got {0}")]
    InvalidSegmentCount(usize),
    #[error("base id '{0}' does not match tt\\d+")]
    InvalidBaseId(String),
    #[error("season '{0}' is not a positive integer")]
    InvalidSeason(String),
    #[error("episode '{0}' is not a positive integer")]
    InvalidEpisode(String),
}

/// Parse a request id into its base title id plus an optional season/episode pair.
pub fn parse(id: &str) -> Result<ParsedRequestId, IdParseError> {
    let segments: Vec<&str> = id.split(':').collect();

    match segments.as_slice() {
        [base_id] => {
            validate_base_id(base_id)?;
            Ok(ParsedRequestId {
                base_id: base_id.to_string(),
                season: None,
                episode: None,
            })
        }
        [base_id, season, episode] => {
            validate_base_id(base_id)?;
            let season = parse_positive_int(season).map_err(IdParseError::InvalidSeason)?;
            let episode = parse_positive_int(episode).map_err(IdParseError::InvalidEpisode)?;
            Ok(ParsedRequestId {
                base_id: base_id.to_string(),
                season: Some(season),
                episode: Some(episode),
            })
        }
        other => Err(IdParseError::InvalidSegmentCount(other.len())),
    }
}

fn validate_base_id(base_id: &str) -> Result<(), IdParseError> {
    if BASE_ID_RE.is_match(base_id) {
        Ok(())
    } else {
        Err(IdParseError::InvalidBaseId(base_id.to_string()))
    }
}

fn parse_positive_int(s: &str) -> Result<u32, String> {
    match s.parse::<i64>() {
        Ok(n) if n > 0 => Ok(n as u32),
        _ => Err(s.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_movie_shape() {
        let parsed = parse("tt10872600").unwrap();
        assert_eq!(parsed.base_id, "tt10872600");
        assert!(parsed.season.is_none() && parsed.episode.is_none());
    }

    #[test]
    fn accepts_episode_shape() {
        let parsed = parse("tt5834204:2:3").unwrap();
        assert_eq!(parsed.base_id, "tt5834204");
        assert_eq!(parsed.season, Some(2));
        assert_eq!(parsed.episode, Some(3));
    }

    #[test]
    fn rejects_zero_season() {
        // E2E-4
        assert_eq!(
            parse("tt123:0:1").unwrap_err(),
            IdParseError::InvalidSeason("0".to_string())
        );
    }

    #[test]
    fn rejects_negative_episode() {
        assert_eq!(
            parse("tt123:1:-2").unwrap_err(),
            IdParseError::InvalidEpisode("-2".to_string())
        );
    }

    #[test]
    fn rejects_two_segments() {
        assert_eq!(
            parse("tt123:1").unwrap_err(),
            IdParseError::InvalidSegmentCount(2)
        );
    }

    #[test]
    fn rejects_four_segments() {
        assert_eq!(
            parse("tt123:1:2:3").unwrap_err(),
            IdParseError::InvalidSegmentCount(4)
        );
    }

    #[test]
    fn rejects_bad_base_id() {
        assert_eq!(
            parse("123").unwrap_err(),
            IdParseError::InvalidBaseId("123".to_string())
        );
    }

    #[test]
    fn is_case_sensitive_on_tt_prefix() {
        assert!(parse("TT123").is_err());
    }

    // Testable property 8: format(parse(id)) == id for recognized shapes.
    #[test]
    fn format_is_the_reverse_of_parse() {
        for id in ["tt10872600", "tt5834204:2:3", "tt1:12:9"] {
            let parsed = parse(id).unwrap();
            assert_eq!(parsed.format(), id);
        }
    }

    proptest::proptest! {
        // Testable property 8, generalized over arbitrary digit strings and
        // season/episode magnitudes.
        #[test]
        fn prop_format_reverses_parse_for_movie_ids(digits in "[1-9][0-9]{0,8}") {
            let id = format!("tt{digits}");
            let parsed = parse(&id).unwrap();
            prop_assert_eq!(parsed.format(), id);
        }

        #[test]
        fn prop_format_reverses_parse_for_episode_ids(
            digits in "[1-9][0-9]{0,8}",
            season in 1u32..10_000,
            episode in 1u32..10_000,
        ) {
            let id = format!("tt{digits}:{season}:{episode}");
            let parsed = parse(&id).unwrap();
            prop_assert_eq!(parsed.format(), id);
        }
    }
}
