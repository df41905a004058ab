//! Duration settings such as `24h`, `1h30m` or `250ms`.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by [`parse_duration`].
#[derive(Debug, Error)]
pub enum DurationParseError {
    #[error("negative duration {0:?} is not allowed")]
    Negative(String),
    #[error("invalid duration {input:?}: {source}")]
    Invalid {
        input: String,
        #[source]
        source: humantime::DurationError,
    },
}

/// Parses a duration with unit suffixes (`ns`, `us`, `µs`, `ms`, `s`, `m`, `h`, and the longer
/// names `humantime` accepts).
///
/// Go spellings are normalised first: a leading `+` is dropped, `µs` becomes `us` and a bare `0`
/// needs no unit. Negative durations are rejected.
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let trimmed = input.trim();
    if trimmed.starts_with('-') {
        return Err(DurationParseError::Negative(input.to_string()));
    }
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if unsigned == "0" {
        return Ok(Duration::ZERO);
    }
    let normalized = unsigned.replace(['µ', 'μ'], "u");
    humantime::parse_duration(&normalized).map_err(|source| DurationParseError::Invalid {
        input: input.to_string(),
        source,
    })
}
