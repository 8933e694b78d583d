//! Delay specifications for responses and kafka messages.
//!
//! A delay is an optional fixed part plus an optional uniformly random
//! part; both are added together when resolved.

use super::error::ContractError;
use super::raw::{RawDelay, RawDuration};
use rand::Rng;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

static DURATION_PART: OnceLock<Regex> = OnceLock::new();

fn duration_part_regex() -> &'static Regex {
    DURATION_PART.get_or_init(|| {
        Regex::new(r"(\d+(?:\.\d+)?)(ms|s|m|h)").expect("valid duration regex")
    })
}

/// Uniform random delay in the inclusive range `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomDelay {
    min: Duration,
    max: Duration,
}

impl RandomDelay {
    /// Returns `None` when `min > max`.
    pub fn new(min: Duration, max: Duration) -> Option<Self> {
        (min <= max).then_some(Self { min, max })
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }

    pub fn next(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        if min == max {
            return self.min;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..=max))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelaySpec {
    pub fixed: Option<Duration>,
    pub random: Option<RandomDelay>,
}

impl DelaySpec {
    pub const NONE: DelaySpec = DelaySpec {
        fixed: None,
        random: None,
    };

    pub fn fixed(duration: Duration) -> Self {
        Self {
            fixed: Some(duration),
            random: None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.fixed.map_or(true, |d| d.is_zero())
            && self.random.map_or(true, |r| r.max().is_zero())
    }

    /// Fixed part plus one draw of the random part.
    pub fn resolve(&self) -> Duration {
        let fixed = self.fixed.unwrap_or_default();
        let random = self.random.map(|r| r.next()).unwrap_or_default();
        fixed + random
    }

    /// Build a delay from its contract form. `field` names the location for
    /// error messages, e.g. `endpoints[2].response.delay`.
    pub fn from_raw(raw: Option<&RawDelay>, field: &str) -> Result<Self, ContractError> {
        let Some(raw) = raw else {
            return Ok(Self::NONE);
        };
        match raw {
            RawDelay::Millis(ms) => Ok(Self::fixed(Duration::from_millis(*ms))),
            RawDelay::Text(text) => Ok(Self::fixed(parse_duration(text, field)?)),
            RawDelay::Spec(spec) => {
                let fixed = spec
                    .fixed
                    .as_ref()
                    .map(|d| raw_duration(d, &format!("{field}.fixed")))
                    .transpose()?;
                let random = match &spec.random {
                    Some(r) => {
                        let min = raw_duration(&r.min, &format!("{field}.random.min"))?;
                        let max = raw_duration(&r.max, &format!("{field}.random.max"))?;
                        let random = RandomDelay::new(min, max).ok_or_else(|| {
                            ContractError::delay(
                                format!("{field}.random"),
                                format!(
                                    "min ({}ms) must not exceed max ({}ms)",
                                    min.as_millis(),
                                    max.as_millis()
                                ),
                            )
                        })?;
                        Some(random)
                    }
                    None => None,
                };
                Ok(Self { fixed, random })
            }
        }
    }
}

fn raw_duration(raw: &RawDuration, field: &str) -> Result<Duration, ContractError> {
    match raw {
        RawDuration::Millis(ms) => Ok(Duration::from_millis(*ms)),
        RawDuration::Text(text) => parse_duration(text, field),
    }
}

/// Parse a duration string.
///
/// Bare digits are milliseconds. Otherwise the text must be a sequence of
/// `<number><unit>` parts with unit `ms`, `s`, `m` or `h`, optionally
/// prefixed with `PT` (`1m30s`, `1.5s`, `PT2S`).
pub fn parse_duration(text: &str, field: &str) -> Result<Duration, ContractError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ContractError::delay(field, "empty duration"));
    }
    if trimmed.starts_with('-') {
        return Err(ContractError::delay(
            field,
            format!("negative duration '{trimmed}'"),
        ));
    }
    if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        let ms: u64 = trimmed
            .parse()
            .map_err(|_| ContractError::delay(field, format!("invalid duration '{trimmed}'")))?;
        return Ok(Duration::from_millis(ms));
    }

    let lowered = trimmed.to_ascii_lowercase();
    let body = lowered.strip_prefix("pt").unwrap_or(&lowered);

    let mut total_ms = 0f64;
    let mut cursor = 0;
    for caps in duration_part_regex().captures_iter(body) {
        let whole = caps.get(0).map(|m| (m.start(), m.end())).unwrap_or((0, 0));
        if whole.0 != cursor {
            break;
        }
        cursor = whole.1;
        let value: f64 = caps[1]
            .parse()
            .map_err(|_| ContractError::delay(field, format!("invalid duration '{trimmed}'")))?;
        let factor = match &caps[2] {
            "ms" => 1.0,
            "s" => 1_000.0,
            "m" => 60_000.0,
            _ => 3_600_000.0,
        };
        total_ms += value * factor;
    }
    if cursor == 0 || cursor != body.len() {
        return Err(ContractError::delay(
            field,
            format!("invalid duration '{trimmed}'"),
        ));
    }
    Ok(Duration::from_millis(total_ms.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delay(yaml: &str) -> Result<DelaySpec, ContractError> {
        let raw: RawDelay = serde_yaml::from_str(yaml).unwrap();
        DelaySpec::from_raw(Some(&raw), "delay")
    }

    #[test]
    fn test_parse_duration_units() {
        let cases = [
            ("250", 250),
            ("250ms", 250),
            ("1s", 1_000),
            ("1.5s", 1_500),
            ("2m", 120_000),
            ("1h", 3_600_000),
            ("1m30s", 90_000),
            ("PT1S", 1_000),
            ("pt1m5s", 65_000),
        ];
        for (text, expected) in cases {
            assert_eq!(
                parse_duration(text, "d").unwrap(),
                Duration::from_millis(expected),
                "parsing {text}"
            );
        }
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        for text in ["", "fast", "10x", "s10", "-5ms", "1s junk"] {
            assert!(parse_duration(text, "d").is_err(), "{text} should fail");
        }
    }

    #[test]
    fn test_from_raw_absent_is_zero() {
        let spec = DelaySpec::from_raw(None, "delay").unwrap();
        assert!(spec.is_zero());
        assert_eq!(spec.resolve(), Duration::ZERO);
    }

    #[test]
    fn test_fixed_plus_random_bounds() {
        let spec = delay("fixed: 200\nrandom: { min: 50, max: 300 }").unwrap();
        for _ in 0..1_000 {
            let resolved = spec.resolve();
            assert!(resolved >= Duration::from_millis(250), "{resolved:?}");
            assert!(resolved <= Duration::from_millis(500), "{resolved:?}");
        }
    }

    #[test]
    fn test_random_min_greater_than_max_rejected() {
        let err = delay("random: { min: 500ms, max: 100ms }").unwrap_err();
        assert!(matches!(err, ContractError::InvalidDelay { ref field, .. } if field == "delay.random"));
    }

    #[test]
    fn test_random_equal_bounds() {
        let spec = delay("random: { min: 1s, max: 1000 }").unwrap();
        assert_eq!(spec.resolve(), Duration::from_secs(1));
    }

    #[test]
    fn test_text_delay() {
        let spec = delay("\"1.5s\"").unwrap();
        assert_eq!(spec.fixed, Some(Duration::from_millis(1_500)));
        assert!(spec.random.is_none());
    }
}
