//! Human duration parsing (`15s`, `2h5m`, `1.5 hours`, `1:30`)

// lazy_regex! uses once_cell internally
#![allow(clippy::non_std_lazy_statics)]

use lazy_regex::lazy_regex;

static RE_UNITS: lazy_regex::Lazy<regex::Regex> = lazy_regex!(
    r"(?ix)^\s*
    (?:(?P<weeks>\d+(?:\.\d*)?|\.\d+)\s*(?:weeks?|wks?|w)\s*,?\s*)?
    (?:(?P<days>\d+(?:\.\d*)?|\.\d+)\s*(?:days?|d)\s*,?\s*)?
    (?:(?P<hours>\d+(?:\.\d*)?|\.\d+)\s*(?:hours?|hrs?|h)\s*,?\s*)?
    (?:(?P<minutes>\d+(?:\.\d*)?|\.\d+)\s*(?:minutes?|mins?|m)\s*,?\s*)?
    (?:(?P<seconds>\d+(?:\.\d*)?|\.\d+)\s*(?:seconds?|secs?|s)?)?
    \s*$"
);

static RE_CLOCK: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"^\s*(?:(?P<hours>\d+):)?(?P<minutes>\d+):(?P<seconds>\d+(?:\.\d+)?)\s*$");

const UNITS: [(&str, f64); 5] = [
    ("weeks", 604_800.0),
    ("days", 86_400.0),
    ("hours", 3_600.0),
    ("minutes", 60.0),
    ("seconds", 1.0),
];

/// Parses a duration expression into whole seconds (rounded).
///
/// Returns `None` for empty or unparseable input.
#[must_use]
pub fn parse_duration(input: &str) -> Option<u64> {
    let caps = RE_CLOCK
        .captures(input)
        .or_else(|| RE_UNITS.captures(input))?;

    let mut total = 0.0_f64;
    let mut matched = false;
    for (unit, factor) in UNITS {
        if let Some(value) = caps.name(unit) {
            total += value.as_str().parse::<f64>().ok()? * factor;
            matched = true;
        }
    }

    if !matched || !total.is_finite() {
        return None;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let seconds = total.round() as u64;
    Some(seconds)
}
