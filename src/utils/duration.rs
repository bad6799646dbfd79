// Copyright 2023 mailgun-provider authors
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::time::Duration;

use crate::error::ProviderError;

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SECOND: u128 = 1_000_000_000;

// Fraction digits beyond nanosecond precision of an hour carry no information.
const MAX_FRACTION_DIGITS: usize = 18;

/// Parses a duration string such as `"15s"`, `"10m"`, `"1h30m"`, `"1.5s"` or `"300ms"`.
///
/// The accepted grammar is a sequence of decimal numbers, each with an optional
/// fraction and a mandatory unit (`ns`, `us`, `µs`, `ms`, `s`, `m`, `h`). A bare
/// `"0"` is accepted. Negative durations are rejected.
pub fn parse_duration(raw: &str) -> Result<Duration, ProviderError> {
    let invalid = |reason: String| ProviderError::InvalidDuration {
        value: raw.to_string(),
        reason,
    };

    let mut rest = raw.strip_prefix('+').unwrap_or(raw);
    if rest.starts_with('-') {
        return Err(invalid("negative durations are not supported".into()));
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid("empty duration".into()));
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_len = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let (int_digits, after_int) = rest.split_at(int_len);

        let (frac_digits, after_number) = match after_int.strip_prefix('.') {
            Some(after_dot) => {
                let frac_len = after_dot
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(after_dot.len());
                after_dot.split_at(frac_len)
            }
            None => ("", after_int),
        };

        if int_digits.is_empty() && frac_digits.is_empty() {
            return Err(invalid(format!("expected a number at {rest:?}")));
        }

        let unit_len = after_number
            .find(|c: char| c == '.' || c.is_ascii_digit())
            .unwrap_or(after_number.len());
        let (unit, remainder) = after_number.split_at(unit_len);

        let unit_nanos = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => NANOS_PER_MICRO,
            "ms" => NANOS_PER_MILLI,
            "s" => NANOS_PER_SECOND,
            "m" => 60 * NANOS_PER_SECOND,
            "h" => 3_600 * NANOS_PER_SECOND,
            "" => return Err(invalid(format!("missing unit after {int_digits}"))),
            other => return Err(invalid(format!("unknown unit {other:?}"))),
        };

        let whole: u128 = if int_digits.is_empty() {
            0
        } else {
            int_digits
                .parse()
                .map_err(|_| invalid("duration out of range".into()))?
        };

        let frac_digits = &frac_digits[..frac_digits.len().min(MAX_FRACTION_DIGITS)];
        let fraction_nanos = if frac_digits.is_empty() {
            0
        } else {
            let numerator: u128 = frac_digits
                .parse()
                .map_err(|_| invalid("duration out of range".into()))?;
            numerator * unit_nanos / 10u128.pow(frac_digits.len() as u32)
        };

        total = whole
            .checked_mul(unit_nanos)
            .and_then(|n| n.checked_add(fraction_nanos))
            .and_then(|n| n.checked_add(total))
            .ok_or_else(|| invalid("duration out of range".into()))?;

        rest = remainder;
    }

    let nanos = u64::try_from(total).map_err(|_| invalid("duration out of range".into()))?;
    Ok(Duration::from_nanos(nanos))
}

/// Parses `raw`, returning `fallback` when it is empty or only whitespace.
///
/// A malformed value is an error; the fallback is never substituted for it.
pub fn parse_duration_with_default(raw: &str, fallback: Duration) -> Result<Duration, ProviderError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(fallback);
    }
    parse_duration(trimmed)
}

/// Formats a duration the way [`parse_duration`] reads it back, e.g. `"10m0s"`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (hours, minutes, seconds) = (secs / 3_600, (secs % 3_600) / 60, secs % 60);
    let millis = duration.subsec_millis();

    let seconds = if millis == 0 {
        format!("{seconds}s")
    } else {
        format!("{seconds}.{millis:03}s")
    };

    match (hours, minutes) {
        (0, 0) => seconds,
        (0, m) => format!("{m}m{seconds}"),
        (h, m) => format!("{h}h{m}m{seconds}"),
    }
}
