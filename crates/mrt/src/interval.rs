// Copyright (C) 2024-present The bgpcore Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//    http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or
// implied.
// See the License for the specific language governing permissions and
// limitations under the License.


//! Dump interval strings of the form `NhNm`, e.g. `1h30m`, `90m`, `2h` or a
//! plain number of seconds.

use std::time::Duration;

#[derive(thiserror::Error, Eq, PartialEq, Clone, Debug)]
pub enum IntervalError {
    #[error("Malformed interval string: {0}")]
    Malformed(String),
}

/// Parse an interval string into a duration.
///
/// Digits accumulate until a unit suffix: `h` (hours) may appear once and
/// only before `m` (minutes), `m` may appear once, trailing digits are
/// seconds. Any other character, or a zero total, is rejected.
pub fn parse_interval(text: &str) -> Result<Duration, IntervalError> {
    let malformed = || IntervalError::Malformed(text.to_string());
    let mut total: u64 = 0;
    let mut pending: u64 = 0;
    let mut seen_hours = false;
    let mut seen_minutes = false;
    for ch in text.chars() {
        match ch {
            '0'..='9' => {
                let digit = u64::from(ch as u8 - b'0');
                pending = pending
                    .checked_mul(10)
                    .and_then(|value| value.checked_add(digit))
                    .ok_or_else(malformed)?;
            }
            'h' | 'H' => {
                if seen_hours || seen_minutes {
                    return Err(malformed());
                }
                seen_hours = true;
                total = pending
                    .checked_mul(3600)
                    .and_then(|value| value.checked_add(total))
                    .ok_or_else(malformed)?;
                pending = 0;
            }
            'm' | 'M' => {
                if seen_minutes {
                    return Err(malformed());
                }
                seen_minutes = true;
                total = pending
                    .checked_mul(60)
                    .and_then(|value| value.checked_add(total))
                    .ok_or_else(malformed)?;
                pending = 0;
            }
            _ => return Err(malformed()),
        }
    }
    total = total.checked_add(pending).ok_or_else(malformed)?;
    if total == 0 {
        return Err(malformed());
    }
    Ok(Duration::from_secs(total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1h", 3600)]
    #[case("1H", 3600)]
    #[case("90m", 5400)]
    #[case("1h30m", 5400)]
    #[case("2h5", 7205)]
    #[case("1m30", 90)]
    #[case("600", 600)]
    fn test_valid_interval(#[case] text: &str, #[case] seconds: u64) {
        assert_eq!(parse_interval(text), Ok(Duration::from_secs(seconds)));
    }

    #[rstest]
    #[case("")]
    #[case("0")]
    #[case("0h0m")]
    #[case("1s")]
    #[case("1d")]
    #[case("30m1h")]
    #[case("1h1h")]
    #[case("1m1m")]
    #[case("-5")]
    #[case("99999999999999999999")]
    fn test_malformed_interval(#[case] text: &str) {
        assert_eq!(
            parse_interval(text),
            Err(IntervalError::Malformed(text.to_string()))
        );
    }
}
