//! 기간(Duration) 문자열 파싱
//!
//! 수집 문서와 DSN 파라미터는 `500ms`, `5s`, `3h`처럼 접미사가 붙은 기간
//! 표기를 사용합니다. 접미사 없는 정수는 초로 해석합니다.

use std::time::Duration;

use crate::error::AcquisitionError;

/// `"500ms"` / `"5s"` / `"10m"` / `"3h"` 형식의 기간을 파싱합니다.
pub fn parse_duration(input: &str) -> Result<Duration, AcquisitionError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(AcquisitionError::config("empty duration"));
    }

    let split_at = input
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(input.len());
    let (number, unit) = input.split_at(split_at);

    let value: f64 = number.parse().map_err(|_| {
        AcquisitionError::config(format!("invalid duration '{input}'"))
    })?;

    let millis_per_unit: f64 = match unit {
        "ms" => 1.0,
        "" | "s" => 1_000.0,
        "m" => 60_000.0,
        "h" => 3_600_000.0,
        "d" => 86_400_000.0,
        _ => {
            return Err(AcquisitionError::config(format!(
                "invalid duration '{input}': unknown unit '{unit}'"
            )));
        }
    };

    if value < 0.0 {
        return Err(AcquisitionError::config(format!(
            "invalid duration '{input}': must not be negative"
        )));
    }

    Ok(Duration::from_millis((value * millis_per_unit).round() as u64))
}

/// `Duration` 필드용 serde 어댑터 (`wait_for_ready: 5s` 등)
pub mod serde_str {
    use super::*;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

/// `Option<Duration>` 필드용 serde 어댑터 (`since: 1h` 등)
pub mod serde_opt_str {
    use super::*;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
