//! Duration parsing and formatting for configuration values

use serde::{Deserialize, Deserializer};
use std::time::Duration;

const SECOND: u64 = 1000;
const MINUTE: u64 = 60 * SECOND;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Parse duration string (e.g., "2000ms", "2s", "5m", "1h", "1d")
///
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Empty duration string".to_string());
    }

    let (num_str, unit) = s
        .find(|c: char| !c.is_ascii_digit())
        .map(|i| s.split_at(i))
        .unwrap_or((s, "s"));

    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number in duration: {}", s))?;

    let multiplier = match unit.trim().to_lowercase().as_str() {
        "ms" => 1,
        "s" | "" => SECOND,
        "m" => MINUTE,
        "h" => HOUR,
        "d" => DAY,
        other => return Err(format!("Unknown duration unit: {}", other)),
    };

    let millis = num
        .checked_mul(multiplier)
        .ok_or_else(|| format!("Duration value too large: {}", s))?;
    Ok(Duration::from_millis(millis))
}

/// Format duration using the largest unit that divides it evenly
pub fn format_duration(duration: &Duration) -> String {
    let millis = duration.as_millis() as u64;

    if millis == 0 {
        return "0s".to_string();
    }

    if millis.is_multiple_of(DAY) {
        format!("{}d", millis / DAY)
    } else if millis.is_multiple_of(HOUR) {
        format!("{}h", millis / HOUR)
    } else if millis.is_multiple_of(MINUTE) {
        format!("{}m", millis / MINUTE)
    } else if millis.is_multiple_of(SECOND) {
        format!("{}s", millis / SECOND)
    } else {
        format!("{}ms", millis)
    }
}

/// Deserialize duration from a string like "10s" or a bare number of seconds
pub fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_yaml::Value::deserialize(deserializer)?;
    duration_from_yaml(&raw).map_err(serde::de::Error::custom)
}

/// Deserialize optional duration
pub fn deserialize_optional_duration<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_yaml::Value> = Option::deserialize(deserializer)?;
    match raw {
        Some(serde_yaml::Value::Null) | None => Ok(None),
        Some(value) => duration_from_yaml(&value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn duration_from_yaml(value: &serde_yaml::Value) -> std::result::Result<Duration, String> {
    match value {
        serde_yaml::Value::String(s) => parse_duration(s),
        serde_yaml::Value::Number(n) => n
            .as_u64()
            .map(|secs| Duration::from_millis(secs.saturating_mul(SECOND)))
            .ok_or_else(|| format!("Duration must be a non-negative whole number, got {}", n)),
        other => Err(format!("expected a duration string, got {:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_duration("2000ms").unwrap(), Duration::from_millis(2000));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("1d").unwrap(), Duration::from_secs(86_400));
        assert_eq!(parse_duration("7").unwrap(), Duration::from_secs(7));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("ms").is_err());
        assert!(parse_duration("10 fortnights").is_err());
        assert!(parse_duration("-5s").is_err());
    }

    #[test]
    fn test_format_uses_largest_unit() {
        assert_eq!(format_duration(&Duration::from_millis(2000)), "2s");
        assert_eq!(format_duration(&Duration::from_millis(2500)), "2500ms");
        assert_eq!(format_duration(&Duration::from_secs(120)), "2m");
        assert_eq!(format_duration(&Duration::ZERO), "0s");
    }

    #[test]
    fn test_deserialize_from_yaml_number_and_string() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(deserialize_with = "deserialize_duration")]
            wait: Duration,
            #[serde(default, deserialize_with = "deserialize_optional_duration")]
            limit: Option<Duration>,
        }

        let holder: Holder = serde_yaml::from_str("wait: 3\nlimit: 250ms").unwrap();
        assert_eq!(holder.wait, Duration::from_secs(3));
        assert_eq!(holder.limit, Some(Duration::from_millis(250)));

        let holder: Holder = serde_yaml::from_str("wait: 1m").unwrap();
        assert_eq!(holder.wait, Duration::from_secs(60));
        assert_eq!(holder.limit, None);
    }
}
