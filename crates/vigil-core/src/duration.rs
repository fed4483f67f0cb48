//! Go 风格的持续时间字符串解析
//!
//! 策略的 `frequency` 与事件查询的 `t` 参数均使用该格式：
//! 带可选小数的十进制数加单位后缀，如 "300ms"、"1.5h"、"2h45m"。
//! 合法单位为 "ns"、"us"（或 "µs"）、"ms"、"s"、"m"、"h"。

use crate::error::{CoreError, Result};
use std::time::Duration;

const NANOS_PER_SEC: u128 = 1_000_000_000;

fn unit_scale(unit: &str) -> Option<u128> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(1_000),
        "ms" => Some(1_000_000),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(60 * NANOS_PER_SEC),
        "h" => Some(3_600 * NANOS_PER_SEC),
        _ => None,
    }
}

/// 解析持续时间字符串。
///
/// 负值被拒绝：本系统中没有任何地方允许负的时间量。
/// "0s" 解析为零；是否允许零由调用方决定（频率校验要求严格为正）。
pub fn parse_duration(s: &str) -> Result<Duration> {
    let original = s;
    let mut rest = s.trim();

    if rest.is_empty() {
        return Err(CoreError::validation("empty duration string"));
    }

    let negative = rest.starts_with('-');
    if negative || rest.starts_with('+') {
        rest = &rest[1..];
    }
    if negative {
        return Err(CoreError::validation(format!(
            "negative duration not allowed: {original:?}"
        )));
    }

    // 特例："0" 不带单位是合法的
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(CoreError::validation(format!(
            "malformed duration: {original:?}"
        )));
    }

    let mut total_nanos: u128 = 0;
    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(digits_end);
        if number.is_empty() {
            return Err(CoreError::validation(format!(
                "malformed duration: {original:?}"
            )));
        }

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_end);
        let scale = unit_scale(unit).ok_or_else(|| {
            CoreError::validation(format!(
                "unknown unit {unit:?} in duration {original:?}"
            ))
        })?;

        let segment_nanos = match number.split_once('.') {
            None => {
                let int: u128 = number.parse().map_err(|_| {
                    CoreError::validation(format!("malformed duration: {original:?}"))
                })?;
                int * scale
            }
            Some((int_part, frac_part)) => {
                if int_part.is_empty() && frac_part.is_empty() {
                    return Err(CoreError::validation(format!(
                        "malformed duration: {original:?}"
                    )));
                }
                let int: u128 = if int_part.is_empty() {
                    0
                } else {
                    int_part.parse().map_err(|_| {
                        CoreError::validation(format!("malformed duration: {original:?}"))
                    })?
                };
                let frac: f64 = format!("0.{frac_part}").parse().map_err(|_| {
                    CoreError::validation(format!("malformed duration: {original:?}"))
                })?;
                int * scale + (frac * scale as f64) as u128
            }
        };

        total_nanos = total_nanos.saturating_add(segment_nanos);
        rest = next;
    }

    let secs = (total_nanos / NANOS_PER_SEC) as u64;
    let nanos = (total_nanos % NANOS_PER_SEC) as u32;
    Ok(Duration::new(secs, nanos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
    }

    #[test]
    fn parse_duration_milliseconds() {
        assert_eq!(parse_duration("300ms").unwrap(), Duration::from_millis(300));
    }

    #[test]
    fn parse_duration_minutes() {
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
    }

    #[test]
    fn parse_duration_compound() {
        assert_eq!(parse_duration("2h45m").unwrap(), Duration::from_secs(9900));
        assert_eq!(
            parse_duration("1m30s").unwrap(),
            Duration::from_secs(90)
        );
    }

    #[test]
    fn parse_duration_fractional() {
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("0.5s").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration(".5s").unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn parse_duration_micro_aliases() {
        assert_eq!(parse_duration("10us").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_duration("10µs").unwrap(), Duration::from_micros(10));
    }

    #[test]
    fn parse_duration_zero() {
        assert_eq!(parse_duration("0s").unwrap(), Duration::ZERO);
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn parse_duration_negative_rejected() {
        assert!(parse_duration("-5s").is_err());
        assert!(parse_duration("-1.5h").is_err());
    }

    #[test]
    fn parse_duration_malformed_rejected() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("abc").is_err());
        assert!(parse_duration("5x").is_err());
        assert!(parse_duration("s").is_err());
        // 无单位的裸数字不是合法格式（"0" 除外）
        assert!(parse_duration("10").is_err());
    }
}
