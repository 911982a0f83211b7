/*
[INPUT]:  Raw WebSocket text frames from the sensor device
[OUTPUT]: Parsed FeedMessage values and integer counter readings
[POS]:    WebSocket layer - message parsing and validation
[UPDATE]: When adding new message types or sensors
*/

use std::fmt;

use serde::{Deserialize, Serialize};

/// Top-level frame sent by the device, discriminated by `type`.
///
/// Fields are required: a frame without `type`, a `"message"` frame without
/// `data`, or a counter without `value` fails to decode instead of being
/// ignored or rendered as `NaN`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type")]
pub enum FeedMessage {
    #[serde(rename = "message")]
    Message { data: SensorPayload },
    #[serde(other)]
    Unhandled,
}

/// Payload of a `"message"` frame, discriminated by `sensor`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "sensor")]
pub enum SensorPayload {
    #[serde(rename = "counter")]
    Counter { value: ReadingValue },
    #[serde(other)]
    Unhandled,
}

/// Sensor value as it appears on the wire: the firmware sends numbers, older
/// pages sent strings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ReadingValue {
    Number(serde_json::Number),
    Text(String),
}

/// Integer reading extracted from a [`ReadingValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterReading {
    Value(i64),
    NotANumber,
}

impl FeedMessage {
    /// Counter frame as emitted by the device firmware.
    pub fn counter(value: u64) -> Self {
        FeedMessage::Message {
            data: SensorPayload::Counter {
                value: ReadingValue::Number(value.into()),
            },
        }
    }
}

impl ReadingValue {
    /// Integer-parse the value with radix auto-detection.
    ///
    /// Leading whitespace is skipped, an optional sign is honoured and a
    /// `0x`/`0X` prefix selects base 16; otherwise base 10. Parsing stops at
    /// the first character that is not a digit of the selected base. Numbers
    /// go through their shortest textual form first, so `42.9` reads as 42
    /// and `1.5e21` reads as 1.
    pub fn parse_counter(&self) -> CounterReading {
        match self {
            ReadingValue::Text(text) => parse_int_prefix(text),
            ReadingValue::Number(number) => {
                if let Some(value) = number.as_i64() {
                    CounterReading::Value(value)
                } else if let Some(value) = number.as_f64() {
                    parse_int_prefix(&number_text(value))
                } else {
                    CounterReading::NotANumber
                }
            }
        }
    }
}

impl fmt::Display for CounterReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterReading::Value(value) => write!(f, "{value}"),
            CounterReading::NotANumber => f.write_str("NaN"),
        }
    }
}

/// Shortest text for a float, switching to exponent notation outside
/// `[1e-6, 1e21)` like script number printing does.
fn number_text(value: f64) -> String {
    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-6..1e21).contains(&magnitude) {
        format!("{value:e}")
    } else {
        format!("{value}")
    }
}

fn parse_int_prefix(input: &str) -> CounterReading {
    let mut rest = input.trim_start();

    let negative = match rest.as_bytes().first() {
        Some(b'-') => {
            rest = &rest[1..];
            true
        }
        Some(b'+') => {
            rest = &rest[1..];
            false
        }
        _ => false,
    };

    let radix = if rest.starts_with("0x") || rest.starts_with("0X") {
        rest = &rest[2..];
        16
    } else {
        10
    };

    let digits: &str = {
        let end = rest
            .char_indices()
            .find(|(_, c)| !c.is_digit(radix))
            .map(|(index, _)| index)
            .unwrap_or(rest.len());
        &rest[..end]
    };

    if digits.is_empty() {
        return CounterReading::NotANumber;
    }

    // Readings that do not fit in i64 are reported as NaN.
    match i64::from_str_radix(digits, radix) {
        Ok(value) if negative => CounterReading::Value(-value),
        Ok(value) => CounterReading::Value(value),
        Err(_) => CounterReading::NotANumber,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn text(value: &str) -> ReadingValue {
        ReadingValue::Text(value.to_string())
    }

    #[test]
    fn test_decode_counter_frame() {
        let raw = r#"{"type":"message","data":{"sensor":"counter","value":"42"}}"#;
        let parsed: FeedMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed,
            FeedMessage::Message {
                data: SensorPayload::Counter { value: text("42") }
            }
        );
    }

    #[test]
    fn test_decode_numeric_counter_frame() {
        let raw = r#"{"type":"message","data":{"sensor":"counter","value":17}}"#;
        let parsed: FeedMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed, FeedMessage::counter(17));
    }

    #[test]
    fn test_decode_unknown_type() {
        let raw = r#"{"type":"status","data":{"sensor":"counter","value":1}}"#;
        let parsed: FeedMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed, FeedMessage::Unhandled);
    }

    #[test]
    fn test_decode_unknown_sensor() {
        let raw = r#"{"type":"message","data":{"sensor":"temperature","value":"21.5"}}"#;
        let parsed: FeedMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(
            parsed,
            FeedMessage::Message {
                data: SensorPayload::Unhandled
            }
        );
    }

    #[test]
    fn test_decode_message_without_data_fails() {
        assert!(serde_json::from_str::<FeedMessage>(r#"{"type":"message"}"#).is_err());
        assert!(serde_json::from_str::<FeedMessage>("not json").is_err());
    }

    #[rstest]
    #[case(r#"{"data":1}"#)]
    #[case(r#"{"type":"message","data":{"sensor":"counter"}}"#)]
    #[case(r#"{"type":"message","data":{"sensor":"counter","value":null}}"#)]
    fn test_decode_requires_fields(#[case] raw: &str) {
        assert!(serde_json::from_str::<FeedMessage>(raw).is_err());
    }

    #[test]
    fn test_counter_serializes_like_firmware() {
        let encoded = serde_json::to_string(&FeedMessage::counter(3)).unwrap();
        assert_eq!(
            encoded,
            r#"{"type":"message","data":{"sensor":"counter","value":3}}"#
        );
    }

    #[rstest]
    #[case("42", CounterReading::Value(42))]
    #[case("  12abc", CounterReading::Value(12))]
    #[case("-7", CounterReading::Value(-7))]
    #[case("+8", CounterReading::Value(8))]
    #[case("0x1A", CounterReading::Value(26))]
    #[case("0Xff", CounterReading::Value(255))]
    #[case("-0x10", CounterReading::Value(-16))]
    #[case("012", CounterReading::Value(12))]
    #[case("3.99", CounterReading::Value(3))]
    #[case("abc", CounterReading::NotANumber)]
    #[case("", CounterReading::NotANumber)]
    #[case("0x", CounterReading::NotANumber)]
    #[case("-", CounterReading::NotANumber)]
    #[case("99999999999999999999999", CounterReading::NotANumber)]
    fn test_parse_text_counter(#[case] input: &str, #[case] expected: CounterReading) {
        assert_eq!(text(input).parse_counter(), expected);
    }

    #[rstest]
    #[case(r#"42"#, CounterReading::Value(42))]
    #[case(r#"-7"#, CounterReading::Value(-7))]
    #[case(r#"42.9"#, CounterReading::Value(42))]
    #[case(r#"-0.5"#, CounterReading::Value(0))]
    #[case(r#"1.5e21"#, CounterReading::Value(1))]
    #[case(r#"5e-7"#, CounterReading::Value(5))]
    #[case(r#"18446744073709551615"#, CounterReading::NotANumber)]
    fn test_parse_numeric_counter(#[case] raw: &str, #[case] expected: CounterReading) {
        let value: ReadingValue = serde_json::from_str(raw).unwrap();
        assert_eq!(value.parse_counter(), expected);
    }

    #[test]
    fn test_reading_display() {
        assert_eq!(CounterReading::Value(42).to_string(), "42");
        assert_eq!(CounterReading::Value(-3).to_string(), "-3");
        assert_eq!(CounterReading::NotANumber.to_string(), "NaN");
    }
}
