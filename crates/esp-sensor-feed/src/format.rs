/*
[INPUT]:  Epoch milliseconds and a time zone (local by default)
[OUTPUT]: Display timestamps in the fixed `DD Mon YYYY HH:MM:SS` layout
[POS]:    Formatting layer - pure helpers, no IO
[UPDATE]: When changing the timestamp layout shown next to sensor values
*/

use chrono::{DateTime, Datelike, Local, TimeZone, Timelike, Utc};

use crate::error::{FeedError, Result};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Format epoch milliseconds in the executing machine's local time zone.
pub fn format_timestamp(epoch_ms: i64) -> Result<String> {
    format_timestamp_in(epoch_ms, &Local)
}

/// Format epoch milliseconds in an explicit time zone.
///
/// Day, hour, minute and second are always two digits; the year is printed
/// as-is.
pub fn format_timestamp_in<Tz: TimeZone>(epoch_ms: i64, tz: &Tz) -> Result<String> {
    let utc = DateTime::<Utc>::from_timestamp_millis(epoch_ms)
        .ok_or(FeedError::TimestampOutOfRange { millis: epoch_ms })?;
    let at = utc.with_timezone(tz);

    Ok(format!(
        "{:02} {} {} {:02}:{:02}:{:02}",
        at.day(),
        MONTHS[at.month0() as usize],
        at.year(),
        at.hour(),
        at.minute(),
        at.second(),
    ))
}

/// Current wall-clock time as epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;
    use rstest::rstest;

    fn assert_layout(formatted: &str) {
        let parts: Vec<&str> = formatted.split(' ').collect();
        assert_eq!(parts.len(), 4, "unexpected layout: {formatted}");
        assert_eq!(parts[0].len(), 2);
        assert!(parts[0].chars().all(|c| c.is_ascii_digit()));
        assert!(MONTHS.contains(&parts[1]));
        assert!(parts[2].parse::<i32>().is_ok());
        let clock: Vec<&str> = parts[3].split(':').collect();
        assert_eq!(clock.len(), 3);
        for field in clock {
            assert_eq!(field.len(), 2);
            assert!(field.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_epoch_in_utc() {
        assert_eq!(format_timestamp_in(0, &Utc).unwrap(), "01 Jan 1970 00:00:00");
    }

    #[test]
    fn test_epoch_in_local_keeps_layout() {
        let formatted = format_timestamp(0).unwrap();
        assert_layout(&formatted);
        // Any local offset keeps the epoch within a day of 1 Jan 1970.
        assert!(formatted.contains(" 1970 ") || formatted.starts_with("31 Dec 1969"));
    }

    #[test]
    fn test_offset_shifts_clock() {
        let east = FixedOffset::east_opt(2 * 3600).unwrap();
        assert_eq!(format_timestamp_in(0, &east).unwrap(), "01 Jan 1970 02:00:00");

        let west = FixedOffset::west_opt(5 * 3600).unwrap();
        assert_eq!(format_timestamp_in(0, &west).unwrap(), "31 Dec 1969 19:00:00");
    }

    #[rstest]
    #[case(1_000, "01 Jan 1970 00:00:01")]
    #[case(951_782_400_000, "29 Feb 2000 00:00:00")]
    #[case(1_700_000_000_000, "14 Nov 2023 22:13:20")]
    #[case(1_735_689_599_999, "31 Dec 2024 23:59:59")]
    fn test_known_instants(#[case] epoch_ms: i64, #[case] expected: &str) {
        assert_eq!(format_timestamp_in(epoch_ms, &Utc).unwrap(), expected);
    }

    #[test]
    fn test_every_month_abbreviation() {
        for (index, name) in MONTHS.iter().enumerate() {
            let at = Utc
                .with_ymd_and_hms(2024, index as u32 + 1, 5, 7, 8, 9)
                .unwrap();
            let formatted = format_timestamp_in(at.timestamp_millis(), &Utc).unwrap();
            assert_eq!(formatted, format!("05 {name} 2024 07:08:09"));
        }
    }

    #[test]
    fn test_layout_holds_across_range() {
        let mut epoch_ms = -2_000_000_000_000_i64;
        while epoch_ms < 4_000_000_000_000 {
            assert_layout(&format_timestamp(epoch_ms).unwrap());
            epoch_ms += 86_399_123_457;
        }
    }

    #[test]
    fn test_out_of_range() {
        let err = format_timestamp(i64::MAX).unwrap_err();
        assert!(matches!(err, FeedError::TimestampOutOfRange { millis } if millis == i64::MAX));
    }

    #[test]
    fn test_now_is_formattable() {
        assert_layout(&format_timestamp(now_millis()).unwrap());
    }
}
