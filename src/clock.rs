//! Wall clock helpers for the NTP-synced time
//!
//! Times are Unix seconds in UTC. Summer time follows the EU rule: from the
//! last Sunday of March to the last Sunday of October, switching at 01:00 UTC.

const SECS_PER_DAY: i64 = 86_400;
const SWITCH_HOUR_UTC: i64 = 1;

/// Days since 1970-01-01 for a proleptic Gregorian date
pub fn days_from_civil(year: i64, month: u32, day: u32) -> i64 {
    let (month, day) = (i64::from(month), i64::from(day));
    let year = if month <= 2 { year - 1 } else { year };
    let era = year.div_euclid(400);
    let yoe = year - era * 400;
    let mp = (month + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Calendar date `(year, month, day)` of a day number
pub fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

/// 0 = Sunday
fn weekday(days: i64) -> i64 {
    // 1970-01-01 was a Thursday
    (days + 4).rem_euclid(7)
}

/// Day number of the last Sunday of a 31-day month
fn last_sunday(year: i64, month: u32) -> i64 {
    let last = days_from_civil(year, month, 31);
    last - weekday(last)
}

pub fn is_summer_time(utc: i64) -> bool {
    let (year, _, _) = civil_from_days(utc.div_euclid(SECS_PER_DAY));
    let start = last_sunday(year, 3) * SECS_PER_DAY + SWITCH_HOUR_UTC * 3600;
    let end = last_sunday(year, 10) * SECS_PER_DAY + SWITCH_HOUR_UTC * 3600;
    (start..end).contains(&utc)
}

/// Local time for a zone `utc_offset_minutes` east of UTC observing EU summer time
pub fn local_time(utc: i64, utc_offset_minutes: i32) -> i64 {
    let dst = if is_summer_time(utc) { 3600 } else { 0 };
    utc + i64::from(utc_offset_minutes) * 60 + dst
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_dates() {
        assert_eq!(days_from_civil(1970, 1, 1), 0);
        assert_eq!(days_from_civil(2000, 2, 29) * SECS_PER_DAY, 951_782_400);
        assert_eq!(civil_from_days(19_813), (2024, 3, 31));
        assert_eq!(weekday(days_from_civil(2024, 3, 31)), 0);
    }

    #[test]
    fn test_last_sundays() {
        assert_eq!(civil_from_days(last_sunday(2024, 3)), (2024, 3, 31));
        assert_eq!(civil_from_days(last_sunday(2024, 10)), (2024, 10, 27));
        assert_eq!(civil_from_days(last_sunday(2025, 3)), (2025, 3, 30));
        assert_eq!(civil_from_days(last_sunday(2025, 10)), (2025, 10, 26));
    }

    #[test]
    fn test_summer_time_switches_at_one_utc() {
        // 2024-03-31 01:00 UTC
        assert!(!is_summer_time(1_711_846_800 - 1));
        assert!(is_summer_time(1_711_846_800));
        // 2024-10-27 01:00 UTC
        assert!(is_summer_time(1_729_990_800 - 1));
        assert!(!is_summer_time(1_729_990_800));
    }

    #[test]
    fn test_summer_and_winter() {
        assert!(is_summer_time(1_719_835_200)); // 2024-07-01 12:00
        assert!(!is_summer_time(1_705_320_000)); // 2024-01-15 12:00
        assert!(!is_summer_time(0));
    }

    #[test]
    fn test_local_time_for_central_europe() {
        assert_eq!(local_time(1_705_320_000, 60), 1_705_320_000 + 3600);
        assert_eq!(local_time(1_719_835_200, 60), 1_719_835_200 + 7200);
        assert_eq!(local_time(1_719_835_200, 0), 1_719_835_200 + 3600);
    }

    proptest! {
        #[test]
        fn prop_civil_roundtrip(days in -1_000_000i64..1_000_000) {
            let (y, m, d) = civil_from_days(days);
            prop_assert_eq!(days_from_civil(y, m, d), days);
        }
    }
}
