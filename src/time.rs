//! Hand-rolled civil-time parsing/formatting for loan timestamps.
//!
//! Deliberately not calendar-aware (no leap-year or days-in-month check) and
//! deliberately not `chrono`: the accepted date range is looser than any
//! calendar-validating parser would allow, and this crate's date format and
//! validation rules must match that leniency exactly.

use crate::error::BookError;
use std::os::raw::c_int;

/// A broken-down local timestamp, mirroring the fields `struct tm` exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CivilTime {
    pub sec: i32,
    pub min: i32,
    pub hour: i32,
    pub mday: i32,
    pub mon: i32,
    pub year: i32,
}

impl CivilTime {
    fn to_tm(self) -> libc::tm {
        let mut tm: libc::tm = unsafe { std::mem::zeroed() };
        tm.tm_sec = self.sec as c_int;
        tm.tm_min = self.min as c_int;
        tm.tm_hour = self.hour as c_int;
        tm.tm_mday = self.mday as c_int;
        tm.tm_mon = self.mon as c_int;
        tm.tm_year = self.year as c_int;
        tm
    }

    fn from_tm(tm: &libc::tm) -> Self {
        CivilTime {
            sec: tm.tm_sec,
            min: tm.tm_min,
            hour: tm.tm_hour,
            mday: tm.tm_mday,
            mon: tm.tm_mon,
            year: tm.tm_year,
        }
    }
}

/// Parses `"dd-mm-yyyyHH:MM:SS"` (the literal format the request/record
/// `loan:` field uses once whitespace has been stripped, so the date
/// and time run together with no separating space), validating only the
/// ranges the original program checks: no real calendar validity, just
/// "day <= 31, month <= 11 (0-based), year >= 2000, usual clock ranges".
pub fn parse_loan_date(src: &str) -> Result<CivilTime, BookError> {
    let bytes = src.as_bytes();
    if bytes.len() < 18 {
        return Err(BookError::BadDate);
    }
    let day: i32 = src.get(0..2).and_then(|s| s.parse().ok()).ok_or(BookError::BadDate)?;
    if src.as_bytes().get(2) != Some(&b'-') {
        return Err(BookError::BadDate);
    }
    let mon: i32 = src.get(3..5).and_then(|s| s.parse().ok()).ok_or(BookError::BadDate)?;
    if src.as_bytes().get(5) != Some(&b'-') {
        return Err(BookError::BadDate);
    }
    let year: i32 = src.get(6..10).and_then(|s| s.parse().ok()).ok_or(BookError::BadDate)?;
    let hour: i32 = src.get(10..12).and_then(|s| s.parse().ok()).ok_or(BookError::BadDate)?;
    if src.as_bytes().get(12) != Some(&b':') {
        return Err(BookError::BadDate);
    }
    let min: i32 = src.get(13..15).and_then(|s| s.parse().ok()).ok_or(BookError::BadDate)?;
    if src.as_bytes().get(15) != Some(&b':') {
        return Err(BookError::BadDate);
    }
    let sec: i32 = src.get(16..18).and_then(|s| s.parse().ok()).ok_or(BookError::BadDate)?;

    let civil = CivilTime {
        sec,
        min,
        hour,
        mday: day,
        mon: mon - 1,
        year: year - 1900,
    };

    if civil.mday > 31 || civil.mon > 11 || civil.year + 1900 < 2000 || civil.sec >= 60 || civil.min >= 60 || civil.hour >= 24 {
        return Err(BookError::BadDate);
    }

    Ok(civil)
}

/// Current local time, via `libc::localtime_r`.
pub fn current_time() -> std::io::Result<CivilTime> {
    let mut t: libc::time_t = 0;
    unsafe { libc::time(&mut t) };
    let mut tm: libc::tm = unsafe { std::mem::zeroed() };
    let ok = unsafe { libc::localtime_r(&t, &mut tm) };
    if ok.is_null() {
        return Err(std::io::Error::last_os_error());
    }
    Ok(CivilTime::from_tm(&tm))
}

/// Seconds between two civil times (`time2 - time1`), via `mktime`/`difftime`.
pub fn seconds_between(time1: CivilTime, time2: CivilTime) -> std::io::Result<i64> {
    let mut tm1 = time1.to_tm();
    let mut tm2 = time2.to_tm();
    let t1 = unsafe { libc::mktime(&mut tm1) };
    let t2 = unsafe { libc::mktime(&mut tm2) };
    if t1 == -1 || t2 == -1 {
        return Err(std::io::Error::last_os_error());
    }
    let diff = unsafe { libc::difftime(t2, t1) };
    Ok(diff as i64)
}

/// Formats a civil time as `"dd-mm-yyyy HH:MM:SS"`, matching
/// `pt_creaStringaData`'s display format (note the space, unlike the parse
/// format which allows the time to immediately follow the date).
pub fn format_loan_date(civil: CivilTime) -> String {
    format!(
        "{:02}-{:02}-{:04} {:02}:{:02}:{:02}",
        civil.mday,
        civil.mon + 1,
        civil.year + 1900,
        civil.hour,
        civil.min,
        civil.sec,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_date() {
        let civil = parse_loan_date("01-06-202612:30:45").unwrap();
        assert_eq!(civil.mday, 1);
        assert_eq!(civil.mon, 5);
        assert_eq!(civil.year, 126);
        assert_eq!(civil.hour, 12);
    }

    #[test]
    fn rejects_out_of_range_fields() {
        assert!(parse_loan_date("32-06-202612:30:45").is_err());
        assert!(parse_loan_date("01-13-202612:30:45").is_err());
        assert!(parse_loan_date("01-06-199912:30:45").is_err());
        assert!(parse_loan_date("01-06-202625:30:45").is_err());
    }

    #[test]
    fn formats_with_leading_zeros() {
        let civil = CivilTime {
            sec: 5,
            min: 3,
            hour: 1,
            mday: 2,
            mon: 0,
            year: 126,
        };
        assert_eq!(format_loan_date(civil), "02-01-2026 01:03:05");
    }

    #[test]
    fn round_trip_through_seconds_between() {
        let now = current_time().unwrap();
        assert_eq!(seconds_between(now, now).unwrap(), 0);
    }
}
