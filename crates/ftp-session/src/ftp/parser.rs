//! LIST response parser for Unix-style (`ls -l`) listings.
//!
//! ```text
//! drwxr-xr-x   2 user group  4096 Jan 15  2023 dirname
//! -rw-r--r--   1 user group  1234 Dec 31 23:59 file.txt
//! lrwxrwxrwx   1 user group     7 Jan  1  2024 link -> target
//! ```
//!
//! The date column shows either a year or, for recent entries, a time of
//! day. In the latter case the year is inferred relative to a caller-supplied
//! reference instant: the entry is the most recent past occurrence of that
//! month/day, never a future one.

use crate::ftp::error::{FtpError, FtpResult};
use crate::ftp::types::{DirectoryListing, FtpEntry, FtpEntryKind};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref UNIX_LINE: Regex = Regex::new(
        r"(?xi)
        ^([-a-z]+[+.@]?)\s+                     # permissions (+ ACL marker)
        (\d+)\s+                                # link count
        (\S+)\s+                                # owner
        (\S+)\s+                                # group
        (\d+)\s+                                # size
        ([a-z]+)\s+                             # month
        (\d{1,2})\s+                            # day
        (?:(\d{4})|(\d{1,2}):(\d{2}))\s+        # year | HH:MM
        (.+)$                                   # name (possibly with -> target)
        ",
    )
    .expect("static LIST pattern");
    static ref TOTAL_LINE: Regex = Regex::new(r"^total\s+\d+$").expect("static total pattern");
}

/// Three-letter month abbreviations, case-sensitive.
const MONTHS: [(&str, u32); 12] = [
    ("Jan", 1),
    ("Feb", 2),
    ("Mar", 3),
    ("Apr", 4),
    ("May", 5),
    ("Jun", 6),
    ("Jul", 7),
    ("Aug", 8),
    ("Sep", 9),
    ("Oct", 10),
    ("Nov", 11),
    ("Dec", 12),
];

fn month_number(abbr: &str) -> Option<u32> {
    MONTHS
        .iter()
        .find(|(name, _)| *name == abbr)
        .map(|(_, n)| *n)
}

/// Parse raw LIST lines into entries, preserving server order.
///
/// Blank lines and the `total N` summary line are skipped. Any other line
/// that cannot be resolved fails the whole listing.
pub fn parse_listing<S: AsRef<str>>(lines: &[S], now: NaiveDateTime) -> FtpResult<DirectoryListing> {
    let mut entries = Vec::with_capacity(lines.len());
    for line in lines {
        let line = line.as_ref().trim_end();
        if line.trim().is_empty() || TOTAL_LINE.is_match(line.trim()) {
            continue;
        }
        entries.push(parse_line(line, now)?);
    }
    Ok(entries)
}

/// Parse a single Unix `ls -l` line.
pub fn parse_line(line: &str, now: NaiveDateTime) -> FtpResult<FtpEntry> {
    let line = line.trim_end();
    let caps = UNIX_LINE
        .captures(line)
        .ok_or_else(|| FtpError::parse_failed(format!("Unrecognised listing line: '{}'", line)))?;

    let permissions = &caps[1];
    let links = parse_number::<u32>(&caps[2], "link count", line)?;
    let size = parse_number::<u64>(&caps[5], "size", line)?;

    let month = month_number(&caps[6]).ok_or_else(|| {
        FtpError::parse_failed(format!("Unknown month '{}' in listing line: '{}'", &caps[6], line))
    })?;
    let day = parse_number::<u32>(&caps[7], "day", line)?;

    let modified = match caps.get(8) {
        Some(year) => {
            let year = parse_number::<i32>(year.as_str(), "year", line)?;
            NaiveDate::from_ymd_opt(year, month, day)
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .ok_or_else(|| invalid_date(line))?
        }
        None => {
            let hour = parse_number::<u32>(&caps[9], "hour", line)?;
            let minute = parse_number::<u32>(&caps[10], "minute", line)?;
            let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| invalid_date(line))?;
            infer_year(month, day, time, now).ok_or_else(|| invalid_date(line))?
        }
    };

    let kind = FtpEntryKind::from_permission_char(permissions.as_bytes()[0]);
    let name_raw = &caps[11];
    let (name, link_target) = match (kind, name_raw.split_once(" -> ")) {
        (FtpEntryKind::Symlink, Some((name, target))) => {
            (name.trim_end().to_string(), Some(target.trim().to_string()))
        }
        _ => (name_raw.to_string(), None),
    };

    Ok(FtpEntry {
        name,
        kind,
        size,
        modified,
        permissions: permissions.to_string(),
        links,
        owner: caps[3].to_string(),
        group: caps[4].to_string(),
        link_target,
        raw: line.to_string(),
    })
}

/// Resolve a year-less `month day HH:MM` against `now`: the current year,
/// unless that lands strictly after `now`, in which case the previous one.
fn infer_year(month: u32, day: u32, time: NaiveTime, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let year = now.year();
    if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
        let tentative = date.and_time(time);
        if tentative <= now {
            return Some(tentative);
        }
    }
    // Either in the future or not a valid day this year (Feb 29).
    NaiveDate::from_ymd_opt(year - 1, month, day)
        .map(|date| date.and_time(time))
        .filter(|dt| *dt <= now)
}

fn parse_number<T: std::str::FromStr>(s: &str, what: &str, line: &str) -> FtpResult<T> {
    s.parse::<T>().map_err(|_| {
        FtpError::parse_failed(format!("Invalid {} '{}' in listing line: '{}'", what, s, line))
    })
}

fn invalid_date(line: &str) -> FtpError {
    FtpError::parse_failed(format!("Invalid date in listing line: '{}'", line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ftp::error::FtpErrorKind;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_unix_dir_with_year() {
        let e = parse_line("drwxr-xr-x 2 ftp ftp 4096 Jan 15 2023 subfolder", at(2024, 6, 1, 12, 0)).unwrap();
        assert_eq!(e.kind, FtpEntryKind::Directory);
        assert_eq!(e.size, 4096);
        assert_eq!(e.name, "subfolder");
        assert_eq!(e.modified_display(), "15.01.2023 00:00");
        assert_eq!(e.links, 2);
        assert_eq!(e.owner, "ftp");
        assert_eq!(e.group, "ftp");
    }

    #[test]
    fn test_time_of_day_in_future_uses_previous_year() {
        let e = parse_line("-rw-r--r-- 1 ftp ftp 1234 Dec 31 23:59 data.txt", at(2024, 1, 2, 10, 0)).unwrap();
        assert_eq!(e.kind, FtpEntryKind::File);
        assert_eq!(e.modified_display(), "31.12.2023 23:59");
    }

    #[test]
    fn test_time_of_day_in_past_uses_current_year() {
        let e = parse_line("-rw-r--r-- 1 ftp ftp 10 Jan  1 08:30 a.txt", at(2024, 1, 2, 10, 0)).unwrap();
        assert_eq!(e.modified, at(2024, 1, 1, 8, 30));
    }

    #[test]
    fn test_time_of_day_equal_to_now_is_not_future() {
        let now = at(2024, 3, 5, 14, 7);
        let e = parse_line("-rw-r--r-- 1 ftp ftp 10 Mar  5 14:07 a.txt", now).unwrap();
        assert_eq!(e.modified, now);
    }

    #[test]
    fn test_one_minute_ahead_is_future() {
        let now = at(2024, 3, 5, 14, 7);
        let e = parse_line("-rw-r--r-- 1 ftp ftp 10 Mar  5 14:08 a.txt", now).unwrap();
        assert_eq!(e.modified, at(2023, 3, 5, 14, 8));
    }

    #[test]
    fn test_leap_day_in_non_leap_year_resolves_backwards() {
        let e = parse_line("-rw-r--r-- 1 ftp ftp 10 Feb 29 09:00 leap.txt", at(2025, 1, 10, 0, 0)).unwrap();
        assert_eq!(e.modified, at(2024, 2, 29, 9, 0));
    }

    #[test]
    fn test_symlink_name_stripped() {
        let e = parse_line("lrwxrwxrwx 1 ftp ftp 7 Jan 1 2024 link -> target", at(2024, 6, 1, 0, 0)).unwrap();
        assert_eq!(e.kind, FtpEntryKind::Symlink);
        assert_eq!(e.name, "link");
        assert_eq!(e.size, 7);
        assert_eq!(e.link_target.as_deref(), Some("target"));
    }

    #[test]
    fn test_symlink_with_spaces_in_name() {
        let e = parse_line(
            "lrwxrwxrwx   1 root root    22 Jan  5 08:00 my link -> /var/my target",
            at(2024, 6, 1, 0, 0),
        )
        .unwrap();
        assert_eq!(e.name, "my link");
        assert_eq!(e.link_target.as_deref(), Some("/var/my target"));
    }

    #[test]
    fn test_file_name_keeps_arrow_text() {
        let e = parse_line("-rw-r--r-- 1 u g 1 Jan 1 2024 a -> b", at(2024, 6, 1, 0, 0)).unwrap();
        assert_eq!(e.name, "a -> b");
        assert!(e.link_target.is_none());
    }

    #[test]
    fn test_acl_marker_in_permissions() {
        let e = parse_line("drwxr-xr-x+ 3 u g 4096 Jan 1 2024 shared", at(2024, 6, 1, 0, 0)).unwrap();
        assert_eq!(e.kind, FtpEntryKind::Directory);
        assert_eq!(e.permissions, "drwxr-xr-x+");
    }

    #[test]
    fn test_unknown_kind_from_permission_char() {
        let e = parse_line("crw-rw---- 1 root tty 0 Jan 1 2024 tty0", at(2024, 6, 1, 0, 0)).unwrap();
        assert_eq!(e.kind, FtpEntryKind::Unknown);
        assert_eq!(e.name, "tty0");
    }

    #[test]
    fn test_listing_preserves_order_and_skips_total() {
        let raw = vec![
            "total 12".to_string(),
            "-rw-r--r-- 1 u g 5 Jan 1 2024 zeta".to_string(),
            "".to_string(),
            "drwxr-xr-x 2 u g 4096 Jan 1 2024 alpha\r".to_string(),
        ];
        let entries = parse_listing(&raw, at(2024, 6, 1, 0, 0)).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_unmatched_line_fails_listing() {
        let raw = ["-rw-r--r-- 1 u g 5 Jan 1 2024 ok", "01-01-26  12:00AM  <DIR> Windows"];
        let err = parse_listing(&raw, at(2024, 6, 1, 0, 0)).unwrap_err();
        assert_eq!(err.kind, FtpErrorKind::ParseFailed);
        assert!(err.message.contains("Windows"));
    }

    #[test]
    fn test_unknown_month_fails_fast() {
        let err = parse_line("-rw-r--r-- 1 u g 5 jan 1 2024 lower", at(2024, 6, 1, 0, 0)).unwrap_err();
        assert_eq!(err.kind, FtpErrorKind::ParseFailed);
        assert!(err.message.contains("Unknown month 'jan'"));
    }

    #[test]
    fn test_invalid_calendar_day_fails() {
        let err = parse_line("-rw-r--r-- 1 u g 5 Feb 30 2024 bad", at(2024, 6, 1, 0, 0)).unwrap_err();
        assert_eq!(err.kind, FtpErrorKind::ParseFailed);
    }

    #[test]
    fn test_empty_listing() {
        let raw: Vec<String> = Vec::new();
        assert!(parse_listing(&raw, at(2024, 6, 1, 0, 0)).unwrap().is_empty());
    }
}
