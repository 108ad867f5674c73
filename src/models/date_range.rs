//! Inclusive calendar date ranges for history queries.

use chrono::NaiveDate;

use crate::error::{AppError, Result};

/// Two inclusive calendar-day endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Parse `y1/m1/d1/y2/m2/d2` path segments.
    ///
    /// Fewer than six segments, non-numeric parts, or impossible dates are
    /// a bad request. Extra trailing segments are ignored.
    pub fn parse_segments(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.trim_matches('/').split('/').collect();
        if parts.len() < 6 {
            return Err(AppError::bad_request(format!(
                "expected six date segments, got {}",
                parts.len()
            )));
        }
        let start = parse_date(parts[0], parts[1], parts[2])?;
        let end = parse_date(parts[3], parts[4], parts[5])?;
        Ok(Self { start, end })
    }

    /// Whether the range is empty (start after end).
    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

fn parse_date(year: &str, month: &str, day: &str) -> Result<NaiveDate> {
    let year: i32 = year
        .parse()
        .map_err(|_| AppError::bad_request(format!("invalid year '{year}'")))?;
    let month: u32 = month
        .parse()
        .map_err(|_| AppError::bad_request(format!("invalid month '{month}'")))?;
    let day: u32 = day
        .parse()
        .map_err(|_| AppError::bad_request(format!("invalid day '{day}'")))?;
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| AppError::bad_request(format!("invalid date {year}-{month}-{day}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_valid_range() {
        let range = DateRange::parse_segments("2017/1/5/2017/12/31").unwrap();
        assert_eq!(range.start, date(2017, 1, 5));
        assert_eq!(range.end, date(2017, 12, 31));
        assert!(!range.is_inverted());
    }

    #[test]
    fn test_parse_rejects_short_and_garbage() {
        assert!(matches!(
            DateRange::parse_segments("2017/1/5"),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            DateRange::parse_segments("2017/x/5/2017/12/31"),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            DateRange::parse_segments("2017/2/30/2017/12/31"),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_contains_is_inclusive() {
        let range = DateRange::new(date(2017, 1, 1), date(2017, 1, 31));
        assert!(range.contains(date(2017, 1, 1)));
        assert!(range.contains(date(2017, 1, 31)));
        assert!(!range.contains(date(2017, 2, 1)));
    }

    #[test]
    fn test_inverted() {
        let range = DateRange::parse_segments("2018/1/1/2017/1/1").unwrap();
        assert!(range.is_inverted());
    }
}
