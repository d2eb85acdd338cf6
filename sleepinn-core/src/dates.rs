use chrono::NaiveDate;
use serde::Serialize;

use crate::{CoreError, CoreResult};

/// Longest stay a single quote or booking may cover.
pub const MAX_NIGHTS: i64 = 365;

/// Half-open range of calendar days: `start` is the first night, `end` is
/// the checkout day and is never charged or occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> CoreResult<Self> {
        if start >= end {
            return Err(CoreError::Validation(
                "start date must be before end date".to_string(),
            ));
        }
        if (end - start).num_days() > MAX_NIGHTS {
            return Err(CoreError::Validation(format!(
                "stay cannot exceed {MAX_NIGHTS} nights"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse two `YYYY-MM-DD` strings into a range.
    pub fn parse(start: &str, end: &str) -> CoreResult<Self> {
        Self::new(parse_day(start)?, parse_day(end)?)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn nights(&self) -> u32 {
        (self.end - self.start).num_days() as u32
    }

    /// Every chargeable night, in order. `end` is excluded.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d < end)
    }

    /// Two stays overlap unless one ends on or before the day the other starts.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        !(other.end <= self.start || other.start >= self.end)
    }
}

/// Strict ISO calendar date. chrono alone accepts unpadded fields.
pub fn parse_day(raw: &str) -> CoreResult<NaiveDate> {
    let well_formed = raw.len() == 10
        && raw.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_formed {
        return Err(CoreError::Validation(format!(
            "invalid date '{raw}', expected YYYY-MM-DD"
        )));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| CoreError::Validation(format!("invalid date '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        parse_day(s).unwrap()
    }

    #[test]
    fn test_days_excludes_checkout() {
        let range = DateRange::parse("2025-06-01", "2025-06-04").unwrap();
        let days: Vec<_> = range.days().collect();
        assert_eq!(days, vec![d("2025-06-01"), d("2025-06-02"), d("2025-06-03")]);
        assert_eq!(range.nights(), 3);
    }

    #[test]
    fn test_rejects_empty_and_inverted_ranges() {
        assert!(matches!(
            DateRange::parse("2025-06-04", "2025-06-04"),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            DateRange::parse("2025-06-05", "2025-06-04"),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_rejects_loose_date_formats() {
        assert!(parse_day("2025-6-01").is_err());
        assert!(parse_day("2025/06/01").is_err());
        assert!(parse_day("2025-02-30").is_err());
        assert!(parse_day("").is_err());
    }

    #[test]
    fn test_rejects_overlong_stay() {
        assert!(DateRange::parse("2025-01-01", "2026-06-01").is_err());
    }

    #[test]
    fn test_back_to_back_stays_do_not_overlap() {
        let first = DateRange::parse("2025-06-01", "2025-06-04").unwrap();
        let second = DateRange::parse("2025-06-04", "2025-06-06").unwrap();
        let straddling = DateRange::parse("2025-06-03", "2025-06-05").unwrap();

        assert!(!first.overlaps(&second));
        assert!(!second.overlaps(&first));
        assert!(first.overlaps(&straddling));
        assert!(straddling.overlaps(&second));
    }
}
