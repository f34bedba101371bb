//! Pure arithmetic behind every progress, grade, and trend figure.
//!
//! Nothing here divides by zero: empty denominators yield `0` for rates and
//! `None` for averages, so callers can tell "no data" apart from a real zero.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Serialize;
use std::fmt;

use crate::model::effective_total_score;

/// `round(100 × part / whole)` with halves rounded up; `0` when `whole == 0`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn percent(part: u32, whole: u32) -> u32 {
    if whole == 0 {
        return 0;
    }
    (100.0 * f64::from(part) / f64::from(whole)).round() as u32
}

/// Raw ratio `part / whole`, or `None` when `whole == 0`.
#[must_use]
pub fn ratio(part: u32, whole: u32) -> Option<f64> {
    if whole == 0 {
        None
    } else {
        Some(f64::from(part) / f64::from(whole))
    }
}

/// Rounds to one decimal place, halves away from zero.
#[must_use]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Score as a percentage of the assignment total, one decimal.
///
/// A missing total uses the default of 100.
#[must_use]
pub fn normalized_percentage(score: u32, total_score: Option<u32>) -> f64 {
    let total = effective_total_score(total_score);
    round1(100.0 * f64::from(score) / f64::from(total))
}

/// Arithmetic mean, `None` for an empty slice.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().sum();
    Some(sum / values.len() as f64)
}

/// Mean of normalized percentages over `(score, total)` pairs, one decimal.
#[must_use]
pub fn average_percentage<I>(graded: I) -> Option<f64>
where
    I: IntoIterator<Item = (u32, Option<u32>)>,
{
    let values: Vec<f64> = graded
        .into_iter()
        .map(|(score, total)| normalized_percentage(score, total))
        .collect();
    mean(&values).map(round1)
}

//
// ─── LETTER GRADES ─────────────────────────────────────────────────────────────
//

/// Placeholder shown when there is no average to grade.
pub const NO_GRADE_LABEL: &str = "—";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
    F,
}

impl LetterGrade {
    /// Maps a percentage average to a letter: 90/80/70/60 cut-offs.
    #[must_use]
    pub fn from_percentage(avg: f64) -> Self {
        if avg >= 90.0 {
            LetterGrade::A
        } else if avg >= 80.0 {
            LetterGrade::B
        } else if avg >= 70.0 {
            LetterGrade::C
        } else if avg >= 60.0 {
            LetterGrade::D
        } else {
            LetterGrade::F
        }
    }

    /// Undefined averages stay ungraded; they never become `F`.
    #[must_use]
    pub fn from_average(avg: Option<f64>) -> Option<Self> {
        avg.map(Self::from_percentage)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LetterGrade::A => "A",
            LetterGrade::B => "B",
            LetterGrade::C => "C",
            LetterGrade::D => "D",
            LetterGrade::F => "F",
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[must_use]
pub fn letter_label(grade: Option<LetterGrade>) -> &'static str {
    grade.map_or(NO_GRADE_LABEL, LetterGrade::as_str)
}

//
// ─── MONTH BUCKETS ─────────────────────────────────────────────────────────────
//

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// One calendar month, `month` in `1..=12`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MonthBucket {
    year: i32,
    month: u32,
}

impl MonthBucket {
    /// Returns `None` unless `month` is in `1..=12`.
    #[must_use]
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// The month containing `at`.
    #[must_use]
    pub fn containing(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    #[must_use]
    pub fn year(&self) -> i32 {
        self.year
    }

    #[must_use]
    pub fn month(&self) -> u32 {
        self.month
    }

    /// The following month; December rolls into January of the next year.
    #[must_use]
    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// The month `n` months earlier.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn back(self, n: u32) -> Self {
        let index = i64::from(self.year) * 12 + i64::from(self.month) - 1 - i64::from(n);
        Self {
            year: index.div_euclid(12) as i32,
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    /// Midnight UTC on the first day of the month.
    ///
    /// `None` only for years outside chrono's representable range.
    #[must_use]
    pub fn start(&self) -> Option<DateTime<Utc>> {
        Utc.with_ymd_and_hms(self.year, self.month, 1, 0, 0, 0)
            .single()
    }

    /// English month name, e.g. `"March"`.
    #[must_use]
    pub fn label(&self) -> &'static str {
        MONTH_NAMES[(self.month - 1) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_half_up_and_guards_zero() {
        assert_eq!(percent(3, 4), 75);
        assert_eq!(percent(1, 8), 13); // 12.5
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(5, 0), 0);
    }

    #[test]
    fn normalized_percentage_uses_default_total() {
        assert_eq!(normalized_percentage(75, None), 75.0);
        assert_eq!(normalized_percentage(15, Some(20)), 75.0);
        assert_eq!(normalized_percentage(1, Some(3)), 33.3);
    }

    #[test]
    fn mean_distinguishes_no_data_from_zero() {
        assert_eq!(mean(&[]), None);
        assert_eq!(mean(&[0.0, 0.0]), Some(0.0));
        assert_eq!(average_percentage([(80, None), (45, None)]), Some(62.5));
    }

    #[test]
    fn letter_grade_cut_offs() {
        assert_eq!(LetterGrade::from_percentage(90.0), LetterGrade::A);
        assert_eq!(LetterGrade::from_percentage(89.9), LetterGrade::B);
        assert_eq!(LetterGrade::from_percentage(70.0), LetterGrade::C);
        assert_eq!(LetterGrade::from_percentage(62.5), LetterGrade::D);
        assert_eq!(LetterGrade::from_percentage(59.9), LetterGrade::F);
        assert_eq!(letter_label(LetterGrade::from_average(None)), "—");
    }

    #[test]
    fn month_bucket_wraps_december() {
        let oct = MonthBucket::new(2024, 10).unwrap();
        let months: Vec<(i32, u32)> = std::iter::successors(Some(oct), |m| Some(m.next()))
            .take(5)
            .map(|m| (m.year(), m.month()))
            .collect();
        assert_eq!(
            months,
            vec![(2024, 10), (2024, 11), (2024, 12), (2025, 1), (2025, 2)]
        );
    }

    #[test]
    fn month_bucket_back_crosses_year() {
        let feb = MonthBucket::new(2025, 2).unwrap();
        assert_eq!(feb.back(4), MonthBucket::new(2024, 10).unwrap());
        assert_eq!(feb.back(0), feb);
        assert_eq!(feb.label(), "February");
    }

    #[test]
    fn month_bucket_start_is_first_midnight() {
        let m = MonthBucket::new(2024, 3).unwrap();
        assert_eq!(m.start().unwrap().to_rfc3339(), "2024-03-01T00:00:00+00:00");
        assert!(MonthBucket::new(2024, 13).is_none());
    }
}
