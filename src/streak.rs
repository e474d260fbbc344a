//! Daily streak calculation.

use chrono::{Days, NaiveDate};

/// New streak length for activity on `today`.
///
/// Same-day activity leaves the streak alone, activity the day after the last
/// one extends it, anything else (a gap, no history, or a last date after
/// `today`) starts over at 1.
pub fn next_streak(streak: u32, last_activity: Option<NaiveDate>, today: NaiveDate) -> u32 {
  let Some(last) = last_activity else { return 1 };
  if last == today {
    return streak;
  }
  match today.checked_sub_days(Days::new(1)) {
    Some(yesterday) if last == yesterday => streak.saturating_add(1),
    _ => 1,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  #[test]
  fn same_day_is_unchanged() {
    assert_eq!(next_streak(4, Some(d(2024, 3, 10)), d(2024, 3, 10)), 4);
  }

  #[test]
  fn yesterday_extends() {
    assert_eq!(next_streak(4, Some(d(2024, 3, 9)), d(2024, 3, 10)), 5);
    assert_eq!(next_streak(1, Some(d(2023, 12, 31)), d(2024, 1, 1)), 2);
  }

  #[test]
  fn gap_or_no_history_resets() {
    assert_eq!(next_streak(7, Some(d(2024, 3, 7)), d(2024, 3, 10)), 1);
    assert_eq!(next_streak(0, None, d(2024, 3, 10)), 1);
    assert_eq!(next_streak(3, Some(d(2024, 3, 12)), d(2024, 3, 10)), 1);
  }
}
