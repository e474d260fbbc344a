//! Monthly league: period numbering, XP accrual, per-division standings and
//! the month-end promotion/demotion step.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::domain::{Division, LeagueEntry};

/// Members shown per division table.
pub const LEAGUE_SIZE: usize = 30;
/// Ranks `1..=PROMOTION_ZONE` move up a division at month end.
pub const PROMOTION_ZONE: usize = 10;
/// The last `DEMOTION_ZONE` ranks of a full table move down.
pub const DEMOTION_ZONE: usize = 5;

/// Months since year 0, so consecutive months differ by one.
pub fn month_number(date: NaiveDate) -> i32 {
  date.year() * 12 + date.month0() as i32
}

/// Add `xp` earned on `today` to `entry`. A new month starts from zero and
/// the closed month's total is kept for settlement.
pub fn accrue(entry: &mut LeagueEntry, xp: u64, today: NaiveDate) {
  let month = month_number(today);
  if entry.month_number != month {
    entry.previous_month_number = entry.month_number;
    entry.previous_month_xp = entry.monthly_xp;
    entry.month_number = month;
    entry.monthly_xp = 0;
  }
  entry.monthly_xp = entry.monthly_xp.saturating_add(xp);
}

/// XP `entry` earned during `month`.
pub fn xp_in(entry: &LeagueEntry, month: i32) -> u64 {
  if entry.month_number == month {
    entry.monthly_xp
  } else if entry.previous_month_number == month {
    entry.previous_month_xp
  } else {
    0
  }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
  pub rank: usize,
  pub user_id: String,
  pub division: Division,
  pub monthly_xp: u64,
}

/// Rank one division's members by XP for `month`, highest first, ties by
/// user id.
fn ranked<'a>(entries: impl Iterator<Item = &'a LeagueEntry>, month: i32) -> Vec<(usize, &'a LeagueEntry, u64)> {
  let mut rows: Vec<(&LeagueEntry, u64)> = entries.map(|e| (e, xp_in(e, month))).collect();
  rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.user_id.cmp(&b.0.user_id)));
  rows.into_iter().enumerate().map(|(i, (e, xp))| (i + 1, e, xp)).collect()
}

/// Top `LEAGUE_SIZE` members of `division` for `month`.
pub fn standings(entries: &[LeagueEntry], division: Division, month: i32) -> Vec<Standing> {
  ranked(entries.iter().filter(|e| e.division == division), month)
    .into_iter()
    .take(LEAGUE_SIZE)
    .map(|(rank, e, monthly_xp)| Standing { rank, user_id: e.user_id.clone(), division, monthly_xp })
    .collect()
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MonthOutcome {
  Promoted,
  Demoted,
  Stayed,
}

/// Final placement of one member for a closed month.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
  pub user_id: String,
  pub rank: usize,
  pub monthly_xp: u64,
  pub from: Division,
  pub to: Division,
  pub outcome: MonthOutcome,
}

fn outcome_for(rank: usize, xp: u64, division: Division) -> (MonthOutcome, Division) {
  match (division.next(), division.previous()) {
    (Some(up), _) if rank <= PROMOTION_ZONE && xp > 0 => (MonthOutcome::Promoted, up),
    (_, Some(down)) if rank > LEAGUE_SIZE - DEMOTION_ZONE => (MonthOutcome::Demoted, down),
    _ => (MonthOutcome::Stayed, division),
  }
}

/// Whether `entry` was in the league during `month`. Only a rollover sets
/// `previous_month_number`, so an entry joined later has neither month at or
/// before `month`.
fn member_during(entry: &LeagueEntry, month: i32) -> bool {
  entry.month_number <= month || (entry.previous_month_number > 0 && entry.previous_month_number <= month)
}

/// Division `entry` was ranked in during `month`.
fn division_during(entry: &LeagueEntry, month: i32) -> Division {
  if entry.settled_month == Some(month) { entry.settled_from } else { entry.division }
}

/// Close `month`: rank every division on that month's XP and move members
/// into their new divisions. Members who joined after `month`, or whose
/// entry already closed a later month, are skipped. Closing the same month
/// again reports the same placements and changes nothing.
pub fn settle_month(entries: &mut [LeagueEntry], month: i32) -> Vec<Settlement> {
  let mut settlements = vec![];
  for division in Division::ALL {
    let eligible = entries.iter().filter(|e| {
      member_during(e, month)
        && e.settled_month.map_or(true, |s| s <= month)
        && division_during(e, month) == division
    });
    for (rank, e, monthly_xp) in ranked(eligible, month) {
      let (outcome, to) = outcome_for(rank, monthly_xp, division);
      settlements.push(Settlement { user_id: e.user_id.clone(), rank, monthly_xp, from: division, to, outcome });
    }
  }

  for s in &settlements {
    let Some(entry) = entries.iter_mut().find(|e| e.user_id == s.user_id) else { continue };
    if entry.settled_month == Some(month) {
      continue;
    }
    entry.settled_month = Some(month);
    entry.settled_from = s.from;
    entry.division = s.to;
    entry.highest_division = entry.highest_division.max(s.to);
    match s.outcome {
      MonthOutcome::Promoted => entry.total_promotions += 1,
      MonthOutcome::Demoted => entry.total_demotions += 1,
      MonthOutcome::Stayed => {}
    }
  }
  settlements
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{TimeZone, Utc};

  fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
  }

  fn entry(user: &str, month: i32, xp: u64) -> LeagueEntry {
    let joined = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut e = LeagueEntry::new(user, month, joined);
    e.monthly_xp = xp;
    e
  }

  fn in_division(mut e: LeagueEntry, division: Division) -> LeagueEntry {
    e.division = division;
    e.highest_division = division;
    e
  }

  #[test]
  fn months_are_consecutive_across_years() {
    assert_eq!(month_number(d(2024, 1, 1)) - month_number(d(2023, 12, 31)), 1);
  }

  #[test]
  fn accrue_rolls_over_on_new_month() {
    let march = month_number(d(2024, 3, 1));
    let mut e = entry("u1", march, 40);
    accrue(&mut e, 10, d(2024, 3, 20));
    assert_eq!(e.monthly_xp, 50);
    accrue(&mut e, 15, d(2024, 4, 2));
    assert_eq!(e.monthly_xp, 15);
    assert_eq!(e.month_number, march + 1);
    assert_eq!(xp_in(&e, march), 50);
    assert_eq!(xp_in(&e, march - 1), 0);
  }

  #[test]
  fn standings_rank_by_xp_then_id() {
    let m = month_number(d(2024, 3, 1));
    let rows = standings(
      &[entry("b", m, 30), entry("a", m, 30), entry("c", m, 90), entry("z", m - 1, 500)],
      Division::Bronze,
      m,
    );
    let order: Vec<_> = rows.iter().map(|r| (r.rank, r.user_id.as_str(), r.monthly_xp)).collect();
    assert_eq!(order, vec![(1, "c", 90), (2, "a", 30), (3, "b", 30), (4, "z", 0)]);
  }

  #[test]
  fn standings_only_include_the_requested_division() {
    let m = month_number(d(2024, 3, 1));
    let entries = [entry("a", m, 10), in_division(entry("b", m, 99), Division::Gold)];
    let bronze: Vec<_> = standings(&entries, Division::Bronze, m).into_iter().map(|s| s.user_id).collect();
    assert_eq!(bronze, vec!["a"]);
    let gold = standings(&entries, Division::Gold, m);
    assert_eq!((gold[0].rank, gold[0].division), (1, Division::Gold));
  }

  #[test]
  fn standings_are_capped_at_league_size() {
    let m = month_number(d(2024, 3, 1));
    let entries: Vec<_> = (0..40).map(|i| entry(&format!("u{i:02}"), m, i)).collect();
    assert_eq!(standings(&entries, Division::Bronze, m).len(), LEAGUE_SIZE);
  }

  #[test]
  fn month_end_promotes_top_zone_and_demotes_bottom_of_full_table() {
    let m = month_number(d(2024, 3, 1));
    let mut entries: Vec<_> = (0..LEAGUE_SIZE as u64)
      .map(|i| in_division(entry(&format!("s{i:02}"), m, 100 - i), Division::Silver))
      .collect();
    entries.push(entry("bronze-top", m, 5));
    entries.push(entry("bronze-idle", m, 0));
    entries.push(in_division(entry("diamond", m, 900), Division::Diamond));

    let settled = settle_month(&mut entries, m);
    let by_user = |id: &str| settled.iter().find(|s| s.user_id == id).unwrap().clone();

    let first = by_user("s00");
    assert_eq!((first.rank, first.outcome, first.to), (1, MonthOutcome::Promoted, Division::Gold));
    assert_eq!(by_user("s09").outcome, MonthOutcome::Promoted);
    assert_eq!(by_user("s10").outcome, MonthOutcome::Stayed);
    assert_eq!(by_user("s24").outcome, MonthOutcome::Stayed);
    let last = by_user("s29");
    assert_eq!((last.rank, last.outcome, last.to), (30, MonthOutcome::Demoted, Division::Bronze));

    assert_eq!(by_user("bronze-top").to, Division::Silver);
    assert_eq!(by_user("bronze-idle").outcome, MonthOutcome::Stayed);
    assert_eq!(by_user("diamond").outcome, MonthOutcome::Stayed);

    let s00 = entries.iter().find(|e| e.user_id == "s00").unwrap();
    assert_eq!((s00.division, s00.highest_division, s00.total_promotions), (Division::Gold, Division::Gold, 1));
    let s29 = entries.iter().find(|e| e.user_id == "s29").unwrap();
    assert_eq!((s29.division, s29.highest_division, s29.total_demotions), (Division::Bronze, Division::Silver, 1));
  }

  #[test]
  fn settlement_uses_the_closed_month_after_rollover() {
    let march = month_number(d(2024, 3, 1));
    let mut early = entry("early", march, 10);
    accrue(&mut early, 5, d(2024, 4, 1));
    let mut entries = vec![early, entry("late", march, 12)];
    let settled = settle_month(&mut entries, march);
    assert_eq!(settled[0].user_id, "late");
    assert_eq!((settled[1].user_id.as_str(), settled[1].monthly_xp), ("early", 10));
  }

  #[test]
  fn members_who_joined_later_are_not_settled() {
    let march = month_number(d(2024, 3, 1));
    let mut entries = vec![entry("new", march + 1, 0), entry("old", march, 7)];
    let settled = settle_month(&mut entries, march);
    assert_eq!(settled.len(), 1);
    assert_eq!(settled[0].user_id, "old");
  }

  #[test]
  fn closing_a_month_twice_changes_nothing() {
    let m = month_number(d(2024, 3, 1));
    let mut entries = vec![entry("a", m, 50), entry("b", m, 20)];
    let first = settle_month(&mut entries, m);
    let after_first = entries.clone();
    let second = settle_month(&mut entries, m);
    assert_eq!(first, second);
    assert_eq!(entries, after_first);
    assert_eq!(entries[0].division, Division::Silver);
    assert_eq!(entries[0].total_promotions, 1);
  }
}
