//! Domain records shared by the store, the sequencer and the rewards engine:
//! lessons, per-user progress, the profile aggregate and league entries.
//!
//! Rows coming in from configuration or the snapshot file pass through
//! `validate()` before they reach the store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreError;

/// Default pass mark for lessons that do not author one.
pub const DEFAULT_PASS_THRESHOLD: u8 = 70;

/// Coarse course level a lesson belongs to.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CourseTier {
  #[default]
  Beginner,
  Intermediate,
  Advanced,
}

/// Position of a lesson in the course. Lessons are ordered by module, then day,
/// then their index within the day.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub struct SequenceKey {
  pub module_id: u32,
  pub day_number: u32,
  pub order_index: u32,
}

/// Immutable lesson content record.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
  pub id: String,
  /// Display number such as "1.2".
  #[serde(default)] pub code: String,
  pub title: String,
  #[serde(flatten)]
  pub sequence: SequenceKey,
  #[serde(default)] pub level: CourseTier,
  #[serde(default = "default_pass_threshold")]
  pub pass_threshold: u8,
  #[serde(default)] pub xp_reward: Option<u32>,
  #[serde(default)] pub coin_reward: Option<u32>,
  #[serde(default)] pub is_locked: bool,
  #[serde(default)] pub unlock_requirement: Option<String>,
  #[serde(default)] pub estimated_minutes: Option<u32>,
}

fn default_pass_threshold() -> u8 { DEFAULT_PASS_THRESHOLD }

impl Lesson {
  pub fn validate(&self) -> Result<(), StoreError> {
    if self.id.trim().is_empty() {
      return Err(StoreError::invalid("lessons", "empty lesson id"));
    }
    if self.pass_threshold > 100 {
      return Err(StoreError::invalid(
        "lessons",
        format!("lesson {} has pass threshold {} above 100", self.id, self.pass_threshold),
      ));
    }
    Ok(())
  }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
  #[default]
  NotStarted,
  InProgress,
  Completed,
  Mastered,
}

impl ProgressStatus {
  pub fn is_completed(self) -> bool {
    matches!(self, ProgressStatus::Completed | ProgressStatus::Mastered)
  }

  fn rank(self) -> u8 {
    match self {
      ProgressStatus::NotStarted => 0,
      ProgressStatus::InProgress => 1,
      ProgressStatus::Completed => 2,
      ProgressStatus::Mastered => 3,
    }
  }

  /// The stronger of two statuses. Progress never moves backwards.
  pub fn max(self, other: ProgressStatus) -> ProgressStatus {
    if other.rank() > self.rank() { other } else { self }
  }
}

/// One row per user and lesson.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
  pub id: Uuid,
  pub lesson_id: String,
  pub status: ProgressStatus,
  pub score: Option<u8>,
  pub attempts: u32,
  pub time_spent_seconds: u32,
  pub last_accessed: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
}

impl ProgressRecord {
  pub fn validate(&self) -> Result<(), StoreError> {
    if self.lesson_id.trim().is_empty() {
      return Err(StoreError::invalid("user_lesson_progress", "empty lesson id"));
    }
    if matches!(self.score, Some(s) if s > 100) {
      return Err(StoreError::invalid(
        "user_lesson_progress",
        format!("score above 100 for lesson {}", self.lesson_id),
      ));
    }
    Ok(())
  }
}

/// Write request against a progress row (`upsertProgress`).
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressUpdate {
  pub lesson_id: String,
  pub status: ProgressStatus,
  pub score: Option<u8>,
  pub time_spent_seconds: Option<u32>,
  /// Whether this write counts as an attempt.
  pub attempt: bool,
}

/// Cumulative per-user totals.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
  pub user_id: String,
  pub xp: u64,
  pub coins: u64,
  pub level: u32,
  pub streak_days: u32,
  pub longest_streak_days: u32,
  pub last_activity_date: Option<NaiveDate>,
  pub lessons_completed: u32,
  pub perfect_scores: u32,
}

impl Profile {
  pub fn new(user_id: impl Into<String>) -> Self {
    Self {
      user_id: user_id.into(),
      xp: 0,
      coins: 0,
      level: 1,
      streak_days: 0,
      longest_streak_days: 0,
      last_activity_date: None,
      lessons_completed: 0,
      perfect_scores: 0,
    }
  }

  pub fn validate(&self) -> Result<(), StoreError> {
    if self.user_id.trim().is_empty() {
      return Err(StoreError::invalid("profiles", "empty user id"));
    }
    if self.level == 0 {
      return Err(StoreError::invalid("profiles", format!("profile {} has level 0", self.user_id)));
    }
    Ok(())
  }

  /// Apply the fields present in `update`.
  pub fn apply(&mut self, update: &ProfileUpdate) {
    if let Some(v) = update.xp { self.xp = v; }
    if let Some(v) = update.coins { self.coins = v; }
    if let Some(v) = update.level { self.level = v; }
    if let Some(v) = update.streak_days { self.streak_days = v; }
    if let Some(v) = update.longest_streak_days { self.longest_streak_days = v; }
    if let Some(v) = update.last_activity_date { self.last_activity_date = v; }
    if let Some(v) = update.lessons_completed { self.lessons_completed = v; }
    if let Some(v) = update.perfect_scores { self.perfect_scores = v; }
  }
}

/// Partial profile write (`updateProfile`). `None` leaves the field alone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
  pub xp: Option<u64>,
  pub coins: Option<u64>,
  pub level: Option<u32>,
  pub streak_days: Option<u32>,
  pub longest_streak_days: Option<u32>,
  pub last_activity_date: Option<Option<NaiveDate>>,
  pub lessons_completed: Option<u32>,
  pub perfect_scores: Option<u32>,
}

impl ProfileUpdate {
  /// An update that puts every field back to `snapshot`.
  pub fn restore(snapshot: &Profile) -> Self {
    Self {
      xp: Some(snapshot.xp),
      coins: Some(snapshot.coins),
      level: Some(snapshot.level),
      streak_days: Some(snapshot.streak_days),
      longest_streak_days: Some(snapshot.longest_streak_days),
      last_activity_date: Some(snapshot.last_activity_date),
      lessons_completed: Some(snapshot.lessons_completed),
      perfect_scores: Some(snapshot.perfect_scores),
    }
  }
}

/// League divisions, lowest first. Everyone joins in Bronze.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Division {
  #[default]
  Bronze,
  Silver,
  Gold,
  Platinum,
  Diamond,
}

impl Division {
  pub const ALL: [Division; 5] =
    [Division::Bronze, Division::Silver, Division::Gold, Division::Platinum, Division::Diamond];

  pub fn next(self) -> Option<Division> {
    Self::ALL.iter().copied().find(|d| *d > self)
  }

  pub fn previous(self) -> Option<Division> {
    Self::ALL.iter().rev().copied().find(|d| *d < self)
  }
}

/// A user's membership in the monthly league.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LeagueEntry {
  pub user_id: String,
  #[serde(default)]
  pub division: Division,
  #[serde(default)]
  pub highest_division: Division,
  pub month_number: i32,
  pub monthly_xp: u64,
  /// Month that was current before the last rollover, and its final XP.
  #[serde(default)]
  pub previous_month_number: i32,
  #[serde(default)]
  pub previous_month_xp: u64,
  #[serde(default)]
  pub total_promotions: u32,
  #[serde(default)]
  pub total_demotions: u32,
  /// Last month closed for this entry and the division it was ranked in.
  #[serde(default)]
  pub settled_month: Option<i32>,
  #[serde(default)]
  pub settled_from: Division,
  pub joined_at: DateTime<Utc>,
}

impl LeagueEntry {
  pub fn new(user_id: impl Into<String>, month_number: i32, joined_at: DateTime<Utc>) -> Self {
    Self {
      user_id: user_id.into(),
      division: Division::Bronze,
      highest_division: Division::Bronze,
      month_number,
      monthly_xp: 0,
      previous_month_number: 0,
      previous_month_xp: 0,
      total_promotions: 0,
      total_demotions: 0,
      settled_month: None,
      settled_from: Division::Bronze,
      joined_at,
    }
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum XpSource {
  LessonComplete,
  PerfectScore,
}

/// One row of the XP ledger, written for every credited reward.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct XpTransaction {
  pub id: Uuid,
  pub user_id: String,
  pub source: XpSource,
  pub lesson_id: Option<String>,
  pub xp: u32,
  pub coins: u32,
  pub created_at: DateTime<Utc>,
}
