//! Progress engine: the request-level operations behind the HTTP surface.
//!
//! Every operation reads what it needs from the store, computes new values
//! with the pure helpers (sequencer, reward schedule, level table, streak,
//! badges, league) and writes them back in order. Nothing is cached between
//! calls; the store is the only source of truth.
//!
//! Completing a lesson writes the profile first and the progress row second.
//! If the progress write fails the profile is put back to the snapshot read at
//! the start of the call; a retry then credits the reward exactly once.

use std::{collections::HashMap, sync::Arc};

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::badges;
use crate::domain::{
  CourseTier, Division, LeagueEntry, Lesson, Profile, ProfileUpdate, ProgressRecord, ProgressStatus, ProgressUpdate,
  XpSource, XpTransaction,
};
use crate::error::ProgressError;
use crate::league::{self, Settlement, Standing};
use crate::levels::{Level, LevelProgress, LevelTable};
use crate::rewards::{Reward, RewardSchedule};
use crate::sequencer::{annotate_with_policy, CourseSummary, LessonView, UnlockPolicy};
use crate::store::ProgressStore;
use crate::streak::next_streak;

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseView {
  pub lessons: Vec<LessonView>,
  pub summary: CourseSummary,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LevelUp {
  pub from: u32,
  pub to: Level,
}

/// Result of a lesson submission, consumed by the UI for toasts and
/// celebrations.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOutcome {
  pub lesson_id: String,
  pub passed: bool,
  pub status: ProgressStatus,
  pub best_score: u8,
  pub xp_awarded: u32,
  pub coins_awarded: u32,
  pub leveled_up: bool,
  pub level_up: Option<LevelUp>,
  pub new_streak: u32,
  pub total_xp: u64,
  pub total_coins: u64,
  pub badges_earned: Vec<String>,
  pub already_completed: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
  #[serde(flatten)]
  pub profile: Profile,
  pub tier: CourseTier,
  pub level_progress: LevelProgress,
  pub badges: Vec<String>,
}

/// Rows returned by the recent XP feed.
pub const RECENT_XP_LIMIT: usize = 10;

/// Outcome of closing a league month.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthClose {
  pub month_number: i32,
  pub settlements: Vec<Settlement>,
}

pub struct ProgressEngine {
  store: Arc<dyn ProgressStore>,
  rewards: RewardSchedule,
  levels: LevelTable,
  policy: UnlockPolicy,
}

impl ProgressEngine {
  pub fn new(store: Arc<dyn ProgressStore>, rewards: RewardSchedule, levels: LevelTable, policy: UnlockPolicy) -> Self {
    Self { store, rewards, levels, policy }
  }

  pub fn store(&self) -> &Arc<dyn ProgressStore> {
    &self.store
  }

  async fn load_course(
    &self,
    user_id: &str,
  ) -> Result<(Vec<Lesson>, HashMap<String, ProgressRecord>, Profile), ProgressError> {
    let profile = self.store.get_profile(user_id).await.map_err(ProgressError::read)?;
    let lessons = self.store.get_lessons().await.map_err(ProgressError::read)?;
    let progress = self.store.get_progress(user_id).await.map_err(ProgressError::read)?;
    Ok((lessons, progress, profile))
  }

  fn annotate(&self, lessons: &[Lesson], progress: &HashMap<String, ProgressRecord>, profile: &Profile) -> Vec<LessonView> {
    annotate_with_policy(lessons, progress, self.policy, CourseTier::from_xp(profile.xp))
  }

  /// Find `lesson_id` in the annotated course and refuse it while locked.
  fn open_lesson(views: Vec<LessonView>, lesson_id: &str) -> Result<LessonView, ProgressError> {
    let view = views
      .into_iter()
      .find(|v| v.lesson.id == lesson_id)
      .ok_or_else(|| ProgressError::UnknownLesson(lesson_id.to_string()))?;
    if view.is_locked {
      return Err(ProgressError::LessonLocked(lesson_id.to_string()));
    }
    Ok(view)
  }

  /// The course annotated with lock/current/completed flags for `user_id`.
  #[instrument(level = "info", skip(self))]
  pub async fn lessons_for(&self, user_id: &str) -> Result<CourseView, ProgressError> {
    let (lessons, progress, profile) = self.load_course(user_id).await?;
    let views = self.annotate(&lessons, &progress, &profile);
    let summary = CourseSummary::of(&views);
    info!(target: "lesson", %user_id, total = summary.total, completed = summary.completed, "Course annotated");
    Ok(CourseView { lessons: views, summary })
  }

  /// Record the first interaction with a lesson.
  #[instrument(level = "info", skip(self))]
  pub async fn start_lesson(&self, user_id: &str, lesson_id: &str) -> Result<ProgressRecord, ProgressError> {
    let (lessons, progress, profile) = self.load_course(user_id).await?;
    let view = Self::open_lesson(self.annotate(&lessons, &progress, &profile), lesson_id)?;
    if let Some(existing) = view.progress.filter(|p| p.status != ProgressStatus::NotStarted) {
      return Ok(existing);
    }
    let update = ProgressUpdate {
      lesson_id: lesson_id.to_string(),
      status: ProgressStatus::InProgress,
      score: None,
      time_spent_seconds: None,
      attempt: false,
    };
    let rec = self.store.upsert_progress(user_id, update).await.map_err(ProgressError::write)?;
    info!(target: "lesson", %user_id, %lesson_id, "Lesson started");
    Ok(rec)
  }

  /// Submit a score for a lesson.
  ///
  /// A score below the lesson's pass threshold only records the attempt. The
  /// first passing score credits XP and coins, recomputes the level, advances
  /// the streak, awards badges and feeds the league. Later passing scores
  /// update the best score but credit nothing.
  #[instrument(level = "info", skip(self))]
  pub async fn complete_lesson(
    &self,
    user_id: &str,
    lesson_id: &str,
    score: u32,
    time_spent_seconds: Option<u32>,
    today: NaiveDate,
  ) -> Result<CompletionOutcome, ProgressError> {
    let score = u8::try_from(score)
      .ok()
      .filter(|s| *s <= 100)
      .ok_or(ProgressError::InvalidScore(score))?;

    let (lessons, progress, profile) = self.load_course(user_id).await?;
    let view = Self::open_lesson(self.annotate(&lessons, &progress, &profile), lesson_id)?;
    let lesson = view.lesson;

    let previous_status = view.progress.as_ref().map(|p| p.status).unwrap_or_default();
    let already_completed = previous_status.is_completed();
    let passed = score >= lesson.pass_threshold;
    let attempted = match (passed, score) {
      (true, 100) => ProgressStatus::Mastered,
      (true, _) => ProgressStatus::Completed,
      (false, _) => ProgressStatus::InProgress,
    };
    let status = previous_status.max(attempted);
    let best_score = view.progress.as_ref().and_then(|p| p.score).map_or(score, |s| s.max(score));
    let update = ProgressUpdate {
      lesson_id: lesson.id.clone(),
      status,
      score: Some(best_score),
      time_spent_seconds,
      attempt: true,
    };

    if !passed || already_completed {
      self.store.upsert_progress(user_id, update).await.map_err(ProgressError::write)?;
      info!(target: "rewards", %user_id, %lesson_id, score, passed, already_completed, "Attempt recorded, no reward");
      return Ok(CompletionOutcome {
        lesson_id: lesson.id,
        passed,
        status,
        best_score,
        xp_awarded: 0,
        coins_awarded: 0,
        leveled_up: false,
        level_up: None,
        new_streak: profile.streak_days,
        total_xp: profile.xp,
        total_coins: profile.coins,
        badges_earned: vec![],
        already_completed,
      });
    }

    let reward = self.rewards.for_lesson(&lesson, score);
    let total_xp = profile.xp + u64::from(reward.xp);
    let total_coins = profile.coins + u64::from(reward.coins);
    let reached = self.levels.level_for_xp(total_xp);
    let level_up = (reached.level > profile.level).then(|| LevelUp { from: profile.level, to: reached.clone() });
    let new_streak = next_streak(profile.streak_days, profile.last_activity_date, today);

    let fields = ProfileUpdate {
      xp: Some(total_xp),
      coins: Some(total_coins),
      level: Some(profile.level.max(reached.level)),
      streak_days: Some(new_streak),
      longest_streak_days: Some(profile.longest_streak_days.max(new_streak)),
      last_activity_date: Some(Some(today)),
      lessons_completed: Some(profile.lessons_completed + 1),
      perfect_scores: (score == 100).then_some(profile.perfect_scores + 1),
    };
    self.store.update_profile(user_id, fields).await.map_err(ProgressError::write)?;

    if let Err(e) = self.store.upsert_progress(user_id, update).await {
      error!(target: "rewards", %user_id, %lesson_id, error = %e, "Progress write failed; restoring profile");
      if let Err(restore_err) = self.store.update_profile(user_id, ProfileUpdate::restore(&profile)).await {
        error!(target: "rewards", %user_id, %lesson_id, error = %restore_err, "Profile restore failed; re-read profile before retrying");
      }
      return Err(ProgressError::write(e));
    }

    let badges_earned = self.award_badges(user_id, total_xp).await;
    self.feed_league(user_id, u64::from(reward.xp), today).await;
    let source = if score == 100 { XpSource::PerfectScore } else { XpSource::LessonComplete };
    self.record_xp(user_id, &lesson.id, source, reward).await;

    if let Some(up) = &level_up {
      info!(target: "rewards", %user_id, from = up.from, to = up.to.level, title = %up.to.title, "Level up");
    }
    info!(
      target: "rewards",
      %user_id, %lesson_id, score, xp = reward.xp, coins = reward.coins, total_xp, streak = new_streak,
      "Lesson completed"
    );

    Ok(CompletionOutcome {
      lesson_id: lesson.id,
      passed,
      status,
      best_score,
      xp_awarded: reward.xp,
      coins_awarded: reward.coins,
      leveled_up: level_up.is_some(),
      level_up,
      new_streak,
      total_xp,
      total_coins,
      badges_earned,
      already_completed,
    })
  }

  /// Badges are a side channel: a failure is logged and the reward stands.
  async fn award_badges(&self, user_id: &str, total_xp: u64) -> Vec<String> {
    let owned = match self.store.get_badges(user_id).await {
      Ok(owned) => owned,
      Err(e) => {
        warn!(target: "rewards", %user_id, error = %e, "Could not read badges");
        return vec![];
      }
    };
    let mut earned = vec![];
    for badge in badges::newly_earned(total_xp, &owned) {
      match self.store.add_badge(user_id, badge.id).await {
        Ok(()) => {
          info!(target: "rewards", %user_id, badge = badge.id, "Badge earned");
          earned.push(badge.id.to_string());
        }
        Err(e) => warn!(target: "rewards", %user_id, badge = badge.id, error = %e, "Could not record badge"),
      }
    }
    earned
  }

  async fn feed_league(&self, user_id: &str, xp: u64, today: NaiveDate) {
    let mut entry = match self.store.get_league_entry(user_id).await {
      Ok(Some(entry)) => entry,
      Ok(None) => return,
      Err(e) => {
        warn!(target: "rewards", %user_id, error = %e, "Could not read league entry");
        return;
      }
    };
    league::accrue(&mut entry, xp, today);
    if let Err(e) = self.store.put_league_entry(entry).await {
      warn!(target: "rewards", %user_id, error = %e, "Could not update league XP");
    }
  }

  /// Ledger rows are a side channel like badges.
  async fn record_xp(&self, user_id: &str, lesson_id: &str, source: XpSource, reward: Reward) {
    let tx = XpTransaction {
      id: Uuid::new_v4(),
      user_id: user_id.to_string(),
      source,
      lesson_id: Some(lesson_id.to_string()),
      xp: reward.xp,
      coins: reward.coins,
      created_at: Utc::now(),
    };
    if let Err(e) = self.store.add_xp_transaction(tx).await {
      warn!(target: "rewards", %user_id, %lesson_id, error = %e, "Could not record XP transaction");
    }
  }

  /// Most recent XP awards for `user_id`, newest first.
  #[instrument(level = "info", skip(self))]
  pub async fn recent_xp(&self, user_id: &str) -> Result<Vec<XpTransaction>, ProgressError> {
    self.store.get_profile(user_id).await.map_err(ProgressError::read)?;
    self.store.recent_xp_transactions(user_id, RECENT_XP_LIMIT).await.map_err(ProgressError::read)
  }

  #[instrument(level = "info", skip(self))]
  pub async fn create_profile(&self, user_id: &str) -> Result<Profile, ProgressError> {
    let profile = self.store.create_profile(user_id).await.map_err(ProgressError::write)?;
    info!(target: "finelo_backend", %user_id, "Profile created");
    Ok(profile)
  }

  #[instrument(level = "info", skip(self))]
  pub async fn profile_for(&self, user_id: &str) -> Result<ProfileView, ProgressError> {
    let profile = self.store.get_profile(user_id).await.map_err(ProgressError::read)?;
    let badges = self.store.get_badges(user_id).await.map_err(ProgressError::read)?;
    Ok(ProfileView {
      tier: CourseTier::from_xp(profile.xp),
      level_progress: self.levels.progress(profile.xp),
      badges,
      profile,
    })
  }

  /// Join the monthly league. Joining twice returns the existing entry.
  #[instrument(level = "info", skip(self))]
  pub async fn join_league(&self, user_id: &str, today: NaiveDate) -> Result<LeagueEntry, ProgressError> {
    self.store.get_profile(user_id).await.map_err(ProgressError::read)?;
    if let Some(existing) = self.store.get_league_entry(user_id).await.map_err(ProgressError::read)? {
      return Ok(existing);
    }
    let entry = LeagueEntry::new(user_id, league::month_number(today), Utc::now());
    self.store.put_league_entry(entry.clone()).await.map_err(ProgressError::write)?;
    info!(target: "finelo_backend", %user_id, month = entry.month_number, division = ?entry.division, "Joined league");
    Ok(entry)
  }

  pub async fn league_entry(&self, user_id: &str) -> Result<Option<LeagueEntry>, ProgressError> {
    self.store.get_league_entry(user_id).await.map_err(ProgressError::read)
  }

  /// Current-month table for one division.
  #[instrument(level = "info", skip(self))]
  pub async fn league_standings(&self, division: Division, today: NaiveDate) -> Result<Vec<Standing>, ProgressError> {
    let entries = self.store.league_entries().await.map_err(ProgressError::read)?;
    Ok(league::standings(&entries, division, league::month_number(today)))
  }

  /// Close the month before `today`: promote and demote members and persist
  /// every entry that moved. Safe to call again after a partial failure.
  #[instrument(level = "info", skip(self))]
  pub async fn close_month(&self, today: NaiveDate) -> Result<MonthClose, ProgressError> {
    let month = league::month_number(today) - 1;
    let before = self.store.league_entries().await.map_err(ProgressError::read)?;
    let mut entries = before.clone();
    let settlements = league::settle_month(&mut entries, month);
    let changed: Vec<LeagueEntry> = entries
      .into_iter()
      .zip(before)
      .filter(|(after, before)| after != before)
      .map(|(after, _)| after)
      .collect();
    let moved = changed.len();
    for entry in changed {
      self.store.put_league_entry(entry).await.map_err(ProgressError::write)?;
    }
    let promoted = settlements.iter().filter(|s| s.outcome == league::MonthOutcome::Promoted).count();
    let demoted = settlements.iter().filter(|s| s.outcome == league::MonthOutcome::Demoted).count();
    info!(target: "finelo_backend", month, ranked = settlements.len(), moved, promoted, demoted, "League month closed");
    Ok(MonthClose { month_number: month, settlements })
  }
}
