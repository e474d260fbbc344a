//! Reward schedule: how much XP and how many coins an action is worth.

use serde::{Deserialize, Serialize};

use crate::domain::Lesson;

/// Actions that pay out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RewardAction {
  /// First successful completion of a lesson.
  LessonComplete,
  /// Bonus on top of `LessonComplete` for a score of 100.
  PerfectScore,
}

#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
  pub xp: u32,
  pub coins: u32,
}

impl std::ops::Add for Reward {
  type Output = Reward;
  fn add(self, rhs: Reward) -> Reward {
    Reward { xp: self.xp.saturating_add(rhs.xp), coins: self.coins.saturating_add(rhs.coins) }
  }
}

/// Base amounts per action. Lessons may override the completion amount.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct RewardSchedule {
  #[serde(default = "d_lesson_xp")] pub lesson_xp: u32,
  #[serde(default = "d_lesson_coins")] pub lesson_coins: u32,
  #[serde(default = "d_perfect_xp")] pub perfect_bonus_xp: u32,
  #[serde(default = "d_perfect_coins")] pub perfect_bonus_coins: u32,
}

fn d_lesson_xp() -> u32 { 10 }
fn d_lesson_coins() -> u32 { 5 }
fn d_perfect_xp() -> u32 { 10 }
fn d_perfect_coins() -> u32 { 5 }

impl Default for RewardSchedule {
  fn default() -> Self {
    Self {
      lesson_xp: d_lesson_xp(),
      lesson_coins: d_lesson_coins(),
      perfect_bonus_xp: d_perfect_xp(),
      perfect_bonus_coins: d_perfect_coins(),
    }
  }
}

impl RewardSchedule {
  pub fn base(&self, action: RewardAction) -> Reward {
    match action {
      RewardAction::LessonComplete => Reward { xp: self.lesson_xp, coins: self.lesson_coins },
      RewardAction::PerfectScore => Reward { xp: self.perfect_bonus_xp, coins: self.perfect_bonus_coins },
    }
  }

  /// Payout for passing `lesson` with `score`. A missing or zero authored
  /// reward falls back to the schedule's completion amount.
  pub fn for_lesson(&self, lesson: &Lesson, score: u8) -> Reward {
    let base = self.base(RewardAction::LessonComplete);
    let mut reward = Reward {
      xp: lesson.xp_reward.filter(|v| *v > 0).unwrap_or(base.xp),
      coins: lesson.coin_reward.filter(|v| *v > 0).unwrap_or(base.coins),
    };
    if score == 100 {
      reward = reward + self.base(RewardAction::PerfectScore);
    }
    reward
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{CourseTier, SequenceKey};

  fn lesson(xp: Option<u32>, coins: Option<u32>) -> Lesson {
    Lesson {
      id: "l1".into(),
      code: "1.1".into(),
      title: "Intro".into(),
      sequence: SequenceKey::default(),
      level: CourseTier::Beginner,
      pass_threshold: 70,
      xp_reward: xp,
      coin_reward: coins,
      is_locked: false,
      unlock_requirement: None,
      estimated_minutes: None,
    }
  }

  #[test]
  fn perfect_score_adds_bonus() {
    let s = RewardSchedule::default();
    assert_eq!(s.for_lesson(&lesson(Some(10), Some(5)), 100), Reward { xp: 20, coins: 10 });
    assert_eq!(s.for_lesson(&lesson(Some(10), Some(5)), 99), Reward { xp: 10, coins: 5 });
  }

  #[test]
  fn missing_rewards_fall_back_to_schedule() {
    let s = RewardSchedule { lesson_xp: 12, lesson_coins: 3, ..Default::default() };
    assert_eq!(s.for_lesson(&lesson(None, Some(0)), 80), Reward { xp: 12, coins: 3 });
    assert_eq!(s.for_lesson(&lesson(Some(20), None), 80), Reward { xp: 20, coins: 3 });
  }

  #[test]
  fn oversized_configured_reward_saturates() {
    let s = RewardSchedule::default();
    assert_eq!(s.for_lesson(&lesson(Some(u32::MAX), Some(u32::MAX - 1)), 100), Reward { xp: u32::MAX, coins: u32::MAX });
  }
}
