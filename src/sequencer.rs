//! Lesson sequencing: which lessons are locked, which one is current and
//! which are done, derived from the ordered course and a user's progress.
//!
//! Two unlock policies exist. Exactly one is active for a deployment:
//!   - `Sequential` (default): a lesson opens once the one before it is
//!     completed or mastered.
//!   - `LevelThreshold`: lessons open per course tier, once enough lessons of
//!     the previous tier are completed or the profile's tier is high enough.
//!
//! The first lesson is open under both.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::{CourseTier, Lesson, ProgressRecord};

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum UnlockPolicy {
  #[default]
  Sequential,
  LevelThreshold {
    #[serde(default = "default_unlock_after")]
    unlock_after: usize,
  },
}

fn default_unlock_after() -> usize { 3 }

/// A lesson with its derived flags and the caller's progress row, if any.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonView {
  #[serde(flatten)]
  pub lesson: Lesson,
  pub progress: Option<ProgressRecord>,
  pub is_completed: bool,
  pub is_locked: bool,
  pub is_current: bool,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
  pub completed: usize,
  pub total: usize,
  pub percent: u32,
}

fn completed(progress: &HashMap<String, ProgressRecord>, lesson: &Lesson) -> bool {
  progress.get(&lesson.id).is_some_and(|p| p.status.is_completed())
}

/// Annotate `lessons` under the sequential policy.
pub fn annotate_lessons(lessons: &[Lesson], progress: &HashMap<String, ProgressRecord>) -> Vec<LessonView> {
  annotate_with_policy(lessons, progress, UnlockPolicy::Sequential, CourseTier::Beginner)
}

/// Annotate `lessons` under `policy`. `tier` is the caller's coarse level and
/// only matters for `LevelThreshold`.
pub fn annotate_with_policy(
  lessons: &[Lesson],
  progress: &HashMap<String, ProgressRecord>,
  policy: UnlockPolicy,
  tier: CourseTier,
) -> Vec<LessonView> {
  let done: Vec<bool> = lessons.iter().map(|l| completed(progress, l)).collect();

  let locked: Vec<bool> = match policy {
    UnlockPolicy::Sequential => (0..lessons.len()).map(|i| i > 0 && !done[i - 1]).collect(),
    UnlockPolicy::LevelThreshold { unlock_after } => {
      let count = |t: CourseTier| {
        lessons.iter().zip(&done).filter(|(l, d)| l.level == t && **d).count()
      };
      let intermediate_open = count(CourseTier::Beginner) >= unlock_after || tier > CourseTier::Beginner;
      let advanced_open =
        (count(CourseTier::Intermediate) >= unlock_after && intermediate_open) || tier == CourseTier::Advanced;
      lessons
        .iter()
        .enumerate()
        .map(|(i, l)| {
          i > 0
            && match l.level {
              CourseTier::Beginner => false,
              CourseTier::Intermediate => !intermediate_open,
              CourseTier::Advanced => !advanced_open,
            }
        })
        .collect()
    }
  };

  let current = (0..lessons.len()).find(|&i| !locked[i] && !done[i]);

  lessons
    .iter()
    .enumerate()
    .map(|(i, lesson)| LessonView {
      lesson: lesson.clone(),
      progress: progress.get(&lesson.id).cloned(),
      is_completed: done[i],
      is_locked: locked[i],
      is_current: current == Some(i),
    })
    .collect()
}

impl CourseSummary {
  pub fn of(views: &[LessonView]) -> Self {
    let total = views.len();
    let completed = views.iter().filter(|v| v.is_completed).count();
    let percent = if total == 0 { 0 } else { ((completed as f64 / total as f64) * 100.0).round() as u32 };
    Self { completed, total, percent }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{ProgressStatus, SequenceKey};
  use chrono::Utc;

  fn lesson(id: &str, idx: u32, level: CourseTier) -> Lesson {
    Lesson {
      id: id.into(),
      code: String::new(),
      title: id.to_uppercase(),
      sequence: SequenceKey { module_id: 1, day_number: 1, order_index: idx },
      level,
      pass_threshold: 70,
      xp_reward: Some(10),
      coin_reward: Some(5),
      is_locked: idx > 0,
      unlock_requirement: None,
      estimated_minutes: None,
    }
  }

  fn course(n: u32) -> Vec<Lesson> {
    (0..n).map(|i| lesson(&format!("l{}", i + 1), i, CourseTier::Beginner)).collect()
  }

  fn record(lesson_id: &str, status: ProgressStatus) -> ProgressRecord {
    ProgressRecord {
      id: uuid::Uuid::new_v4(),
      lesson_id: lesson_id.into(),
      status,
      score: None,
      attempts: 1,
      time_spent_seconds: 0,
      last_accessed: Utc::now(),
      completed_at: None,
    }
  }

  fn progress(rows: &[(&str, ProgressStatus)]) -> HashMap<String, ProgressRecord> {
    rows.iter().map(|(id, s)| (id.to_string(), record(id, *s))).collect()
  }

  #[test]
  fn empty_course_yields_empty_list() {
    assert!(annotate_lessons(&[], &HashMap::new()).is_empty());
  }

  #[test]
  fn fresh_user_has_only_first_lesson_open() {
    let views = annotate_lessons(&course(3), &HashMap::new());
    assert!(!views[0].is_locked);
    assert!(views[0].is_current);
    assert!(views[1].is_locked && views[2].is_locked);
    assert!(views.iter().all(|v| !v.is_completed));
  }

  #[test]
  fn completing_a_lesson_opens_the_next() {
    let views = annotate_lessons(&course(3), &progress(&[("l1", ProgressStatus::Mastered)]));
    assert!(views[0].is_completed && !views[0].is_current);
    assert!(!views[1].is_locked && views[1].is_current);
    assert!(views[2].is_locked);
  }

  #[test]
  fn in_progress_does_not_unlock() {
    let views = annotate_lessons(&course(2), &progress(&[("l1", ProgressStatus::InProgress)]));
    assert!(views[0].is_current);
    assert!(views[1].is_locked);
  }

  #[test]
  fn locked_whenever_predecessor_incomplete() {
    // l2 completed out of order must not unlock l3 past an incomplete l1.
    let p = progress(&[("l2", ProgressStatus::Completed), ("l4", ProgressStatus::Completed)]);
    let views = annotate_lessons(&course(5), &p);
    assert!(!views[0].is_locked);
    for i in 1..views.len() {
      if !views[i - 1].is_completed {
        assert!(views[i].is_locked, "lesson {i} should be locked");
      }
    }
    assert_eq!(views.iter().filter(|v| v.is_current).count(), 1);
    assert!(views[0].is_current);
  }

  #[test]
  fn all_done_has_no_current() {
    let p = progress(&[("l1", ProgressStatus::Completed), ("l2", ProgressStatus::Completed)]);
    let views = annotate_lessons(&course(2), &p);
    assert!(views.iter().all(|v| !v.is_current && !v.is_locked));
    assert_eq!(CourseSummary::of(&views), CourseSummary { completed: 2, total: 2, percent: 100 });
  }

  #[test]
  fn level_threshold_gates_by_tier() {
    let lessons = vec![
      lesson("b1", 0, CourseTier::Beginner),
      lesson("b2", 1, CourseTier::Beginner),
      lesson("i1", 2, CourseTier::Intermediate),
      lesson("a1", 3, CourseTier::Advanced),
    ];
    let policy = UnlockPolicy::LevelThreshold { unlock_after: 2 };

    let fresh = annotate_with_policy(&lessons, &HashMap::new(), policy, CourseTier::Beginner);
    assert_eq!(fresh.iter().map(|v| v.is_locked).collect::<Vec<_>>(), vec![false, false, true, true]);

    let p = progress(&[("b1", ProgressStatus::Completed), ("b2", ProgressStatus::Completed)]);
    let views = annotate_with_policy(&lessons, &p, policy, CourseTier::Beginner);
    assert!(!views[2].is_locked && views[2].is_current);
    assert!(views[3].is_locked);

    let advanced = annotate_with_policy(&lessons, &HashMap::new(), policy, CourseTier::Advanced);
    assert!(advanced.iter().all(|v| !v.is_locked));
  }

  #[test]
  fn summary_rounds_percent() {
    let views = annotate_lessons(&course(3), &progress(&[("l1", ProgressStatus::Completed)]));
    assert_eq!(CourseSummary::of(&views).percent, 33);
    assert_eq!(CourseSummary::of(&[]).percent, 0);
  }

  #[test]
  fn policy_parses_from_toml() {
    #[derive(Deserialize)]
    struct W { unlock: UnlockPolicy }
    let w: W = toml::from_str("[unlock]\npolicy = \"level_threshold\"\nunlock_after = 5\n").unwrap();
    assert_eq!(w.unlock, UnlockPolicy::LevelThreshold { unlock_after: 5 });
    let w: W = toml::from_str("[unlock]\npolicy = \"sequential\"\n").unwrap();
    assert_eq!(w.unlock, UnlockPolicy::Sequential);
  }
}
