//! Built-in course content and the one-time catalog seeding step.

use tracing::{info, instrument};

use crate::domain::{CourseTier, Lesson, SequenceKey, DEFAULT_PASS_THRESHOLD};
use crate::error::StoreError;
use crate::store::ProgressStore;

/// Marker row written once the built-in catalog has been loaded.
pub const CATALOG_MARKER: &str = "lessons_v1";

/// Result of a seeding run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeedOutcome {
  AlreadySeeded,
  Seeded(usize),
}

/// The first two days of module 1: "Zero to Hero" trading basics.
pub fn seed_lessons() -> Vec<Lesson> {
  let rows: [(u32, u32, &str, &str, u32, u32); 10] = [
    (1, 1, "1.1", "What Is Stock Trading?", 10, 5),
    (1, 2, "1.2", "Understanding Shares", 10, 5),
    (1, 3, "1.3", "How Stock Markets Work", 10, 5),
    (1, 4, "1.4", "Reading Stock Prices", 10, 5),
    (2, 5, "2.1", "Market Orders vs Limit Orders", 10, 5),
    (2, 6, "2.2", "Understanding Bid and Ask", 10, 5),
    (2, 7, "2.3", "Introduction to Stock Charts", 10, 5),
    (2, 8, "2.4", "Candlestick Basics", 15, 10),
    (2, 9, "2.5", "Volume Analysis", 10, 5),
    (2, 10, "2.6", "Your First Practice Trade", 20, 15),
  ];

  let mut previous: Option<&str> = None;
  rows
    .iter()
    .map(|(day, order, code, title, xp, coins)| {
      let lesson = Lesson {
        id: format!("lesson-{code}"),
        code: (*code).to_string(),
        title: (*title).to_string(),
        sequence: SequenceKey { module_id: 1, day_number: *day, order_index: *order },
        level: CourseTier::Beginner,
        pass_threshold: DEFAULT_PASS_THRESHOLD,
        xp_reward: Some(*xp),
        coin_reward: Some(*coins),
        is_locked: previous.is_some(),
        unlock_requirement: previous.map(|p| format!("complete_lesson_{p}")),
        estimated_minutes: Some(5),
      };
      previous = Some(*code);
      lesson
    })
    .collect()
}

/// Load `lessons` into the store unless the catalog marker is already present.
/// The marker is written last, so an interrupted run is simply repeated.
#[instrument(level = "info", skip(store, lessons), fields(count = lessons.len()))]
pub async fn seed_catalog(store: &dyn ProgressStore, lessons: Vec<Lesson>) -> Result<SeedOutcome, StoreError> {
  if store.has_marker(CATALOG_MARKER).await? {
    info!(target: "finelo_backend", marker = CATALOG_MARKER, "Lesson catalog already seeded");
    return Ok(SeedOutcome::AlreadySeeded);
  }
  let count = lessons.len();
  for lesson in lessons {
    store.upsert_lesson(lesson).await?;
  }
  store.put_marker(CATALOG_MARKER).await?;
  info!(target: "finelo_backend", marker = CATALOG_MARKER, count, "Lesson catalog seeded");
  Ok(SeedOutcome::Seeded(count))
}
