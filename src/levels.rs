//! Level table and the coarse course tier derived from XP.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::CourseTier;

/// XP needed to reach the intermediate tier.
pub const INTERMEDIATE_TIER_XP: u64 = 500;
/// XP needed to reach the advanced tier.
pub const ADVANCED_TIER_XP: u64 = 2000;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Level {
  pub level: u32,
  pub xp_required: u64,
  pub title: String,
}

/// Where a user sits inside their current level.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
  pub level: Level,
  pub next: Option<Level>,
  pub xp_into_level: u64,
  pub xp_to_next: u64,
  pub percent: f32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LevelTableError {
  #[error("level table is empty")]
  Empty,
  #[error("first level must require 0 XP, got {0}")]
  FirstNotZero(u64),
  #[error("level table must ascend strictly at level {0}")]
  NotAscending(u32),
}

/// Ordered `(level, xp_required, title)` rows, strictly ascending.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelTable {
  levels: Vec<Level>,
}

impl LevelTable {
  pub fn new(levels: Vec<Level>) -> Result<Self, LevelTableError> {
    let first = levels.first().ok_or(LevelTableError::Empty)?;
    if first.xp_required != 0 {
      return Err(LevelTableError::FirstNotZero(first.xp_required));
    }
    for pair in levels.windows(2) {
      if pair[1].level <= pair[0].level || pair[1].xp_required <= pair[0].xp_required {
        return Err(LevelTableError::NotAscending(pair[1].level));
      }
    }
    Ok(Self { levels })
  }

  pub fn levels(&self) -> &[Level] { &self.levels }

  /// Highest level whose requirement is met by `xp`.
  pub fn level_for_xp(&self, xp: u64) -> &Level {
    self.levels
      .iter()
      .take_while(|l| l.xp_required <= xp)
      .last()
      .unwrap_or(&self.levels[0])
  }

  pub fn progress(&self, xp: u64) -> LevelProgress {
    let current = self.level_for_xp(xp).clone();
    let next = self.levels.iter().find(|l| l.xp_required > xp).cloned();
    let xp_into_level = xp - current.xp_required;
    let (xp_to_next, percent) = match &next {
      Some(n) => {
        let span = n.xp_required - current.xp_required;
        (n.xp_required - xp, xp_into_level as f32 / span as f32 * 100.0)
      }
      None => (0, 100.0),
    };
    LevelProgress { level: current, next, xp_into_level, xp_to_next, percent }
  }
}

impl Default for LevelTable {
  fn default() -> Self {
    let rows: [(u32, u64, &str); 10] = [
      (1, 0, "Novice"),
      (2, 50, "Apprentice"),
      (3, 150, "Investor"),
      (4, 300, "Trader"),
      (5, 500, "Analyst"),
      (6, 800, "Strategist"),
      (7, 1200, "Expert"),
      (8, 2000, "Portfolio Manager"),
      (9, 3500, "Market Master"),
      (10, 5000, "Wall Street Legend"),
    ];
    Self {
      levels: rows
        .iter()
        .map(|(level, xp_required, title)| Level { level: *level, xp_required: *xp_required, title: (*title).into() })
        .collect(),
    }
  }
}

impl CourseTier {
  pub fn from_xp(xp: u64) -> Self {
    if xp >= ADVANCED_TIER_XP {
      CourseTier::Advanced
    } else if xp >= INTERMEDIATE_TIER_XP {
      CourseTier::Intermediate
    } else {
      CourseTier::Beginner
    }
  }
}
