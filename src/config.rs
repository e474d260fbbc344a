//! Loading service configuration (reward schedule, level table, unlock policy,
//! lesson bank) from TOML.
//!
//! Example:
//! ```toml
//! [rewards]
//! lesson_xp = 10
//! perfect_bonus_xp = 10
//!
//! [unlock]
//! policy = "sequential"          # or "level_threshold" with unlock_after = 3
//!
//! [[levels]]
//! level = 1
//! xpRequired = 0
//! title = "Novice"
//!
//! [[lessons]]
//! id = "lesson-1.1"
//! title = "What Is Stock Trading?"
//! moduleId = 1
//! dayNumber = 1
//! orderIndex = 1
//! ```

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::domain::Lesson;
use crate::levels::{Level, LevelTable};
use crate::rewards::RewardSchedule;
use crate::sequencer::UnlockPolicy;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ServiceConfig {
  #[serde(default)]
  pub rewards: RewardSchedule,
  #[serde(default)]
  pub unlock: UnlockPolicy,
  #[serde(default)]
  pub levels: Vec<Level>,
  /// Replaces the built-in lesson catalog when non-empty.
  #[serde(default)]
  pub lessons: Vec<Lesson>,
}

impl ServiceConfig {
  /// The configured level table, or the built-in one when absent or invalid.
  pub fn level_table(&self) -> LevelTable {
    if self.levels.is_empty() {
      return LevelTable::default();
    }
    match LevelTable::new(self.levels.clone()) {
      Ok(t) => t,
      Err(e) => {
        error!(target: "finelo_backend", error = %e, "Invalid level table in config; using defaults");
        LevelTable::default()
      }
    }
  }

  /// Configured lessons that pass validation. Invalid rows are skipped.
  pub fn lesson_bank(&self) -> Vec<Lesson> {
    self.lessons
      .iter()
      .filter(|l| match l.validate() {
        Ok(()) => true,
        Err(e) => {
          warn!(target: "lesson", id = %l.id, error = %e, "Skipping lesson from config");
          false
        }
      })
      .cloned()
      .collect()
  }
}

pub fn parse_config(s: &str) -> Result<ServiceConfig, toml::de::Error> {
  toml::from_str::<ServiceConfig>(s)
}

/// Attempt to load `ServiceConfig` from PROGRESS_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_config_from_env() -> Option<ServiceConfig> {
  let path = std::env::var("PROGRESS_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_config(&s) {
      Ok(cfg) => {
        info!(target: "finelo_backend", %path, "Loaded service config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "finelo_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "finelo_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_config_uses_defaults() {
    let cfg = parse_config("").unwrap();
    assert_eq!(cfg.rewards, RewardSchedule::default());
    assert_eq!(cfg.unlock, UnlockPolicy::Sequential);
    assert_eq!(cfg.level_table(), LevelTable::default());
    assert!(cfg.lesson_bank().is_empty());
  }

  #[test]
  fn full_config_parses() {
    let cfg = parse_config(
      r#"
        [rewards]
        lesson_xp = 15
        perfect_bonus_coins = 8

        [unlock]
        policy = "level_threshold"
        unlock_after = 4

        [[levels]]
        level = 1
        xpRequired = 0
        title = "Rookie"

        [[levels]]
        level = 2
        xpRequired = 40
        title = "Regular"

        [[lessons]]
        id = "intro"
        title = "Intro"
        moduleId = 1
        dayNumber = 1
        orderIndex = 1
        xpReward = 25

        [[lessons]]
        id = "broken"
        title = "Broken"
        moduleId = 1
        dayNumber = 1
        orderIndex = 2
        passThreshold = 140
      "#,
    )
    .unwrap();
    assert_eq!(cfg.rewards.lesson_xp, 15);
    assert_eq!(cfg.rewards.lesson_coins, 5);
    assert_eq!(cfg.rewards.perfect_bonus_coins, 8);
    assert_eq!(cfg.unlock, UnlockPolicy::LevelThreshold { unlock_after: 4 });
    assert_eq!(cfg.level_table().level_for_xp(45).title, "Regular");
    let bank = cfg.lesson_bank();
    assert_eq!(bank.len(), 1);
    assert_eq!(bank[0].xp_reward, Some(25));
  }

  #[test]
  fn invalid_level_table_falls_back() {
    let cfg = parse_config("[[levels]]\nlevel = 1\nxpRequired = 10\ntitle = \"x\"\n").unwrap();
    assert_eq!(cfg.level_table(), LevelTable::default());
  }
}
