//! Row-level store boundary and its in-memory implementation.
//!
//! `ProgressStore` is the only way the engine touches persisted state. Every
//! call is an independent read or write; there are no multi-row transactions.
//!
//! `MemoryStore` keeps all tables behind a single `RwLock`. When a snapshot
//! path is configured every successful write is mirrored to a JSON file, and a
//! write that cannot be persisted leaves the in-memory tables untouched.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::{
  LeagueEntry, Lesson, Profile, ProfileUpdate, ProgressRecord, ProgressStatus, ProgressUpdate, XpTransaction,
};
use crate::error::StoreError;

#[async_trait]
pub trait ProgressStore: Send + Sync {
  /// All lessons in course order.
  async fn get_lessons(&self) -> Result<Vec<Lesson>, StoreError>;
  async fn upsert_lesson(&self, lesson: Lesson) -> Result<(), StoreError>;

  /// Progress rows for `user_id` keyed by lesson id.
  async fn get_progress(&self, user_id: &str) -> Result<HashMap<String, ProgressRecord>, StoreError>;
  async fn upsert_progress(&self, user_id: &str, update: ProgressUpdate) -> Result<ProgressRecord, StoreError>;

  async fn get_profile(&self, user_id: &str) -> Result<Profile, StoreError>;
  async fn create_profile(&self, user_id: &str) -> Result<Profile, StoreError>;
  async fn update_profile(&self, user_id: &str, update: ProfileUpdate) -> Result<Profile, StoreError>;

  async fn get_badges(&self, user_id: &str) -> Result<Vec<String>, StoreError>;
  async fn add_badge(&self, user_id: &str, badge_id: &str) -> Result<(), StoreError>;

  async fn get_league_entry(&self, user_id: &str) -> Result<Option<LeagueEntry>, StoreError>;
  async fn put_league_entry(&self, entry: LeagueEntry) -> Result<(), StoreError>;
  async fn league_entries(&self) -> Result<Vec<LeagueEntry>, StoreError>;

  async fn add_xp_transaction(&self, tx: XpTransaction) -> Result<(), StoreError>;
  /// Newest first, at most `limit` rows.
  async fn recent_xp_transactions(&self, user_id: &str, limit: usize) -> Result<Vec<XpTransaction>, StoreError>;

  async fn has_marker(&self, name: &str) -> Result<bool, StoreError>;
  async fn put_marker(&self, name: &str) -> Result<(), StoreError>;
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct Tables {
  #[serde(default)] lessons: HashMap<String, Lesson>,
  #[serde(default)] progress: HashMap<String, HashMap<String, ProgressRecord>>,
  #[serde(default)] profiles: HashMap<String, Profile>,
  #[serde(default)] badges: HashMap<String, Vec<String>>,
  #[serde(default)] league: HashMap<String, LeagueEntry>,
  #[serde(default)] xp_transactions: HashMap<String, Vec<XpTransaction>>,
  #[serde(default)] markers: BTreeSet<String>,
}

impl Tables {
  fn validate(&self) -> Result<(), StoreError> {
    for lesson in self.lessons.values() {
      lesson.validate()?;
    }
    for rows in self.progress.values() {
      for rec in rows.values() {
        rec.validate()?;
      }
    }
    for profile in self.profiles.values() {
      profile.validate()?;
    }
    Ok(())
  }
}

#[derive(Default)]
pub struct MemoryStore {
  tables: RwLock<Tables>,
  snapshot: Option<PathBuf>,
}

fn require_user(user_id: &str) -> Result<(), StoreError> {
  if user_id.trim().is_empty() {
    return Err(StoreError::invalid("profiles", "empty user id"));
  }
  Ok(())
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Open a store mirrored to `path`, loading it if the file exists.
  #[instrument(level = "info", skip(path), fields(path = %path.display()))]
  pub async fn open(path: PathBuf) -> Result<Self, StoreError> {
    let tables = match tokio::fs::read_to_string(&path).await {
      Ok(s) => {
        let t: Tables = serde_json::from_str(&s)
          .map_err(|e| StoreError::Unavailable(format!("parse {}: {e}", path.display())))?;
        t.validate()?;
        info!(target: "finelo_backend", lessons = t.lessons.len(), profiles = t.profiles.len(), "Loaded store snapshot");
        t
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        info!(target: "finelo_backend", "No snapshot yet; starting empty");
        Tables::default()
      }
      Err(e) => return Err(StoreError::Unavailable(format!("read {}: {e}", path.display()))),
    };
    Ok(Self { tables: RwLock::new(tables), snapshot: Some(path) })
  }

  async fn persist(&self, tables: &Tables) -> Result<(), StoreError> {
    let Some(path) = &self.snapshot else { return Ok(()) };
    let body = serde_json::to_string_pretty(tables)
      .map_err(|e| StoreError::Unavailable(format!("serialize snapshot: {e}")))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| StoreError::Unavailable(format!("create {}: {e}", parent.display())))?;
    }
    // Write the sibling temp file, then rename over the snapshot.
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, body)
      .await
      .map_err(|e| StoreError::Unavailable(format!("write {}: {e}", tmp.display())))?;
    tokio::fs::rename(&tmp, path)
      .await
      .map_err(|e| StoreError::Unavailable(format!("rename {}: {e}", path.display())))?;
    debug!(target: "finelo_backend", path = %path.display(), "Snapshot written");
    Ok(())
  }

  /// Apply `f` to a working copy, persist it, then publish it.
  async fn commit<T>(&self, f: impl FnOnce(&mut Tables) -> Result<T, StoreError>) -> Result<T, StoreError> {
    let mut guard = self.tables.write().await;
    let mut next = guard.clone();
    let out = f(&mut next)?;
    self.persist(&next).await?;
    *guard = next;
    Ok(out)
  }
}

#[async_trait]
impl ProgressStore for MemoryStore {
  async fn get_lessons(&self) -> Result<Vec<Lesson>, StoreError> {
    let t = self.tables.read().await;
    let mut lessons: Vec<Lesson> = t.lessons.values().cloned().collect();
    lessons.sort_by(|a, b| a.sequence.cmp(&b.sequence).then_with(|| a.id.cmp(&b.id)));
    Ok(lessons)
  }

  async fn upsert_lesson(&self, lesson: Lesson) -> Result<(), StoreError> {
    lesson.validate()?;
    self.commit(|t| {
      t.lessons.insert(lesson.id.clone(), lesson);
      Ok(())
    })
    .await
  }

  async fn get_progress(&self, user_id: &str) -> Result<HashMap<String, ProgressRecord>, StoreError> {
    let t = self.tables.read().await;
    Ok(t.progress.get(user_id).cloned().unwrap_or_default())
  }

  async fn upsert_progress(&self, user_id: &str, update: ProgressUpdate) -> Result<ProgressRecord, StoreError> {
    require_user(user_id)?;
    self.commit(|t| {
      let now = Utc::now();
      let rows = t.progress.entry(user_id.to_string()).or_default();
      let mut rec = rows.get(&update.lesson_id).cloned().unwrap_or_else(|| ProgressRecord {
        id: Uuid::new_v4(),
        lesson_id: update.lesson_id.clone(),
        status: ProgressStatus::NotStarted,
        score: None,
        attempts: 0,
        time_spent_seconds: 0,
        last_accessed: now,
        completed_at: None,
      });
      rec.status = update.status;
      if update.score.is_some() {
        rec.score = update.score;
      }
      if let Some(secs) = update.time_spent_seconds {
        rec.time_spent_seconds = rec.time_spent_seconds.saturating_add(secs);
      }
      if update.attempt {
        rec.attempts += 1;
      }
      rec.last_accessed = now;
      if rec.status.is_completed() && rec.completed_at.is_none() {
        rec.completed_at = Some(now);
      }
      rec.validate()?;
      rows.insert(rec.lesson_id.clone(), rec.clone());
      Ok(rec)
    })
    .await
  }

  async fn get_profile(&self, user_id: &str) -> Result<Profile, StoreError> {
    let t = self.tables.read().await;
    t.profiles
      .get(user_id)
      .cloned()
      .ok_or_else(|| StoreError::NotFound { entity: "profile", id: user_id.to_string() })
  }

  async fn create_profile(&self, user_id: &str) -> Result<Profile, StoreError> {
    require_user(user_id)?;
    self.commit(|t| {
      if t.profiles.contains_key(user_id) {
        return Err(StoreError::Conflict { entity: "profile", id: user_id.to_string() });
      }
      let profile = Profile::new(user_id);
      t.profiles.insert(user_id.to_string(), profile.clone());
      Ok(profile)
    })
    .await
  }

  async fn update_profile(&self, user_id: &str, update: ProfileUpdate) -> Result<Profile, StoreError> {
    self.commit(|t| {
      let profile = t
        .profiles
        .get_mut(user_id)
        .ok_or_else(|| StoreError::NotFound { entity: "profile", id: user_id.to_string() })?;
      profile.apply(&update);
      profile.validate()?;
      Ok(profile.clone())
    })
    .await
  }

  async fn get_badges(&self, user_id: &str) -> Result<Vec<String>, StoreError> {
    let t = self.tables.read().await;
    Ok(t.badges.get(user_id).cloned().unwrap_or_default())
  }

  async fn add_badge(&self, user_id: &str, badge_id: &str) -> Result<(), StoreError> {
    require_user(user_id)?;
    self.commit(|t| {
      let owned = t.badges.entry(user_id.to_string()).or_default();
      if !owned.iter().any(|b| b == badge_id) {
        owned.push(badge_id.to_string());
      }
      Ok(())
    })
    .await
  }

  async fn get_league_entry(&self, user_id: &str) -> Result<Option<LeagueEntry>, StoreError> {
    let t = self.tables.read().await;
    Ok(t.league.get(user_id).cloned())
  }

  async fn put_league_entry(&self, entry: LeagueEntry) -> Result<(), StoreError> {
    require_user(&entry.user_id)?;
    self.commit(|t| {
      t.league.insert(entry.user_id.clone(), entry);
      Ok(())
    })
    .await
  }

  async fn league_entries(&self) -> Result<Vec<LeagueEntry>, StoreError> {
    let t = self.tables.read().await;
    Ok(t.league.values().cloned().collect())
  }

  async fn add_xp_transaction(&self, tx: XpTransaction) -> Result<(), StoreError> {
    require_user(&tx.user_id)?;
    self.commit(|t| {
      t.xp_transactions.entry(tx.user_id.clone()).or_default().push(tx);
      Ok(())
    })
    .await
  }

  async fn recent_xp_transactions(&self, user_id: &str, limit: usize) -> Result<Vec<XpTransaction>, StoreError> {
    let t = self.tables.read().await;
    let rows = t.xp_transactions.get(user_id).map(Vec::as_slice).unwrap_or_default();
    Ok(rows.iter().rev().take(limit).cloned().collect())
  }

  async fn has_marker(&self, name: &str) -> Result<bool, StoreError> {
    Ok(self.tables.read().await.markers.contains(name))
  }

  async fn put_marker(&self, name: &str) -> Result<(), StoreError> {
    self.commit(|t| {
      t.markers.insert(name.to_string());
      Ok(())
    })
    .await
  }
}
