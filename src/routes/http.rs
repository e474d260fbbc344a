//! HTTP endpoint handlers. These are thin wrappers that forward to the engine.
//! Each handler is instrumented and logs its parameters and basic result info.

use std::sync::Arc;
use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use tracing::{info, instrument};

use crate::domain::{Division, LeagueEntry, Profile, ProgressRecord, XpTransaction};
use crate::engine::{CompletionOutcome, CourseView, MonthClose, ProfileView};
use crate::error::ProgressError;
use crate::league::Standing;
use crate::protocol::*;
use crate::routes::extract::{ApiJson, ApiQuery};
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, ProgressError>;

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> ApiResult<HealthOut> {
  let lessons = state.engine.store().get_lessons().await.map_err(ProgressError::read)?;
  Ok(Json(HealthOut { ok: true, lessons: lessons.len() }))
}

#[instrument(level = "info", skip(state), fields(user_id = %q.user_id))]
pub async fn http_get_lessons(
  State(state): State<Arc<AppState>>,
  ApiQuery(q): ApiQuery<UserQuery>,
) -> ApiResult<CourseView> {
  let course = state.engine.lessons_for(&q.user_id).await?;
  Ok(Json(course))
}

#[instrument(level = "info", skip(state, body), fields(user_id = %body.user_id, lesson_id = %body.lesson_id))]
pub async fn http_post_start_lesson(
  State(state): State<Arc<AppState>>,
  ApiJson(body): ApiJson<StartLessonIn>,
) -> ApiResult<ProgressRecord> {
  let rec = state.engine.start_lesson(&body.user_id, &body.lesson_id).await?;
  Ok(Json(rec))
}

#[instrument(level = "info", skip(state, body), fields(user_id = %body.user_id, lesson_id = %body.lesson_id, score = body.score))]
pub async fn http_post_complete_lesson(
  State(state): State<Arc<AppState>>,
  ApiJson(body): ApiJson<CompleteLessonIn>,
) -> ApiResult<CompletionOutcome> {
  let today = Utc::now().date_naive();
  let out = state
    .engine
    .complete_lesson(&body.user_id, &body.lesson_id, body.score, body.time_spent, today)
    .await?;
  info!(target: "rewards", user_id = %body.user_id, lesson_id = %out.lesson_id, passed = out.passed, xp = out.xp_awarded, leveled_up = out.leveled_up, "HTTP lesson submission evaluated");
  Ok(Json(out))
}

#[instrument(level = "info", skip(state), fields(user_id = %q.user_id))]
pub async fn http_get_profile(
  State(state): State<Arc<AppState>>,
  ApiQuery(q): ApiQuery<UserQuery>,
) -> ApiResult<ProfileView> {
  Ok(Json(state.engine.profile_for(&q.user_id).await?))
}

#[instrument(level = "info", skip(state, body), fields(user_id = %body.user_id))]
pub async fn http_post_profile(
  State(state): State<Arc<AppState>>,
  ApiJson(body): ApiJson<UserIn>,
) -> Result<(StatusCode, Json<Profile>), ProgressError> {
  let profile = state.engine.create_profile(&body.user_id).await?;
  Ok((StatusCode::CREATED, Json(profile)))
}

#[instrument(level = "info", skip(state, body), fields(user_id = %body.user_id))]
pub async fn http_post_join_league(
  State(state): State<Arc<AppState>>,
  ApiJson(body): ApiJson<UserIn>,
) -> ApiResult<LeagueEntry> {
  let entry = state.engine.join_league(&body.user_id, Utc::now().date_naive()).await?;
  Ok(Json(entry))
}

/// Standings for `division`, else the division `userId` plays in, else Bronze.
#[instrument(level = "info", skip(state))]
pub async fn http_get_standings(
  State(state): State<Arc<AppState>>,
  ApiQuery(q): ApiQuery<StandingsQuery>,
) -> ApiResult<Vec<Standing>> {
  let division = match (q.division, q.user_id.as_deref()) {
    (Some(division), _) => division,
    (None, Some(user_id)) => state.engine.league_entry(user_id).await?.map(|e| e.division).unwrap_or_default(),
    (None, None) => Division::default(),
  };
  let table = state.engine.league_standings(division, Utc::now().date_naive()).await?;
  Ok(Json(table))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_close_month(State(state): State<Arc<AppState>>) -> ApiResult<MonthClose> {
  let closed = state.engine.close_month(Utc::now().date_naive()).await?;
  info!(target: "finelo_backend", month = closed.month_number, ranked = closed.settlements.len(), "HTTP league month closed");
  Ok(Json(closed))
}

#[instrument(level = "info", skip(state), fields(user_id = %q.user_id))]
pub async fn http_get_recent_xp(
  State(state): State<Arc<AppState>>,
  ApiQuery(q): ApiQuery<UserQuery>,
) -> ApiResult<Vec<XpTransaction>> {
  Ok(Json(state.engine.recent_xp(&q.user_id).await?))
}
