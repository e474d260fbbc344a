//! Public request/response DTOs for the HTTP API (serde ready).
//! Responses that mirror engine types serialize those types directly.

use serde::{Deserialize, Serialize};

use crate::domain::Division;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StandingsQuery {
    #[serde(default)]
    pub division: Option<Division>,
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UserIn {
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StartLessonIn {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "lessonId")]
    pub lesson_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteLessonIn {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "lessonId")]
    pub lesson_id: String,
    pub score: u32,
    #[serde(rename = "timeSpent", default)]
    pub time_spent: Option<u32>,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
    pub lessons: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorOut {
    pub error: String,
}
