//! Journal API handlers: diary entries, favorite phrases, and the manual
//! letter trigger. Users are keyed by email; writing creates the user on
//! first contact.

use crate::error::{AppError, Result};
use crate::metrics;
use crate::server::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{Duration, Local, NaiveDate};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
pub struct UserQuery {
    email: String,
}

fn display_name(email: &str, name: Option<String>) -> String {
    name.unwrap_or_else(|| email.split('@').next().unwrap_or(email).to_string())
}

#[derive(Deserialize)]
pub struct DiaryRequest {
    email: Option<String>,
    name: Option<String>,
    date: Option<NaiveDate>,
    content: Option<String>,
    mood: Option<String>,
}

pub async fn post_diary(
    State(state): State<AppState>,
    Json(body): Json<DiaryRequest>,
) -> Result<Json<Value>> {
    metrics::http_request("diary");
    let (Some(email), Some(content)) = (body.email, body.content) else {
        return Err(AppError::MissingField("email, content".into()));
    };

    let store = state.letters.store();
    let user_id = store.upsert_user(&email, &display_name(&email, body.name))?;
    let date = body.date.unwrap_or_else(|| Local::now().date_naive());
    let entry = store.upsert_diary(user_id, date, &content, body.mood.as_deref())?;

    Ok(Json(json!({ "success": true, "entry": entry })))
}

pub async fn get_diary(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Value>> {
    metrics::http_request("diary");
    let store = state.letters.store();
    let user = store
        .get_user_by_email(&query.email)?
        .ok_or_else(|| AppError::NotFound(format!("user {}", query.email)))?;
    let entries = store.list_diary(user.id)?;
    Ok(Json(json!({ "entries": entries })))
}

#[derive(Deserialize)]
pub struct PhraseRequest {
    email: Option<String>,
    name: Option<String>,
    content: Option<String>,
    author: Option<String>,
}

pub async fn post_phrase(
    State(state): State<AppState>,
    Json(body): Json<PhraseRequest>,
) -> Result<Json<Value>> {
    metrics::http_request("phrases");
    let (Some(email), Some(content)) = (body.email, body.content) else {
        return Err(AppError::MissingField("email, content".into()));
    };

    let store = state.letters.store();
    let user_id = store.upsert_user(&email, &display_name(&email, body.name))?;
    let phrase = store.add_phrase(user_id, &content, body.author.as_deref())?;
    Ok(Json(json!({ "success": true, "phrase": phrase })))
}

pub async fn get_phrases(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Value>> {
    metrics::http_request("phrases");
    let store = state.letters.store();
    let user = store
        .get_user_by_email(&query.email)?
        .ok_or_else(|| AppError::NotFound(format!("user {}", query.email)))?;
    let phrases = store.list_phrases(user.id)?;
    Ok(Json(json!({ "phrases": phrases })))
}

pub async fn delete_phrase(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<UserQuery>,
) -> Result<Json<Value>> {
    metrics::http_request("phrases");
    let store = state.letters.store();
    let user = store
        .get_user_by_email(&query.email)?
        .ok_or_else(|| AppError::NotFound(format!("user {}", query.email)))?;
    if !store.delete_phrase(id, user.id)? {
        return Err(AppError::NotFound(format!("phrase {id}")));
    }
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize, Default)]
pub struct TriggerRequest {
    date: Option<NaiveDate>,
}

/// Manual run of the letter job, defaulting to yesterday's entries.
pub async fn trigger_letters(
    State(state): State<AppState>,
    body: Option<Json<TriggerRequest>>,
) -> Result<Json<Value>> {
    metrics::http_request("letters-trigger");
    let date = body
        .and_then(|Json(request)| request.date)
        .unwrap_or_else(|| Local::now().date_naive() - Duration::days(1));
    let summary = state.letters.run_for_date(date).await?;
    Ok(Json(json!({ "success": true, "date": date, "summary": summary })))
}
