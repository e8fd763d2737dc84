//! Delivery route API handlers. Request bodies keep the wire field names
//! the original clients send (camelCase keys, status enums in
//! SCREAMING_SNAKE form); responses are the entity shapes from
//! [`crate::domain`].

use crate::auth::{issue_token, verify_pin};
use crate::domain::*;
use crate::error::{AppError, Result};
use crate::eta::{self, EtaParams};
use crate::metrics;
use crate::server::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{Local, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| AppError::BadRequest(format!("invalid date '{value}': {e}")))
}

// ---------------------------------------------------------------------------
// Auth

#[derive(Deserialize)]
pub struct LoginRequest {
    role: Option<String>,
    id: Option<String>,
    pin: Option<String>,
}

pub async fn auth_login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>> {
    metrics::http_request("auth-login");
    let (Some(role), Some(id), Some(pin)) = (body.role, body.id, body.pin) else {
        return Err(AppError::MissingField("role, id, pin".into()));
    };

    let role = match role.as_str() {
        "ADMIN" => Role::Admin,
        "DRIVER" => Role::Driver,
        other => {
            return Err(AppError::BadRequest(format!(
                "invalid role '{other}', must be ADMIN or DRIVER"
            )))
        }
    };

    let (user_id, name, pin_hash) = match role {
        Role::Admin => match state.storage.get_admin(&id).await? {
            Some(admin) => (admin.id, admin.name, admin.pin_hash),
            None => return Err(AppError::Unauthorized("Invalid credentials".into())),
        },
        Role::Driver => match state.storage.get_driver(&id).await? {
            Some(driver) => (driver.id, driver.name, driver.pin_hash),
            None => return Err(AppError::Unauthorized("Invalid credentials".into())),
        },
    };

    if !verify_pin(&pin, &pin_hash) {
        return Err(AppError::Unauthorized("Invalid credentials".into()));
    }

    let token = issue_token(role, &user_id, Utc::now().timestamp_millis());
    Ok(Json(json!({
        "success": true,
        "user": { "id": user_id, "name": name, "role": role },
        "token": token,
    })))
}

// ---------------------------------------------------------------------------
// Today / route days

#[derive(Deserialize)]
pub struct TodayQuery {
    date: Option<String>,
    #[serde(rename = "driverId")]
    driver_id: Option<String>,
}

async fn stops_with_locations(
    state: &AppState,
    route_day_id: &str,
) -> Result<Vec<StopWithLocation>> {
    let stops = state.storage.list_stops_for_route_day(route_day_id).await?;
    let mut joined = Vec::with_capacity(stops.len());
    for stop in stops {
        let location = state
            .storage
            .get_location(&stop.location_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("location {}", stop.location_id)))?;
        joined.push(StopWithLocation {
            stop,
            location_name: location.name,
            location_address: location.address,
            location_region: location.region,
            entry_instruction_text: location.entry_instruction_text,
        });
    }
    Ok(joined)
}

pub async fn today(
    State(state): State<AppState>,
    Query(query): Query<TodayQuery>,
) -> Result<Json<Value>> {
    metrics::http_request("today");
    let (Some(date), Some(driver_id)) = (query.date, query.driver_id) else {
        return Err(AppError::MissingField("date, driverId".into()));
    };
    let date = parse_date(&date)?;

    let route_day = state
        .storage
        .get_route_day_for_driver(date, &driver_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound("No route found for this driver on this date".into())
        })?;

    let stops = stops_with_locations(&state, &route_day.id).await?;
    Ok(Json(json!({ "routeDay": route_day, "stops": stops })))
}

#[derive(Deserialize)]
pub struct DateQuery {
    date: String,
}

pub async fn route_days_by_date(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Value>> {
    metrics::http_request("route-days");
    let date = parse_date(&query.date)?;
    let route_days = state.storage.list_route_days_by_date(date).await?;
    Ok(Json(json!({ "routeDays": route_days })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStopRequest {
    location_id: String,
    #[serde(default)]
    planned_cs: u32,
    #[serde(default)]
    planned_bt: u32,
    #[serde(default)]
    planned_ft: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRouteDayRequest {
    date: String,
    region: Region,
    driver_id: String,
    window_start: Option<String>,
    window_end: Option<String>,
    #[serde(default)]
    stops: Vec<NewStopRequest>,
}

pub async fn create_route_day(
    State(state): State<AppState>,
    Json(body): Json<CreateRouteDayRequest>,
) -> Result<Json<Value>> {
    metrics::http_request("route-days");
    let date = parse_date(&body.date)?;
    if state.storage.get_driver(&body.driver_id).await?.is_none() {
        return Err(AppError::BadRequest(format!(
            "unknown driver '{}'",
            body.driver_id
        )));
    }
    for stop in &body.stops {
        if state.storage.get_location(&stop.location_id).await?.is_none() {
            return Err(AppError::BadRequest(format!(
                "unknown location '{}'",
                stop.location_id
            )));
        }
    }

    let route_config = &state.config.route;
    let window_start = eta::parse_hhmm(
        body.window_start
            .as_deref()
            .unwrap_or(&route_config.window_start),
    )?;
    let window_end = eta::parse_hhmm(
        body.window_end
            .as_deref()
            .unwrap_or(&route_config.window_end),
    )?;

    let mut route_day = RouteDay {
        id: String::new(),
        date,
        region: body.region,
        driver_id: body.driver_id.clone(),
        window_start,
        window_end,
        status: RouteStatus::Ready,
        started_at: None,
    };
    state.storage.create_route_day(&mut route_day).await?;

    let mut created_stops = Vec::with_capacity(body.stops.len());
    for (index, request) in body.stops.iter().enumerate() {
        let mut stop = Stop {
            id: String::new(),
            route_day_id: route_day.id.clone(),
            sequence: index as u32 + 1,
            location_id: request.location_id.clone(),
            planned_cs: request.planned_cs,
            planned_bt: request.planned_bt,
            planned_ft: request.planned_ft,
            status: StopStatus::Ready,
            job_started_at: None,
            completed_at: None,
            delivered_type: None,
            created_at: Utc::now(),
        };
        state.storage.create_stop(&mut stop).await?;
        created_stops.push(stop);
    }

    Ok(Json(json!({
        "success": true,
        "routeDay": route_day,
        "stops": created_stops,
    })))
}

pub async fn start_route_day(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    metrics::http_request("route-day-start");
    let route_day = state
        .storage
        .start_route_day(&id, Utc::now())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("route day {id}")))?;
    Ok(Json(json!({ "success": true, "routeDay": route_day })))
}

/// Arrival estimates for the remaining stops of a route-day, with a
/// late-risk flag against the service window end.
pub async fn route_day_eta(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    metrics::http_request("route-day-eta");
    let route_day = state
        .storage
        .get_route_day(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("route day {id}")))?;
    let stops = state.storage.list_stops_for_route_day(&id).await?;

    let remaining: Vec<_> = stops
        .into_iter()
        .filter(|s| s.status != StopStatus::Completed)
        .collect();

    let now = Local::now().naive_local();
    let params = EtaParams::from_config(&state.config.route);
    let estimates: Vec<Value> = eta::estimated_arrivals(now, remaining.len(), &params)
        .zip(&remaining)
        .map(|(arrival, stop)| {
            json!({
                "stop_id": stop.id,
                "sequence": stop.sequence,
                "eta": arrival,
                "eta_time": arrival.format("%H:%M").to_string(),
                "late_risk": eta::has_late_risk(arrival, route_day.window_end),
            })
        })
        .collect();

    Ok(Json(json!({
        "route_day_id": route_day.id,
        "generated_at": now,
        "stops": estimates,
    })))
}

// ---------------------------------------------------------------------------
// Stops

#[derive(Deserialize)]
pub struct StopCompleteRequest {
    #[serde(rename = "stopId")]
    stop_id: Option<String>,
    #[serde(rename = "deliveredType")]
    delivered_type: Option<String>,
    note: Option<String>,
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

pub async fn stop_complete(
    State(state): State<AppState>,
    Json(body): Json<StopCompleteRequest>,
) -> Result<Json<Value>> {
    metrics::http_request("stop-complete");
    let (Some(stop_id), Some(delivered_type)) = (body.stop_id, body.delivered_type) else {
        return Err(AppError::MissingField("stopId, deliveredType".into()));
    };

    let delivered_type = match delivered_type.as_str() {
        "DELIVERED" => DeliveredType::Delivered,
        "COLLECTED" => DeliveredType::Collected,
        "BOTH" => DeliveredType::Both,
        _ => {
            return Err(AppError::BadRequest(
                "Invalid deliveredType. Must be DELIVERED, COLLECTED, or BOTH".into(),
            ))
        }
    };

    let stop = state
        .storage
        .complete_stop(&stop_id, delivered_type, Utc::now())
        .await?
        .ok_or_else(|| AppError::NotFound("Stop not found".into()))?;

    if let Some(note) = body.note.filter(|n| !n.is_empty()) {
        let mut note_event = StopEvent {
            id: String::new(),
            stop_id: stop_id.clone(),
            event_type: EventType::Note,
            content: note,
            created_at: Utc::now(),
            created_by: body.user_id.clone().unwrap_or_else(|| "unknown".into()),
        };
        state.storage.create_stop_event(&mut note_event).await?;
    }

    let mut system_event = StopEvent {
        id: String::new(),
        stop_id: stop_id.clone(),
        event_type: EventType::System,
        content: format!("stop completed: {}", delivered_type.label()),
        created_at: Utc::now(),
        created_by: body.user_id.unwrap_or_else(|| "system".into()),
    };
    state.storage.create_stop_event(&mut system_event).await?;

    Ok(Json(json!({ "success": true, "stop": stop })))
}

#[derive(Deserialize)]
pub struct StopNoteRequest {
    #[serde(rename = "stopId")]
    stop_id: Option<String>,
    content: Option<String>,
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

pub async fn stop_note(
    State(state): State<AppState>,
    Json(body): Json<StopNoteRequest>,
) -> Result<Json<Value>> {
    metrics::http_request("stop-note");
    let (Some(stop_id), Some(content)) = (body.stop_id, body.content) else {
        return Err(AppError::MissingField("stopId, content".into()));
    };
    if state.storage.get_stop(&stop_id).await?.is_none() {
        return Err(AppError::NotFound("Stop not found".into()));
    }

    let mut event = StopEvent {
        id: String::new(),
        stop_id,
        event_type: EventType::Note,
        content,
        created_at: Utc::now(),
        created_by: body.user_id.unwrap_or_else(|| "unknown".into()),
    };
    state.storage.create_stop_event(&mut event).await?;

    Ok(Json(json!({ "success": true, "event": event })))
}

#[derive(Deserialize)]
pub struct StopStatusRequest {
    status: StopStatus,
}

pub async fn update_stop_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StopStatusRequest>,
) -> Result<Json<Value>> {
    metrics::http_request("stop-status");
    let stop = state
        .storage
        .update_stop_status(&id, body.status, Utc::now())
        .await?
        .ok_or_else(|| AppError::NotFound("Stop not found".into()))?;
    Ok(Json(json!({ "success": true, "stop": stop })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    route_day_id: String,
    stop_ids: Vec<String>,
}

pub async fn reorder_stops(
    State(state): State<AppState>,
    Json(body): Json<ReorderRequest>,
) -> Result<Json<Value>> {
    metrics::http_request("stops-reorder");
    if state.storage.get_route_day(&body.route_day_id).await?.is_none() {
        return Err(AppError::NotFound(format!("route day {}", body.route_day_id)));
    }
    let stops = state
        .storage
        .reorder_stops(&body.route_day_id, &body.stop_ids)
        .await?;
    Ok(Json(json!({ "success": true, "stops": stops })))
}

pub async fn stop_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    metrics::http_request("stop-events");
    if state.storage.get_stop(&id).await?.is_none() {
        return Err(AppError::NotFound("Stop not found".into()));
    }
    let events = state.storage.list_stop_events(&id).await?;
    Ok(Json(json!({ "events": events })))
}

// ---------------------------------------------------------------------------
// Locations and drivers

pub async fn list_locations(State(state): State<AppState>) -> Result<Json<Value>> {
    metrics::http_request("locations");
    let locations = state.storage.list_locations().await?;
    Ok(Json(json!({ "locations": locations })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLocationRequest {
    name: String,
    address: String,
    region: Region,
    entry_instruction_text: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

pub async fn create_location(
    State(state): State<AppState>,
    Json(body): Json<CreateLocationRequest>,
) -> Result<Json<Value>> {
    metrics::http_request("locations");
    let mut location = Location {
        id: String::new(),
        name: body.name,
        address: body.address,
        region: body.region,
        entry_instruction_text: body.entry_instruction_text,
        tags: body.tags,
        created_at: Utc::now(),
    };
    state.storage.create_location(&mut location).await?;
    Ok(Json(json!({ "success": true, "location": location })))
}

/// Single-field update, the one edit the apps make to a location.
#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    entry_instruction_text: Option<String>,
}

pub async fn update_location(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateLocationRequest>,
) -> Result<Json<Value>> {
    metrics::http_request("locations");
    let text = body
        .entry_instruction_text
        .ok_or_else(|| AppError::MissingField("entry_instruction_text".into()))?;
    let location = state
        .storage
        .update_entry_instruction(&id, &text)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("location {id}")))?;
    Ok(Json(json!({ "success": true, "location": location })))
}

pub async fn list_drivers(State(state): State<AppState>) -> Result<Json<Value>> {
    metrics::http_request("drivers");
    let drivers = state.storage.list_drivers().await?;
    Ok(Json(json!({ "drivers": drivers })))
}

// ---------------------------------------------------------------------------
// Notifications

#[derive(Deserialize)]
pub struct NotificationQuery {
    #[serde(rename = "targetRole")]
    target_role: Option<Role>,
    #[serde(rename = "targetId")]
    target_id: Option<String>,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<Value>> {
    metrics::http_request("notifications");
    let target = match (query.target_role, query.target_id) {
        (Some(role), Some(id)) => Some((role, id)),
        (None, None) => None,
        _ => {
            return Err(AppError::BadRequest(
                "targetRole and targetId must be given together".into(),
            ))
        }
    };
    let notifications = state.storage.list_notifications(target).await?;
    Ok(Json(json!({ "notifications": notifications })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    target_role: Role,
    target_id: String,
    channel: Channel,
    message: String,
}

pub async fn create_notification(
    State(state): State<AppState>,
    Json(body): Json<CreateNotificationRequest>,
) -> Result<Json<Value>> {
    metrics::http_request("notifications");
    let mut notification = Notification {
        id: String::new(),
        target_role: body.target_role,
        target_id: body.target_id,
        channel: body.channel,
        message: body.message,
        sent_at: Utc::now(),
    };
    state.storage.create_notification(&mut notification).await?;
    Ok(Json(json!({ "success": true, "notification": notification })))
}

// ---------------------------------------------------------------------------
// Reports

pub async fn daily_report(
    State(state): State<AppState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Value>> {
    metrics::http_request("report-daily");
    let date = parse_date(&query.date)?;
    let route_days = state.storage.list_route_days_by_date(date).await?;

    let mut rows = Vec::with_capacity(route_days.len());
    for route_day in route_days {
        let driver_name = state
            .storage
            .get_driver(&route_day.driver_id)
            .await?
            .map(|d| d.name)
            .unwrap_or_default();
        let stops = state.storage.list_stops_for_route_day(&route_day.id).await?;
        let total = stops.len();
        let completed = stops
            .iter()
            .filter(|s| s.status == StopStatus::Completed)
            .count();
        let completion_rate = if total == 0 {
            0.0
        } else {
            completed as f64 / total as f64
        };
        rows.push(json!({
            "route_day_id": route_day.id,
            "driver_id": route_day.driver_id,
            "driver_name": driver_name,
            "region": route_day.region,
            "status": route_day.status,
            "total_stops": total,
            "completed_stops": completed,
            "completion_rate": completion_rate,
        }));
    }

    Ok(Json(json!({ "date": date, "rows": rows })))
}
