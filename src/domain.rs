use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Login role. Admins manage assignments and locations; drivers work a
/// route-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Driver,
}

/// Service region: north or south.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Region {
    N,
    S,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopStatus {
    Ready,
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RouteStatus {
    Ready,
    InProgress,
    Completed,
}

/// What happened at a completed stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveredType {
    Delivered,
    Collected,
    Both,
}

impl DeliveredType {
    /// Human label used in SYSTEM stop events.
    pub fn label(&self) -> &'static str {
        match self {
            DeliveredType::Delivered => "delivered",
            DeliveredType::Collected => "collected",
            DeliveredType::Both => "delivered + collected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Note,
    System,
}

/// Outbound notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    Sms,
    Email,
    App,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub pin_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub pin_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    pub address: String,
    pub region: Region,
    pub entry_instruction_text: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// One driver's full assignment for a calendar date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDay {
    pub id: String,
    pub date: NaiveDate,
    pub region: Region,
    pub driver_id: String,
    pub window_start: NaiveTime,
    pub window_end: NaiveTime,
    pub status: RouteStatus,
    pub started_at: Option<DateTime<Utc>>,
}

/// A single delivery/pickup visit within a route-day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stop {
    pub id: String,
    pub route_day_id: String,
    pub sequence: u32,
    pub location_id: String,
    pub planned_cs: u32,
    pub planned_bt: u32,
    pub planned_ft: u32,
    pub status: StopStatus,
    pub job_started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub delivered_type: Option<DeliveredType>,
    pub created_at: DateTime<Utc>,
}

/// Stop joined with the fields of its location, the shape the `/today`
/// endpoint returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopWithLocation {
    #[serde(flatten)]
    pub stop: Stop,
    pub location_name: String,
    pub location_address: String,
    pub location_region: Region,
    pub entry_instruction_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopEvent {
    pub id: String,
    pub stop_id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub target_role: Role,
    pub target_id: String,
    pub channel: Channel,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_in_wire_form() {
        assert_eq!(
            serde_json::to_string(&StopStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        assert_eq!(
            serde_json::to_string(&DeliveredType::Both).unwrap(),
            "\"BOTH\""
        );
    }

    #[test]
    fn stop_event_type_field_is_named_type() {
        let event = StopEvent {
            id: "e1".into(),
            stop_id: "s1".into(),
            event_type: EventType::System,
            content: "stop completed: delivered".into(),
            created_at: Utc::now(),
            created_by: "system".into(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "SYSTEM");
    }
}
