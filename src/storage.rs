use crate::domain::*;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// Storage trait for the delivery route data. Handlers only ever see this
/// trait; the shipped implementation is in-memory, matching the mock data
/// layer the service was built against.
#[async_trait]
pub trait Storage: Send + Sync {
    // People
    async fn create_driver(&self, driver: &mut Driver) -> Result<()>;
    async fn create_admin(&self, admin: &mut Admin) -> Result<()>;
    async fn get_driver(&self, id: &str) -> Result<Option<Driver>>;
    async fn get_admin(&self, id: &str) -> Result<Option<Admin>>;
    async fn list_drivers(&self) -> Result<Vec<Driver>>;

    // Locations
    async fn create_location(&self, location: &mut Location) -> Result<()>;
    async fn get_location(&self, id: &str) -> Result<Option<Location>>;
    async fn list_locations(&self) -> Result<Vec<Location>>;
    async fn update_entry_instruction(&self, id: &str, text: &str) -> Result<Option<Location>>;

    // Route days
    async fn create_route_day(&self, route_day: &mut RouteDay) -> Result<()>;
    async fn get_route_day(&self, id: &str) -> Result<Option<RouteDay>>;
    async fn get_route_day_for_driver(
        &self,
        date: NaiveDate,
        driver_id: &str,
    ) -> Result<Option<RouteDay>>;
    async fn list_route_days_by_date(&self, date: NaiveDate) -> Result<Vec<RouteDay>>;
    async fn start_route_day(&self, id: &str, at: DateTime<Utc>) -> Result<Option<RouteDay>>;

    // Stops
    async fn create_stop(&self, stop: &mut Stop) -> Result<()>;
    async fn get_stop(&self, id: &str) -> Result<Option<Stop>>;
    /// Stops of a route-day ordered by sequence.
    async fn list_stops_for_route_day(&self, route_day_id: &str) -> Result<Vec<Stop>>;
    async fn update_stop_status(
        &self,
        id: &str,
        status: StopStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Stop>>;
    async fn complete_stop(
        &self,
        id: &str,
        delivered_type: DeliveredType,
        at: DateTime<Utc>,
    ) -> Result<Option<Stop>>;
    /// Reassigns sequence numbers following the given id order. Ids not
    /// belonging to the route-day are ignored.
    async fn reorder_stops(&self, route_day_id: &str, ordered_ids: &[String]) -> Result<Vec<Stop>>;

    // Stop events
    async fn create_stop_event(&self, event: &mut StopEvent) -> Result<()>;
    async fn list_stop_events(&self, stop_id: &str) -> Result<Vec<StopEvent>>;

    // Notifications
    async fn create_notification(&self, notification: &mut Notification) -> Result<()>;
    async fn list_notifications(
        &self,
        target: Option<(Role, String)>,
    ) -> Result<Vec<Notification>>;
}

fn ensure_id(id: &mut String) {
    if id.is_empty() {
        *id = Uuid::new_v4().to_string();
    }
}

/// In-memory storage implementation for development/testing.
pub struct InMemoryStorage {
    drivers: Arc<Mutex<HashMap<String, Driver>>>,
    admins: Arc<Mutex<HashMap<String, Admin>>>,
    locations: Arc<Mutex<HashMap<String, Location>>>,
    route_days: Arc<Mutex<HashMap<String, RouteDay>>>,
    stops: Arc<Mutex<HashMap<String, Stop>>>,
    stop_events: Arc<Mutex<HashMap<String, StopEvent>>>,
    notifications: Arc<Mutex<HashMap<String, Notification>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            drivers: Arc::new(Mutex::new(HashMap::new())),
            admins: Arc::new(Mutex::new(HashMap::new())),
            locations: Arc::new(Mutex::new(HashMap::new())),
            route_days: Arc::new(Mutex::new(HashMap::new())),
            stops: Arc::new(Mutex::new(HashMap::new())),
            stop_events: Arc::new(Mutex::new(HashMap::new())),
            notifications: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn create_driver(&self, driver: &mut Driver) -> Result<()> {
        ensure_id(&mut driver.id);
        let mut drivers = self.drivers.lock().unwrap();
        debug!("Created driver {} ({})", driver.name, driver.id);
        drivers.insert(driver.id.clone(), driver.clone());
        Ok(())
    }

    async fn create_admin(&self, admin: &mut Admin) -> Result<()> {
        ensure_id(&mut admin.id);
        let mut admins = self.admins.lock().unwrap();
        debug!("Created admin {} ({})", admin.name, admin.id);
        admins.insert(admin.id.clone(), admin.clone());
        Ok(())
    }

    async fn get_driver(&self, id: &str) -> Result<Option<Driver>> {
        Ok(self.drivers.lock().unwrap().get(id).cloned())
    }

    async fn get_admin(&self, id: &str) -> Result<Option<Admin>> {
        Ok(self.admins.lock().unwrap().get(id).cloned())
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>> {
        let mut drivers: Vec<_> = self.drivers.lock().unwrap().values().cloned().collect();
        drivers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(drivers)
    }

    async fn create_location(&self, location: &mut Location) -> Result<()> {
        ensure_id(&mut location.id);
        let mut locations = self.locations.lock().unwrap();
        debug!("Created location {} ({})", location.name, location.id);
        locations.insert(location.id.clone(), location.clone());
        Ok(())
    }

    async fn get_location(&self, id: &str) -> Result<Option<Location>> {
        Ok(self.locations.lock().unwrap().get(id).cloned())
    }

    async fn list_locations(&self) -> Result<Vec<Location>> {
        let mut locations: Vec<_> = self.locations.lock().unwrap().values().cloned().collect();
        locations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(locations)
    }

    async fn update_entry_instruction(&self, id: &str, text: &str) -> Result<Option<Location>> {
        let mut locations = self.locations.lock().unwrap();
        Ok(locations.get_mut(id).map(|location| {
            location.entry_instruction_text = Some(text.to_string());
            location.clone()
        }))
    }

    async fn create_route_day(&self, route_day: &mut RouteDay) -> Result<()> {
        ensure_id(&mut route_day.id);
        let mut route_days = self.route_days.lock().unwrap();
        debug!(
            "Created route day {} for driver {} on {}",
            route_day.id, route_day.driver_id, route_day.date
        );
        route_days.insert(route_day.id.clone(), route_day.clone());
        Ok(())
    }

    async fn get_route_day(&self, id: &str) -> Result<Option<RouteDay>> {
        Ok(self.route_days.lock().unwrap().get(id).cloned())
    }

    async fn get_route_day_for_driver(
        &self,
        date: NaiveDate,
        driver_id: &str,
    ) -> Result<Option<RouteDay>> {
        let route_days = self.route_days.lock().unwrap();
        Ok(route_days
            .values()
            .find(|r| r.date == date && r.driver_id == driver_id)
            .cloned())
    }

    async fn list_route_days_by_date(&self, date: NaiveDate) -> Result<Vec<RouteDay>> {
        let route_days = self.route_days.lock().unwrap();
        let mut matching: Vec<_> = route_days
            .values()
            .filter(|r| r.date == date)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.driver_id.cmp(&b.driver_id));
        Ok(matching)
    }

    async fn start_route_day(&self, id: &str, at: DateTime<Utc>) -> Result<Option<RouteDay>> {
        let mut route_days = self.route_days.lock().unwrap();
        Ok(route_days.get_mut(id).map(|route_day| {
            route_day.status = RouteStatus::InProgress;
            route_day.started_at = Some(at);
            route_day.clone()
        }))
    }

    async fn create_stop(&self, stop: &mut Stop) -> Result<()> {
        ensure_id(&mut stop.id);
        let mut stops = self.stops.lock().unwrap();
        stops.insert(stop.id.clone(), stop.clone());
        Ok(())
    }

    async fn get_stop(&self, id: &str) -> Result<Option<Stop>> {
        Ok(self.stops.lock().unwrap().get(id).cloned())
    }

    async fn list_stops_for_route_day(&self, route_day_id: &str) -> Result<Vec<Stop>> {
        let stops = self.stops.lock().unwrap();
        let mut matching: Vec<_> = stops
            .values()
            .filter(|s| s.route_day_id == route_day_id)
            .cloned()
            .collect();
        matching.sort_by_key(|s| s.sequence);
        Ok(matching)
    }

    async fn update_stop_status(
        &self,
        id: &str,
        status: StopStatus,
        at: DateTime<Utc>,
    ) -> Result<Option<Stop>> {
        let mut stops = self.stops.lock().unwrap();
        Ok(stops.get_mut(id).map(|stop| {
            stop.status = status;
            if status == StopStatus::InProgress && stop.job_started_at.is_none() {
                stop.job_started_at = Some(at);
            }
            stop.clone()
        }))
    }

    async fn complete_stop(
        &self,
        id: &str,
        delivered_type: DeliveredType,
        at: DateTime<Utc>,
    ) -> Result<Option<Stop>> {
        let mut stops = self.stops.lock().unwrap();
        Ok(stops.get_mut(id).map(|stop| {
            stop.status = StopStatus::Completed;
            stop.completed_at = Some(at);
            stop.delivered_type = Some(delivered_type);
            debug!("Completed stop {} as {}", stop.id, delivered_type.label());
            stop.clone()
        }))
    }

    async fn reorder_stops(&self, route_day_id: &str, ordered_ids: &[String]) -> Result<Vec<Stop>> {
        let mut stops = self.stops.lock().unwrap();
        for (index, stop_id) in ordered_ids.iter().enumerate() {
            if let Some(stop) = stops.get_mut(stop_id) {
                if stop.route_day_id == route_day_id {
                    stop.sequence = index as u32 + 1;
                }
            }
        }
        let mut reordered: Vec<_> = stops
            .values()
            .filter(|s| s.route_day_id == route_day_id)
            .cloned()
            .collect();
        reordered.sort_by_key(|s| s.sequence);
        Ok(reordered)
    }

    async fn create_stop_event(&self, event: &mut StopEvent) -> Result<()> {
        ensure_id(&mut event.id);
        let mut events = self.stop_events.lock().unwrap();
        events.insert(event.id.clone(), event.clone());
        Ok(())
    }

    async fn list_stop_events(&self, stop_id: &str) -> Result<Vec<StopEvent>> {
        let events = self.stop_events.lock().unwrap();
        let mut matching: Vec<_> = events
            .values()
            .filter(|e| e.stop_id == stop_id)
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.created_at);
        Ok(matching)
    }

    async fn create_notification(&self, notification: &mut Notification) -> Result<()> {
        ensure_id(&mut notification.id);
        let mut notifications = self.notifications.lock().unwrap();
        notifications.insert(notification.id.clone(), notification.clone());
        Ok(())
    }

    async fn list_notifications(
        &self,
        target: Option<(Role, String)>,
    ) -> Result<Vec<Notification>> {
        let notifications = self.notifications.lock().unwrap();
        let mut matching: Vec<_> = notifications
            .values()
            .filter(|n| match &target {
                Some((role, id)) => n.target_role == *role && n.target_id == *id,
                None => true,
            })
            .cloned()
            .collect();
        matching.sort_by_key(|n| n.sent_at);
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn stop(route_day_id: &str, sequence: u32) -> Stop {
        Stop {
            id: String::new(),
            route_day_id: route_day_id.to_string(),
            sequence,
            location_id: "loc-1".into(),
            planned_cs: 1,
            planned_bt: 0,
            planned_ft: 0,
            status: StopStatus::Ready,
            job_started_at: None,
            completed_at: None,
            delivered_type: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn stops_list_in_sequence_order() {
        let storage = InMemoryStorage::new();
        for sequence in [3, 1, 2] {
            storage.create_stop(&mut stop("rd-1", sequence)).await.unwrap();
        }
        let stops = storage.list_stops_for_route_day("rd-1").await.unwrap();
        let sequences: Vec<_> = stops.iter().map(|s| s.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn completing_a_stop_stamps_time_and_type() {
        let storage = InMemoryStorage::new();
        let mut s = stop("rd-1", 1);
        storage.create_stop(&mut s).await.unwrap();
        let at = Utc::now();
        let completed = storage
            .complete_stop(&s.id, DeliveredType::Both, at)
            .await
            .unwrap()
            .expect("stop exists");
        assert_eq!(completed.status, StopStatus::Completed);
        assert_eq!(completed.completed_at, Some(at));
        assert_eq!(completed.delivered_type, Some(DeliveredType::Both));
    }

    #[tokio::test]
    async fn reorder_renumbers_only_the_route_days_stops() {
        let storage = InMemoryStorage::new();
        let mut a = stop("rd-1", 1);
        let mut b = stop("rd-1", 2);
        let mut other = stop("rd-2", 1);
        storage.create_stop(&mut a).await.unwrap();
        storage.create_stop(&mut b).await.unwrap();
        storage.create_stop(&mut other).await.unwrap();

        let reordered = storage
            .reorder_stops("rd-1", &[b.id.clone(), a.id.clone(), other.id.clone()])
            .await
            .unwrap();
        assert_eq!(reordered[0].id, b.id);
        assert_eq!(reordered[0].sequence, 1);
        assert_eq!(reordered[1].id, a.id);
        assert_eq!(reordered[1].sequence, 2);
        assert_eq!(
            storage.get_stop(&other.id).await.unwrap().unwrap().sequence,
            1
        );
    }

    #[tokio::test]
    async fn route_day_lookup_by_driver_and_date() {
        let storage = InMemoryStorage::new();
        let mut route_day = RouteDay {
            id: String::new(),
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            region: Region::N,
            driver_id: "driver-1".into(),
            window_start: NaiveTime::from_hms_opt(11, 30, 0).unwrap(),
            window_end: NaiveTime::from_hms_opt(14, 30, 0).unwrap(),
            status: RouteStatus::Ready,
            started_at: None,
        };
        storage.create_route_day(&mut route_day).await.unwrap();

        let found = storage
            .get_route_day_for_driver(route_day.date, "driver-1")
            .await
            .unwrap();
        assert!(found.is_some());
        let missing = storage
            .get_route_day_for_driver(route_day.date, "driver-2")
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
