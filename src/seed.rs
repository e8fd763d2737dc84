//! Demo fixture data: two drivers, one admin, a handful of locations, and
//! one route-day per driver for the given date.

use crate::auth::hash_pin;
use crate::domain::*;
use crate::error::Result;
use crate::storage::Storage;
use chrono::{NaiveDate, NaiveTime, Utc};
use tracing::info;

pub struct SeedSummary {
    pub drivers: usize,
    pub locations: usize,
    pub route_days: usize,
    pub stops: usize,
}

pub async fn seed_demo_data(storage: &dyn Storage, date: NaiveDate) -> Result<SeedSummary> {
    let mut admin = Admin {
        id: "admin-1".into(),
        name: "Operations".into(),
        pin_hash: hash_pin("9999"),
    };
    storage.create_admin(&mut admin).await?;

    let drivers = [
        ("driver-1", "Kim Minsoo", "010-1111-2222", "1111", Region::N),
        ("driver-2", "Lee Jiwon", "010-3333-4444", "2222", Region::S),
    ];
    for (id, name, phone, pin, _) in &drivers {
        let mut driver = Driver {
            id: (*id).into(),
            name: (*name).into(),
            phone: Some((*phone).into()),
            pin_hash: hash_pin(pin),
        };
        storage.create_driver(&mut driver).await?;
    }

    let locations = [
        ("loc-1", "Harborview Suites", "14 Quay St", Region::N, Some("Gate code 4821, loading dock on the left"), vec!["hotel"]),
        ("loc-2", "Maple Guesthouse", "88 Maple Ave", Region::N, None, vec!["guesthouse"]),
        ("loc-3", "Cedar Springs Spa", "302 Cedar Rd", Region::N, Some("Ring the service bell twice"), vec!["spa", "priority"]),
        ("loc-4", "Riverside Inn", "7 River Walk", Region::S, None, vec!["inn"]),
        ("loc-5", "South Garden Hotel", "120 Garden Blvd", Region::S, Some("Use the staff elevator, B1"), vec!["hotel"]),
        ("loc-6", "Lakeside Pension", "5 Lakeside Loop", Region::S, None, vec!["pension"]),
    ];
    for (id, name, address, region, instruction, tags) in &locations {
        let mut location = Location {
            id: (*id).into(),
            name: (*name).into(),
            address: (*address).into(),
            region: *region,
            entry_instruction_text: instruction.map(str::to_string),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            created_at: Utc::now(),
        };
        storage.create_location(&mut location).await?;
    }

    let window_start = NaiveTime::from_hms_opt(11, 30, 0).unwrap();
    let window_end = NaiveTime::from_hms_opt(14, 30, 0).unwrap();

    let mut stop_count = 0;
    let mut route_day_count = 0;
    for (driver_index, (driver_id, _, _, _, region)) in drivers.iter().enumerate() {
        let mut route_day = RouteDay {
            id: format!("rd-{}", driver_index + 1),
            date,
            region: *region,
            driver_id: (*driver_id).into(),
            window_start,
            window_end,
            status: RouteStatus::Ready,
            started_at: None,
        };
        storage.create_route_day(&mut route_day).await?;
        route_day_count += 1;

        let assigned: Vec<_> = locations
            .iter()
            .filter(|(_, _, _, location_region, _, _)| location_region == region)
            .collect();
        for (sequence, (location_id, ..)) in assigned.iter().enumerate() {
            let mut stop = Stop {
                id: format!("stop-{}-{}", driver_index + 1, sequence + 1),
                route_day_id: route_day.id.clone(),
                sequence: sequence as u32 + 1,
                location_id: (*location_id).into(),
                planned_cs: 2,
                planned_bt: 1,
                planned_ft: if sequence % 2 == 0 { 1 } else { 0 },
                status: StopStatus::Ready,
                job_started_at: None,
                completed_at: None,
                delivered_type: None,
                created_at: Utc::now(),
            };
            storage.create_stop(&mut stop).await?;
            stop_count += 1;
        }
    }

    info!(
        "Seeded demo data: {} drivers, {} locations, {} route days, {} stops",
        drivers.len(),
        locations.len(),
        route_day_count,
        stop_count
    );

    Ok(SeedSummary {
        drivers: drivers.len(),
        locations: locations.len(),
        route_days: route_day_count,
        stops: stop_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;

    #[tokio::test]
    async fn seed_builds_a_route_day_per_driver() {
        let storage = InMemoryStorage::new();
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let summary = seed_demo_data(&storage, date).await.unwrap();
        assert_eq!(summary.drivers, 2);
        assert_eq!(summary.route_days, 2);

        let route_day = storage
            .get_route_day_for_driver(date, "driver-1")
            .await
            .unwrap()
            .expect("driver-1 has a route");
        let stops = storage
            .list_stops_for_route_day(&route_day.id)
            .await
            .unwrap();
        assert_eq!(stops.len(), 3);
    }
}
