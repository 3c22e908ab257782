// SPDX-License-Identifier: MIT

//! Race test for the award transaction.
//!
//! Several concurrent check-ins for the same (user, station) pair can all
//! pass the pre-flight duplicate check before any of them commits. The
//! re-read inside the award transaction must let exactly one commit; every
//! other attempt must come back as a duplicate, and the user must be
//! credited exactly once.

use rallypoint::db::firestore::AwardOutcome;
use rallypoint::models::{Role, Station, User};

mod common;
use common::{test_db, unique_uid};

const NUM_CONCURRENT_SCANS: usize = 10;
const STATION_POINTS: u32 = 20;

#[tokio::test]
async fn test_concurrent_scans_award_exactly_once() {
    require_emulator!();

    let db = test_db().await;
    let uid = unique_uid("racer");
    let station_id = unique_uid("station");

    let user = User {
        uid: uid.clone(),
        email: "race@example.com".to_string(),
        name: "Race Condition".to_string(),
        role: Role::Attendee,
        total_points: 0,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    db.upsert_user(&user).await.expect("Failed to create user");

    let station = Station {
        id: station_id.clone(),
        name: "Contended Station".to_string(),
        description: String::new(),
        points: STATION_POINTS,
        active: true,
        created_at: chrono::Utc::now().to_rfc3339(),
        created_by: "moderator-1".to_string(),
    };
    db.upsert_station(&station)
        .await
        .expect("Failed to create station");

    let mut handles = vec![];

    for _ in 0..NUM_CONCURRENT_SCANS {
        let db_clone = db.clone();
        let uid_clone = uid.clone();
        let station_clone = station.clone();
        handles.push(tokio::spawn(async move {
            db_clone.award_scan_atomic(&uid_clone, &station_clone).await
        }));
    }

    let mut awarded = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.expect("Task join failed").expect("Award failed") {
            AwardOutcome::Awarded { points, .. } => {
                assert_eq!(points, STATION_POINTS);
                awarded += 1;
            }
            AwardOutcome::Duplicate => duplicates += 1,
        }
    }

    assert_eq!(awarded, 1, "Exactly one concurrent scan must win");
    assert_eq!(duplicates, NUM_CONCURRENT_SCANS - 1);

    // One scan record, one station's worth of points
    let scans = db.get_scans_for_user(&uid).await.unwrap();
    assert_eq!(scans.len(), 1, "Duplicate scan records created by race");

    let user = db.get_user(&uid).await.unwrap().unwrap();
    assert_eq!(
        user.total_points, STATION_POINTS,
        "Points double-counted by race"
    );
}

#[tokio::test]
async fn test_concurrent_scans_across_stations_all_count() {
    require_emulator!();

    let db = test_db().await;
    let uid = unique_uid("multi");

    let user = User {
        uid: uid.clone(),
        email: "multi@example.com".to_string(),
        name: "Multi Station".to_string(),
        role: Role::Attendee,
        total_points: 0,
        created_at: chrono::Utc::now().to_rfc3339(),
    };
    db.upsert_user(&user).await.expect("Failed to create user");

    // Scans of different stations in quick succession must not lose updates
    // to the shared counter.
    let mut handles = vec![];
    for i in 0..NUM_CONCURRENT_SCANS {
        let station = Station {
            id: unique_uid(&format!("station-{}", i)),
            name: format!("Station {}", i),
            description: String::new(),
            points: STATION_POINTS,
            active: true,
            created_at: chrono::Utc::now().to_rfc3339(),
            created_by: "moderator-1".to_string(),
        };
        db.upsert_station(&station)
            .await
            .expect("Failed to create station");

        let db_clone = db.clone();
        let uid_clone = uid.clone();
        handles.push(tokio::spawn(async move {
            db_clone.award_scan_atomic(&uid_clone, &station).await
        }));
    }

    for handle in handles {
        let outcome = handle.await.expect("Task join failed").expect("Award failed");
        assert!(matches!(outcome, AwardOutcome::Awarded { .. }));
    }

    let user = db.get_user(&uid).await.unwrap().unwrap();
    assert_eq!(
        user.total_points,
        STATION_POINTS * NUM_CONCURRENT_SCANS as u32,
        "Lost update on the shared counter"
    );
}
