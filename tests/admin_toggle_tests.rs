// SPDX-License-Identifier: MIT

//! Integration tests for the manual award/revoke path.
//!
//! The toggle is a trusted caller of the same transactional primitives the
//! scan path uses, so the one-scan-per-pair invariant and the paired
//! counter bookkeeping must hold here too.
//!
//! These tests require the Firestore emulator (FIRESTORE_EMULATOR_HOST).

use rallypoint::db::firestore::AwardOutcome;
use rallypoint::error::AppError;
use rallypoint::models::{Role, Station, User};
use rallypoint::services::ScanService;

mod common;
use common::{test_db, unique_uid};

fn test_user(uid: &str) -> User {
    User {
        uid: uid.to_string(),
        email: "toggle@example.com".to_string(),
        name: "Toggle Target".to_string(),
        role: Role::Attendee,
        total_points: 0,
        created_at: chrono::Utc::now().to_rfc3339(),
    }
}

fn test_station(id: &str, points: u32) -> Station {
    Station {
        id: id.to_string(),
        name: "Toggle Station".to_string(),
        description: String::new(),
        points,
        active: true,
        created_at: chrono::Utc::now().to_rfc3339(),
        created_by: "moderator-1".to_string(),
    }
}

#[tokio::test]
async fn test_revoke_restores_points_and_allows_rescan() {
    require_emulator!();

    let db = test_db().await;
    let uid = unique_uid("user");
    let station_id = unique_uid("station");

    db.upsert_user(&test_user(&uid)).await.unwrap();
    db.upsert_station(&test_station(&station_id, 20))
        .await
        .unwrap();
    let station = db.get_station(&station_id).await.unwrap().unwrap();

    // Award, then revoke
    db.award_scan_atomic(&uid, &station).await.unwrap();
    let removed = db.revoke_scan_atomic(&uid, &station_id).await.unwrap();
    assert_eq!(removed, Some(20));

    let user = db.get_user(&uid).await.unwrap().unwrap();
    assert_eq!(user.total_points, 0);
    assert!(db.get_scan(&uid, &station_id).await.unwrap().is_none());

    // The pair is free again: a fresh scan succeeds
    let service = ScanService::new(db.clone(), false);
    let result = service
        .check_in(
            &uid,
            &station_id,
            &format!("https://event.example.com/scan?station={}", station_id),
        )
        .await
        .unwrap();
    assert_eq!(result.points_awarded, 20);
}

#[tokio::test]
async fn test_revoke_missing_scan_is_noop() {
    require_emulator!();

    let db = test_db().await;
    let uid = unique_uid("user");
    let station_id = unique_uid("station");

    db.upsert_user(&test_user(&uid)).await.unwrap();

    let removed = db.revoke_scan_atomic(&uid, &station_id).await.unwrap();
    assert_eq!(removed, None);

    let user = db.get_user(&uid).await.unwrap().unwrap();
    assert_eq!(user.total_points, 0);
}

#[tokio::test]
async fn test_revoke_uses_snapshot_not_current_station_points() {
    require_emulator!();

    let db = test_db().await;
    let uid = unique_uid("user");
    let station_id = unique_uid("station");

    db.upsert_user(&test_user(&uid)).await.unwrap();
    db.upsert_station(&test_station(&station_id, 20))
        .await
        .unwrap();
    let station = db.get_station(&station_id).await.unwrap().unwrap();

    db.award_scan_atomic(&uid, &station).await.unwrap();

    // Reprice the station after the award
    let mut repriced = station.clone();
    repriced.points = 50;
    db.upsert_station(&repriced).await.unwrap();

    // Revoke must subtract the awarded 20, not the current 50
    let removed = db.revoke_scan_atomic(&uid, &station_id).await.unwrap();
    assert_eq!(removed, Some(20));

    let user = db.get_user(&uid).await.unwrap().unwrap();
    assert_eq!(user.total_points, 0);
}

#[tokio::test]
async fn test_revoke_floors_counter_at_zero() {
    require_emulator!();

    let db = test_db().await;
    let uid = unique_uid("user");
    let station_id = unique_uid("station");

    db.upsert_user(&test_user(&uid)).await.unwrap();
    db.upsert_station(&test_station(&station_id, 30))
        .await
        .unwrap();
    let station = db.get_station(&station_id).await.unwrap().unwrap();
    db.award_scan_atomic(&uid, &station).await.unwrap();

    // Simulate drifted state: counter below the ledger (for example a
    // partial administrative edit from an earlier app version).
    let mut user = db.get_user(&uid).await.unwrap().unwrap();
    user.total_points = 10;
    db.upsert_user(&user).await.unwrap();

    let removed = db.revoke_scan_atomic(&uid, &station_id).await.unwrap();
    assert_eq!(removed, Some(30));

    let user = db.get_user(&uid).await.unwrap().unwrap();
    assert_eq!(user.total_points, 0, "Counter must never go negative");
}

#[tokio::test]
async fn test_double_toggle_pairs_cleanly() {
    require_emulator!();

    let db = test_db().await;
    let uid = unique_uid("user");
    let station_id = unique_uid("station");

    db.upsert_user(&test_user(&uid)).await.unwrap();
    db.upsert_station(&test_station(&station_id, 15))
        .await
        .unwrap();
    let station = db.get_station(&station_id).await.unwrap().unwrap();

    // toggle on / toggle off, twice
    for _ in 0..2 {
        let outcome = db.award_scan_atomic(&uid, &station).await.unwrap();
        assert!(matches!(outcome, AwardOutcome::Awarded { .. }));
        let removed = db.revoke_scan_atomic(&uid, &station_id).await.unwrap();
        assert_eq!(removed, Some(15));
    }

    let user = db.get_user(&uid).await.unwrap().unwrap();
    let scans = db.get_scans_for_user(&uid).await.unwrap();
    assert_eq!(user.total_points, 0, "Toggling must not drift the counter");
    assert!(scans.is_empty());
}

#[tokio::test]
async fn test_second_award_after_manual_award_is_duplicate() {
    require_emulator!();

    let db = test_db().await;
    let uid = unique_uid("user");
    let station_id = unique_uid("station");

    db.upsert_user(&test_user(&uid)).await.unwrap();
    db.upsert_station(&test_station(&station_id, 15))
        .await
        .unwrap();
    let station = db.get_station(&station_id).await.unwrap().unwrap();

    // Staff manually marks the station complete...
    db.award_scan_atomic(&uid, &station).await.unwrap();

    // ...then the attendee scans it themselves.
    let service = ScanService::new(db.clone(), false);
    let err = service
        .check_in(
            &uid,
            &station_id,
            &format!("https://event.example.com/scan?station={}", station_id),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyScanned));
}
