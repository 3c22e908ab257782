// SPDX-License-Identifier: MIT

//! Management routes for moderators: station CRUD, attendee roster, and the
//! manual award/revoke toggle.

use crate::db::firestore::AwardOutcome;
use crate::error::{AppError, Result};
use crate::middleware::auth::{load_role, AuthUser};
use crate::models::{Role, Station};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Extension, Json, Router,
};
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Moderator routes. Auth middleware is applied in routes/mod.rs; the role
/// check happens here against the user document.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/manage/stations", post(create_station))
        .route(
            "/api/manage/stations/{id}",
            put(update_station).delete(remove_station),
        )
        .route("/api/manage/stations/{id}/scans", get(get_station_scans))
        .route("/api/manage/attendees", get(get_attendees))
        .route(
            "/api/manage/attendees/{uid}/stations/{id}/toggle",
            post(toggle_station_progress),
        )
}

/// Reject callers below moderator.
async fn require_moderator(state: &AppState, auth: &AuthUser) -> Result<()> {
    if load_role(state, &auth.uid).await? >= Role::Moderator {
        Ok(())
    } else {
        tracing::warn!(uid = %auth.uid, "Blocked non-moderator management request");
        Err(AppError::Forbidden)
    }
}

// ─── Station CRUD ────────────────────────────────────────────

#[derive(Deserialize)]
pub struct StationRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub points: u32,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StationResponse {
    pub id: String,
    pub name: String,
    pub description: String,
    pub points: u32,
    pub active: bool,
    pub created_at: String,
}

impl From<Station> for StationResponse {
    fn from(s: Station) -> Self {
        Self {
            id: s.id,
            name: s.name,
            description: s.description,
            points: s.points,
            active: s.active,
            created_at: s.created_at,
        }
    }
}

/// Create a station. The generated id is what gets baked into QR codes.
async fn create_station(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<StationRequest>,
) -> Result<Json<StationResponse>> {
    require_moderator(&state, &auth).await?;

    if request.name.trim().is_empty() {
        return Err(AppError::BadRequest("Station name is required".to_string()));
    }

    let station = Station {
        id: new_station_id(),
        name: request.name,
        description: request.description,
        points: request.points,
        active: request.active,
        created_at: chrono::Utc::now().to_rfc3339(),
        created_by: auth.uid.clone(),
    };

    state.db.upsert_station(&station).await?;

    tracing::info!(
        station_id = %station.id,
        points = station.points,
        created_by = %auth.uid,
        "Station created"
    );

    Ok(Json(station.into()))
}

/// Update a station's fields. Existing scans keep the point value they
/// recorded at award time.
async fn update_station(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(station_id): Path<String>,
    Json(request): Json<StationRequest>,
) -> Result<Json<StationResponse>> {
    require_moderator(&state, &auth).await?;

    let mut station = state
        .db
        .get_station(&station_id)
        .await?
        .ok_or(AppError::StationNotFound)?;

    station.name = request.name;
    station.description = request.description;
    station.points = request.points;
    station.active = request.active;

    state.db.upsert_station(&station).await?;

    Ok(Json(station.into()))
}

#[derive(Deserialize)]
struct RemoveStationQuery {
    /// Delete the document instead of deactivating it
    #[serde(default)]
    hard: bool,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RemoveStationResponse {
    pub id: String,
    pub deleted: bool,
}

/// Deactivate a station, or delete it outright with `?hard=true`.
///
/// Deactivation is the default so scan history keeps a station to refer to.
async fn remove_station(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(station_id): Path<String>,
    Query(params): Query<RemoveStationQuery>,
) -> Result<Json<RemoveStationResponse>> {
    require_moderator(&state, &auth).await?;

    let mut station = state
        .db
        .get_station(&station_id)
        .await?
        .ok_or(AppError::StationNotFound)?;

    if params.hard {
        state.db.delete_station(&station_id).await?;
        tracing::info!(station_id = %station_id, by = %auth.uid, "Station deleted");
    } else {
        station.active = false;
        state.db.upsert_station(&station).await?;
        tracing::info!(station_id = %station_id, by = %auth.uid, "Station deactivated");
    }

    Ok(Json(RemoveStationResponse {
        id: station_id,
        deleted: params.hard,
    }))
}

// ─── Station Scans ───────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StationScanEntry {
    pub user_id: String,
    pub user_name: String,
    pub points_earned: u32,
    pub scanned_at: String,
}

/// Who checked in at a station, joined with user names.
async fn get_station_scans(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path(station_id): Path<String>,
) -> Result<Json<Vec<StationScanEntry>>> {
    require_moderator(&state, &auth).await?;

    let scans = state.db.get_scans_for_station(&station_id).await?;

    // Join with user names using bounded concurrency to avoid overloading
    // Firestore with one lookup per scan.
    let db = state.db.clone();
    let entries: Vec<Result<StationScanEntry>> = stream::iter(scans)
        .map(|scan| {
            let db = db.clone();
            async move {
                let user_name = db
                    .get_user(&scan.user_id)
                    .await?
                    .map(|u| u.name)
                    .unwrap_or_else(|| "(deleted)".to_string());
                Ok(StationScanEntry {
                    user_id: scan.user_id,
                    user_name,
                    points_earned: scan.points_earned,
                    scanned_at: scan.scanned_at,
                })
            }
        })
        .buffer_unordered(MAX_CONCURRENT_DB_OPS)
        .collect()
        .await;

    let mut entries = entries.into_iter().collect::<Result<Vec<_>>>()?;
    entries.sort_by(|a, b| b.scanned_at.cmp(&a.scanned_at));

    Ok(Json(entries))
}

// ─── Attendee Roster ─────────────────────────────────────────

const ROSTER_LIMIT: u32 = 1000;

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AttendeeEntry {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub total_points: u32,
}

/// Attendee roster with current point totals.
async fn get_attendees(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<AttendeeEntry>>> {
    require_moderator(&state, &auth).await?;

    let users = state.db.list_users(ROSTER_LIMIT).await?;
    let entries = users
        .into_iter()
        .filter(|u| u.role == Role::Attendee)
        .map(|u| AttendeeEntry {
            uid: u.uid,
            name: u.name,
            email: u.email,
            total_points: u.total_points,
        })
        .collect();

    Ok(Json(entries))
}

// ─── Manual Toggle ───────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ToggleResponse {
    /// True if the toggle awarded the station, false if it revoked it
    pub awarded: bool,
    pub points: u32,
}

/// Manually mark or un-mark an attendee's completion of a station.
///
/// Trusted entry into the same award/revoke primitives the scan path uses:
/// no payload validation, but the one-scan-per-pair invariant and the paired
/// counter adjustment still hold because both directions run as single
/// transactions. Deactivated stations can be toggled; staff override the
/// scan policy by design of this endpoint.
async fn toggle_station_progress(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Path((uid, station_id)): Path<(String, String)>,
) -> Result<Json<ToggleResponse>> {
    require_moderator(&state, &auth).await?;

    if let Some(points) = state.db.revoke_scan_atomic(&uid, &station_id).await? {
        tracing::info!(uid = %uid, station_id = %station_id, by = %auth.uid, "Manual revoke");
        return Ok(Json(ToggleResponse {
            awarded: false,
            points,
        }));
    }

    let station = state
        .db
        .get_station(&station_id)
        .await?
        .ok_or(AppError::StationNotFound)?;

    match state.db.award_scan_atomic(&uid, &station).await? {
        AwardOutcome::Awarded { points, .. } => {
            tracing::info!(uid = %uid, station_id = %station_id, by = %auth.uid, "Manual award");
            Ok(Json(ToggleResponse {
                awarded: true,
                points,
            }))
        }
        // A concurrent scan landed between our revoke check and the award;
        // the pair is complete either way.
        AwardOutcome::Duplicate => Err(AppError::AlreadyScanned),
    }
}

/// Generate a station id: short, URL-safe, unique enough for one event.
fn new_station_id() -> String {
    format!("st-{:x}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_ids_are_url_safe() {
        let id = new_station_id();
        assert!(id.starts_with("st-"));
        assert!(id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-'));
    }

    #[test]
    fn test_station_ids_differ() {
        assert_ne!(new_station_id(), new_station_id());
    }
}
