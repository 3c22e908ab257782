// SPDX-License-Identifier: MIT

//! API routes for authenticated attendees.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::models::{Role, Scan, User};
use crate::services::ScanService;
use crate::AppState;
use axum::{
    extract::{Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const DEFAULT_LEADERBOARD_LIMIT: u32 = 25;
const MAX_LEADERBOARD_LIMIT: u32 = 100;

/// Attendee routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/scan", post(submit_scan))
        .route("/api/scans", get(get_scans))
        .route("/api/stations", get(get_stations))
        .route("/api/leaderboard", get(get_leaderboard))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub uid: String,
    pub email: String,
    pub name: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub role: Role,
    pub total_points: u32,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            uid: user.uid,
            email: user.email,
            name: user.name,
            role: user.role,
            total_points: user.total_points,
        }
    }
}

/// Get the current user's profile, creating it on first login.
///
/// New profiles start as attendees with zero points; email and name come
/// from the identity provider's token claims when present.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    if let Some(user) = state.db.get_user(&auth.uid).await? {
        return Ok(Json(user.into()));
    }

    let user = User::new_attendee(
        &auth.uid,
        auth.email.as_deref().unwrap_or(""),
        auth.name.as_deref().unwrap_or("Attendee"),
    );
    state.db.upsert_user(&user).await?;

    tracing::info!(uid = %auth.uid, "Created profile on first login");

    Ok(Json(user.into()))
}

// ─── Check-in ────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ScanRequest {
    /// Raw decoded string from the QR scanner
    pub payload: String,
    /// Station the scanning screen was opened for
    pub station_id: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ScanResponse {
    pub points_awarded: u32,
    pub total_points: u32,
}

/// Validate a scanned QR payload and award the station's points.
async fn submit_scan(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(request): Json<ScanRequest>,
) -> Result<Json<ScanResponse>> {
    tracing::debug!(
        uid = %auth.uid,
        station_id = %request.station_id,
        "Check-in attempt"
    );

    let service = ScanService::new(state.db.clone(), state.config.allow_inactive_scans);
    let result = service
        .check_in(&auth.uid, &request.station_id, &request.payload)
        .await?;

    Ok(Json(ScanResponse {
        points_awarded: result.points_awarded,
        total_points: result.total_points,
    }))
}

// ─── Scan History ────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ScanSummary {
    pub station_id: String,
    pub points_earned: u32,
    pub scanned_at: String,
}

impl From<Scan> for ScanSummary {
    fn from(scan: Scan) -> Self {
        Self {
            station_id: scan.station_id,
            points_earned: scan.points_earned,
            scanned_at: scan.scanned_at,
        }
    }
}

/// Get the acting user's scan history, most recent first.
async fn get_scans(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<ScanSummary>>> {
    let scans = state.db.get_scans_for_user(&auth.uid).await?;
    Ok(Json(scans.into_iter().map(Into::into).collect()))
}

// ─── Stations ────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StationSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub points: u32,
    /// Whether the acting user has already checked in here
    pub scanned: bool,
}

/// List active stations with the acting user's completion state.
async fn get_stations(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<StationSummary>>> {
    let stations = state.db.list_stations().await?;
    let scanned: HashSet<String> = state
        .db
        .get_scans_for_user(&auth.uid)
        .await?
        .into_iter()
        .map(|s| s.station_id)
        .collect();

    let summaries = stations
        .into_iter()
        .filter(|s| s.active)
        .map(|s| StationSummary {
            scanned: scanned.contains(&s.id),
            id: s.id,
            name: s.name,
            description: s.description,
            points: s.points,
        })
        .collect();

    Ok(Json(summaries))
}

// ─── Leaderboard ─────────────────────────────────────────────

#[derive(Deserialize)]
struct LeaderboardQuery {
    limit: Option<u32>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LeaderboardEntry {
    pub name: String,
    pub total_points: u32,
}

/// Top attendees by total points.
async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LeaderboardQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .min(MAX_LEADERBOARD_LIMIT);

    let users = state.db.list_users(limit).await?;

    let entries = users
        .into_iter()
        .filter(|u| u.role == Role::Attendee)
        .map(|u| LeaderboardEntry {
            name: u.name,
            total_points: u.total_points,
        })
        .collect();

    Ok(Json(entries))
}
