// SPDX-License-Identifier: MIT

//! Station check-in service.
//!
//! The core workflow, in order:
//! 1. Parse the decoded QR payload and extract the `station` parameter
//! 2. Check it against the station the screen is bound to
//! 3. Load the station and apply the active-station policy
//! 4. Pre-flight duplicate check
//! 5. Atomic award transaction (which re-checks the duplicate)
//!
//! Each step short-circuits with its own rejection; no state changes on any
//! failure path.

use crate::db::firestore::AwardOutcome;
use crate::db::FirestoreDb;
use crate::error::{AppError, Result};

/// Query parameter carrying the station id in generated QR codes,
/// e.g. `https://event.example.com/scan?station=booth-42`.
const STATION_PARAM: &str = "station";

/// Result of a successful check-in.
#[derive(Debug, Clone, Copy)]
pub struct CheckInResult {
    pub points_awarded: u32,
    pub total_points: u32,
}

/// Validates scanned QR payloads and awards points.
pub struct ScanService {
    db: FirestoreDb,
    allow_inactive: bool,
}

impl ScanService {
    pub fn new(db: FirestoreDb, allow_inactive: bool) -> Self {
        Self { db, allow_inactive }
    }

    /// Validate a scanned payload and award the station's points to the user.
    ///
    /// `expected_station_id` is the station the scanning screen was opened
    /// for; a payload naming any other station is rejected, so a QR code
    /// cannot be redeemed against a different station's screen.
    pub async fn check_in(
        &self,
        user_id: &str,
        expected_station_id: &str,
        payload: &str,
    ) -> Result<CheckInResult> {
        // 1. Format check
        let scanned_station_id = parse_station_payload(payload).ok_or_else(|| {
            tracing::debug!(user_id, "Scan payload not recognized");
            AppError::InvalidPayload
        })?;

        // 2. Binding check: exact string equality
        if scanned_station_id != expected_station_id {
            tracing::debug!(
                user_id,
                expected = expected_station_id,
                scanned = %scanned_station_id,
                "Scanned QR targets a different station"
            );
            return Err(AppError::StationMismatch);
        }

        // 3. Existence check
        let station = self
            .db
            .get_station(expected_station_id)
            .await?
            .ok_or(AppError::StationNotFound)?;

        if !station.active && !self.allow_inactive {
            return Err(AppError::StationInactive);
        }

        // 4. Pre-flight duplicate check for a fast rejection. Not
        //    authoritative: the award transaction re-checks under
        //    conflict detection.
        if self
            .db
            .get_scan(user_id, expected_station_id)
            .await?
            .is_some()
        {
            return Err(AppError::AlreadyScanned);
        }

        // 5. Atomic award
        match self.db.award_scan_atomic(user_id, &station).await? {
            AwardOutcome::Awarded {
                points,
                total_points,
            } => {
                tracing::info!(
                    user_id,
                    station_id = %station.id,
                    points,
                    "Check-in complete"
                );
                Ok(CheckInResult {
                    points_awarded: points,
                    total_points,
                })
            }
            // Lost the race to a concurrent scan of the same pair.
            AwardOutcome::Duplicate => Err(AppError::AlreadyScanned),
        }
    }
}

/// Extract the station id from a decoded QR payload.
///
/// Payloads are URL-shaped strings whose query string carries a `station`
/// parameter. Anything without that parameter (plain text, other URLs) is
/// not a station reference. The value is percent-decoded; an empty value
/// does not count.
pub fn parse_station_payload(payload: &str) -> Option<String> {
    let (_, query) = payload.split_once('?')?;
    // Anchors are not part of the query string.
    let query = query.split('#').next().unwrap_or(query);

    for pair in query.split('&') {
        let (key, value) = match pair.split_once('=') {
            Some(kv) => kv,
            None => continue,
        };
        if key == STATION_PARAM && !value.is_empty() {
            return urlencoding::decode(value).ok().map(|s| s.into_owned());
        }
    }

    None
}
