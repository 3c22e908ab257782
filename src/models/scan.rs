// SPDX-License-Identifier: MIT

//! Scan model: durable proof that a (user, station) pair was credited.

use serde::{Deserialize, Serialize};

/// One completed award, stored in Firestore under the deterministic
/// document id [`Scan::doc_id`]. The id scheme is what makes a
/// (user, station) pair unique at the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
    /// Uid of the credited user
    pub user_id: String,
    /// Station that was scanned
    pub station_id: String,
    /// Snapshot of the station's point value at scan time
    pub points_earned: u32,
    /// Server-assigned timestamp (RFC 3339)
    pub scanned_at: String,
}

impl Scan {
    /// Deterministic document id for a (user, station) pair.
    ///
    /// Station ids may contain characters that are unsafe in document
    /// paths, so the station part is percent-encoded.
    pub fn doc_id(user_id: &str, station_id: &str) -> String {
        format!("{}_{}", user_id, urlencoding::encode(station_id))
    }
}
