// SPDX-License-Identifier: MIT

//! Station model: a physical check-in point worth a fixed point value.

use serde::{Deserialize, Serialize};

/// Station stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    /// Station ID (also used as document ID)
    pub id: String,
    /// Display name
    pub name: String,
    /// Description shown to attendees
    #[serde(default)]
    pub description: String,
    /// Points awarded for checking in here
    #[serde(default)]
    pub points: u32,
    /// Whether the station is currently accepting scans
    #[serde(default = "default_active")]
    pub active: bool,
    /// When the station was created (RFC 3339)
    pub created_at: String,
    /// Uid of the moderator who created it
    pub created_by: String,
}

fn default_active() -> bool {
    true
}
