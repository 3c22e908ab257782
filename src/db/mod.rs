// SPDX-License-Identifier: MIT

//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const STATIONS: &str = "stations";
    /// Award records, keyed by `{uid}_{station_id}`
    pub const SCANS: &str = "scans";
}
