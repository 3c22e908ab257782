// SPDX-License-Identifier: MIT

//! Rallypoint: backend API for event station check-ins.
//!
//! Attendees scan QR codes at physical stations to earn points. This crate
//! provides the validation and atomic point-award logic plus the management
//! surfaces around it.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::FirestoreDb;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
}
