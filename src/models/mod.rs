// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod scan;
pub mod station;
pub mod user;

pub use scan::Scan;
pub use station::Station;
pub use user::{Role, User};
