// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod scan;

pub use scan::{parse_station_payload, ScanService};
