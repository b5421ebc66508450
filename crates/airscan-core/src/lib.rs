//! airscan-core: value types shared across the airscan workspace.
//!
//! - `Target` / `Client` rows parsed from airodump-ng CSV snapshots
//! - `WpsState` for Wi-Fi Protected Setup detection results
//! - `NetworkObservation` payloads for the ingestion service
//! - `RowError` for rows that cannot be parsed

pub mod error;
pub mod events;
pub mod types;

pub use error::RowError;
pub use events::NetworkObservation;
pub use types::{normalize_mac, Client, Target, WpsState};
