//! Outbound payloads for the network ingestion service.
//!
//! Field names match what the ingestion API accepts on `POST /api/packets`.

use serde::{Deserialize, Serialize};

use crate::types::{Target, WpsState};

/// One observed network, as reported to the ingestion sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkObservation {
    #[serde(rename = "mac_address")]
    pub bssid: String,
    #[serde(rename = "ssid")]
    pub essid: String,
    pub signal_strength: i32,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub client_number: u32,
    pub password: Option<String>,
    pub security_types: Vec<String>,
    #[serde(rename = "is_wps")]
    pub wps: WpsState,
}

impl NetworkObservation {
    /// Build an observation for a target with a known ESSID.
    ///
    /// Returns `None` for hidden networks; those are never reported.
    pub fn from_target(target: &Target) -> Option<Self> {
        let essid = target.essid.clone()?;
        Some(Self {
            bssid: target.bssid.clone(),
            essid,
            signal_strength: target.power,
            latitude: None,
            longitude: None,
            client_number: target.clients.len() as u32,
            password: None,
            security_types: target.encryption.clone(),
            wps: target.wps,
        })
    }
}
