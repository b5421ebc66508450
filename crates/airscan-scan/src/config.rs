//! Configuration for the airscan scan engine.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level scan configuration.
///
/// Loaded from `airscan.toml` `[scan]` section or `AIRSCAN_SCAN__`
/// environment variables, then overridden by CLI flags.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// Monitor-mode wireless interface (e.g. "wlan0mon"). Required.
    #[serde(default)]
    pub interface: String,

    #[serde(default = "default_airodump_path")]
    pub airodump_path: String,

    #[serde(default = "default_aireplay_path")]
    pub aireplay_path: String,

    #[serde(default = "default_tshark_path")]
    pub tshark_path: String,

    #[serde(default = "default_wash_path")]
    pub wash_path: String,

    /// Directory airodump writes into. A fresh temp directory when unset.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,

    /// File name prefix for airodump output (`<prefix>-01.csv`).
    #[serde(default = "default_output_prefix")]
    pub output_prefix: String,

    /// Remove old output files for the prefix before and after capturing.
    #[serde(default = "default_true")]
    pub delete_existing_files: bool,

    /// Fixed channel. Decloaking only runs when this is set.
    #[serde(default)]
    pub channel: Option<u16>,

    /// Band to hop when no fixed channel is set.
    #[serde(default)]
    pub band: Option<Band>,

    /// Passed to airodump `--enc`.
    #[serde(default)]
    pub capture_encryption: Option<String>,

    /// Passed to airodump `--wps`.
    #[serde(default)]
    pub capture_wps: bool,

    /// Write IVs instead of full pcap captures.
    #[serde(default)]
    pub ivs_only: bool,

    /// Encryption categories a target must match to be listed.
    #[serde(default = "default_encryption_filter")]
    pub encryption_filter: Vec<EncryptionCategory>,

    /// Minimum best-seen signal on the 0-100 scale. 0 disables the check.
    #[serde(default)]
    pub min_power: i32,

    /// Only list targets with at least one associated client.
    #[serde(default)]
    pub clients_only: bool,

    #[serde(default)]
    pub ignore_essids: Vec<String>,

    /// BSSIDs that are already cracked.
    #[serde(default)]
    pub ignore_bssids: Vec<String>,

    #[serde(default)]
    pub target_bssid: Option<String>,

    #[serde(default)]
    pub target_essid: Option<String>,

    /// List every target regardless of the encryption filter.
    #[serde(default)]
    pub skip_wps: bool,

    #[serde(default = "default_true")]
    pub deauth_enabled: bool,

    /// Packets per aireplay deauth invocation.
    #[serde(default = "default_num_deauths")]
    pub num_deauths: u32,

    /// Minimum seconds between decloak bursts for the same BSSID.
    #[serde(default = "default_decloak_interval")]
    pub decloak_interval_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub sink: SinkConfig,
}

/// Where observed networks are reported.
#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_sink_url")]
    pub url: String,

    #[serde(default = "default_sink_timeout")]
    pub timeout_ms: u64,
}

/// Encryption categories understood by the target filter.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionCategory {
    Wep,
    Wpa,
    Wps,
}

/// Band selection for channel hopping, mapping to airodump `--band`.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Band {
    /// `--band abg`
    All,
    /// `--band bg`
    TwoGhz,
    /// `--band a`
    FiveGhz,
}

impl Band {
    pub fn airodump_flag(&self) -> &'static str {
        match self {
            Self::All => "abg",
            Self::TwoGhz => "bg",
            Self::FiveGhz => "a",
        }
    }
}

impl ScanConfig {
    /// Extension of the capture file airodump writes next to the CSV.
    pub fn capture_extension(&self) -> &'static str {
        if self.ivs_only {
            "ivs"
        } else {
            "cap"
        }
    }
}

fn default_airodump_path() -> String {
    "airodump-ng".to_string()
}

fn default_aireplay_path() -> String {
    "aireplay-ng".to_string()
}

fn default_tshark_path() -> String {
    "tshark".to_string()
}

fn default_wash_path() -> String {
    "wash".to_string()
}

fn default_output_prefix() -> String {
    "airodump".to_string()
}

fn default_encryption_filter() -> Vec<EncryptionCategory> {
    vec![
        EncryptionCategory::Wep,
        EncryptionCategory::Wpa,
        EncryptionCategory::Wps,
    ]
}

fn default_num_deauths() -> u32 {
    1
}

fn default_decloak_interval() -> u64 {
    30
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_sink_url() -> String {
    "http://localhost:5001/api/packets".to_string()
}

fn default_sink_timeout() -> u64 {
    3000
}

fn default_true() -> bool {
    true
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: default_sink_url(),
            timeout_ms: default_sink_timeout(),
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            interface: String::new(),
            airodump_path: default_airodump_path(),
            aireplay_path: default_aireplay_path(),
            tshark_path: default_tshark_path(),
            wash_path: default_wash_path(),
            scratch_dir: None,
            output_prefix: default_output_prefix(),
            delete_existing_files: true,
            channel: None,
            band: None,
            capture_encryption: None,
            capture_wps: false,
            ivs_only: false,
            encryption_filter: default_encryption_filter(),
            min_power: 0,
            clients_only: false,
            ignore_essids: Vec::new(),
            ignore_bssids: Vec::new(),
            target_bssid: None,
            target_essid: None,
            skip_wps: false,
            deauth_enabled: true,
            num_deauths: default_num_deauths(),
            decloak_interval_secs: default_decloak_interval(),
            poll_interval_ms: default_poll_interval(),
            sink: SinkConfig::default(),
        }
    }
}
