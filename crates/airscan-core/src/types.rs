//! Core value types for a wireless scan.
//!
//! A `Target` is one access point and a `Client` one station, each built from
//! a single row of an airodump-ng CSV snapshot. Both are rebuilt from scratch
//! on every snapshot; nothing here carries state between polls.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::RowError;

/// Literal airodump writes in the client BSSID column for unassociated stations.
pub const NOT_ASSOCIATED: &str = "(not associated)";

/// Broadcast MAC, never a real access point.
pub const BROADCAST_MAC: &str = "ff:ff:ff:ff:ff:ff";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ── MAC addresses ─────────────────────────────────────────────────

/// Normalize a MAC address to lowercase colon-separated form.
///
/// Accepts `:` or `-` separators. Returns `None` unless the input is exactly
/// six two-digit hex octets.
pub fn normalize_mac(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let octets: Vec<&str> = raw.split(|c| c == ':' || c == '-').collect();
    if octets.len() != 6 {
        return None;
    }
    if !octets
        .iter()
        .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
    {
        return None;
    }
    Some(octets.join(":").to_ascii_lowercase())
}

// ── WPS ───────────────────────────────────────────────────────────

/// Wi-Fi Protected Setup state of an access point.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WpsState {
    /// Not yet determined (no detector could run).
    #[default]
    Unknown,
    /// Detection ran and found no WPS information element.
    None,
    Locked,
    Unlocked,
}

impl WpsState {
    /// Whether the access point advertises WPS at all.
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Locked | Self::Unlocked)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::None => "NONE",
            Self::Locked => "LOCKED",
            Self::Unlocked => "UNLOCKED",
        }
    }
}

impl fmt::Display for WpsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Targets ───────────────────────────────────────────────────────

/// One access point seen in a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Target {
    /// Lowercase colon-separated MAC.
    pub bssid: String,
    /// Network name, `None` while hidden.
    pub essid: Option<String>,
    /// Length airodump reports for the ESSID, also for hidden networks.
    pub essid_len: usize,
    pub channel: i32,
    /// Privacy tags in the order airodump lists them, e.g. `["WPA2", "WPA"]`.
    pub encryption: Vec<String>,
    pub cipher: String,
    pub authentication: String,
    /// Raw reported signal, airodump's negative dBm-like scale.
    pub power: i32,
    /// Highest `power` seen for this BSSID across polls.
    pub max_power: i32,
    pub beacons: u64,
    pub ivs: u64,
    pub first_seen: Option<NaiveDateTime>,
    pub last_seen: Option<NaiveDateTime>,
    pub wps: WpsState,
    /// Set when this BSSID was hidden in an earlier poll and now has a name.
    pub decloaked: bool,
    /// Associated stations in snapshot order.
    pub clients: Vec<Client>,
}

impl Target {
    /// Column count of a complete AP row (the trailing key column may be absent).
    pub const MIN_COLUMNS: usize = 14;

    /// Build a target from one row of the AP table.
    pub fn from_csv_row<S: AsRef<str>>(row: &[S]) -> Result<Self, RowError> {
        if row.len() < Self::MIN_COLUMNS {
            return Err(RowError::ColumnCount {
                expected: Self::MIN_COLUMNS,
                found: row.len(),
            });
        }
        let field = |i: usize| row[i].as_ref().trim();

        let bssid =
            normalize_mac(field(0)).ok_or_else(|| RowError::InvalidMac(field(0).to_string()))?;
        if bssid == BROADCAST_MAC {
            return Err(RowError::BroadcastBssid);
        }

        let channel: i32 = parse_int("channel", field(3))?;
        if channel == -1 {
            return Err(RowError::NegativeChannel);
        }

        let power: i32 = parse_int("power", field(8))?;
        let essid_len: usize = parse_int("essid_len", field(12))?;
        let essid = essid_from_column(row[13].as_ref().trim_start(), essid_len);

        Ok(Self {
            bssid,
            essid,
            essid_len,
            channel,
            encryption: field(5).split_whitespace().map(String::from).collect(),
            cipher: field(6).to_string(),
            authentication: field(7).to_string(),
            power,
            max_power: power,
            beacons: parse_int("beacons", field(9))?,
            ivs: parse_int("ivs", field(10))?,
            first_seen: parse_timestamp(field(1)),
            last_seen: parse_timestamp(field(2)),
            wps: WpsState::Unknown,
            decloaked: false,
            clients: Vec::new(),
        })
    }

    pub fn essid_known(&self) -> bool {
        self.essid.is_some()
    }

    /// Signal on airodump's 0-100 quality scale.
    pub fn signal_quality(&self) -> i32 {
        quality(self.power)
    }

    /// Best signal seen, on the 0-100 quality scale.
    pub fn max_signal_quality(&self) -> i32 {
        quality(self.max_power)
    }

    /// Whether any privacy tag contains `needle` (e.g. "WEP" matches "WEP").
    pub fn has_encryption(&self, needle: &str) -> bool {
        self.encryption.iter().any(|tag| tag.contains(needle))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let essid = match &self.essid {
            Some(name) => name.clone(),
            None => format!("<hidden:{}>", self.essid_len),
        };
        write!(
            f,
            "{:<32} {} ch{:>3} {:<10} {:>3}db wps={} clients={}",
            essid,
            self.bssid,
            self.channel,
            self.encryption.join(" "),
            self.signal_quality(),
            self.wps,
            self.clients.len()
        )?;
        if self.decloaked {
            f.write_str(" (decloaked)")?;
        }
        Ok(())
    }
}

// ── Clients ───────────────────────────────────────────────────────

/// One station from the client table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Client {
    /// Lowercase colon-separated MAC of the station.
    pub station: String,
    /// BSSID the station is associated with, `None` for "(not associated)".
    pub bssid: Option<String>,
    pub power: i32,
    pub packets: u64,
    pub probed_essids: Vec<String>,
}

impl Client {
    pub const MIN_COLUMNS: usize = 6;

    /// Build a client from one row of the station table.
    pub fn from_csv_row<S: AsRef<str>>(row: &[S]) -> Result<Self, RowError> {
        if row.len() < Self::MIN_COLUMNS {
            return Err(RowError::ColumnCount {
                expected: Self::MIN_COLUMNS,
                found: row.len(),
            });
        }
        let field = |i: usize| row[i].as_ref().trim();

        let station =
            normalize_mac(field(0)).ok_or_else(|| RowError::InvalidMac(field(0).to_string()))?;

        let bssid = if field(5) == NOT_ASSOCIATED {
            None
        } else {
            Some(normalize_mac(field(5)).ok_or_else(|| RowError::InvalidMac(field(5).to_string()))?)
        };

        Ok(Self {
            station,
            bssid,
            power: parse_int("power", field(3))?,
            packets: parse_int("packets", field(4))?,
            probed_essids: row[6..]
                .iter()
                .map(|s| s.as_ref().trim())
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        })
    }

    pub fn is_associated(&self) -> bool {
        self.bssid.is_some()
    }
}

// ── Helpers ───────────────────────────────────────────────────────

fn parse_int<T: std::str::FromStr>(column: &'static str, value: &str) -> Result<T, RowError> {
    value.parse().map_err(|_| RowError::InvalidNumber {
        column,
        value: value.to_string(),
    })
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).ok()
}

/// airodump pads hidden names with NUL escapes; the CSV escape character
/// may have already eaten the backslash.
fn essid_from_column(raw: &str, essid_len: usize) -> Option<String> {
    if raw.trim().is_empty() || raw == "\\x00".repeat(essid_len) || raw == "x00".repeat(essid_len)
    {
        None
    } else {
        Some(raw.to_string())
    }
}

fn quality(power: i32) -> i32 {
    if power < 0 {
        power + 100
    } else {
        power
    }
}
