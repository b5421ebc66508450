//! Target filtering by encryption, signal, clients and ignore/pin lists.

use std::collections::HashSet;

use airscan_core::{normalize_mac, Target};

use crate::config::{EncryptionCategory, ScanConfig};

/// Inclusion and exclusion rules applied to every parsed snapshot.
#[derive(Debug, Clone, Default)]
pub struct TargetFilter {
    pub encryption: HashSet<EncryptionCategory>,
    /// Minimum best-seen signal on the 0-100 scale; 0 disables.
    pub min_power: i32,
    pub clients_only: bool,
    pub ignore_essids: HashSet<String>,
    /// Lowercase BSSIDs.
    pub ignore_bssids: HashSet<String>,
    /// Lowercase BSSID.
    pub target_bssid: Option<String>,
    pub target_essid: Option<String>,
    /// Include targets that match no encryption category.
    pub skip_wps: bool,
}

impl TargetFilter {
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            encryption: config.encryption_filter.iter().copied().collect(),
            min_power: config.min_power,
            clients_only: config.clients_only,
            ignore_essids: config.ignore_essids.iter().cloned().collect(),
            ignore_bssids: config.ignore_bssids.iter().map(|b| canonical_mac(b)).collect(),
            target_bssid: config.target_bssid.as_deref().map(canonical_mac),
            target_essid: config.target_essid.clone(),
            skip_wps: config.skip_wps,
        }
    }

    /// Keep the targets that pass inclusion and then survive exclusion,
    /// preserving input order.
    pub fn apply(&self, targets: Vec<Target>) -> Vec<Target> {
        targets
            .into_iter()
            .filter(|t| self.included(t))
            .filter(|t| !self.excluded(t))
            .collect()
    }

    fn included(&self, target: &Target) -> bool {
        if self.min_power > 0 && target.max_signal_quality() < self.min_power {
            return false;
        }
        if self.clients_only && target.clients.is_empty() {
            return false;
        }

        // No requested category means no encryption constraint.
        let wants = |c: EncryptionCategory| self.encryption.contains(&c);
        let matches_encryption = self.encryption.is_empty()
            || (wants(EncryptionCategory::Wep) && target.has_encryption("WEP"))
            || (wants(EncryptionCategory::Wpa) && target.has_encryption("WPA"))
            || (wants(EncryptionCategory::Wps) && target.wps.is_enabled());

        matches_encryption || self.skip_wps
    }

    fn excluded(&self, target: &Target) -> bool {
        if let Some(essid) = &target.essid {
            if self.ignore_essids.contains(essid) {
                return true;
            }
        }
        if self.ignore_bssids.contains(&target.bssid) {
            return true;
        }
        if let Some(pin) = &self.target_bssid {
            if !target.bssid.eq_ignore_ascii_case(pin) {
                return true;
            }
        }
        if let (Some(pin), Some(essid)) = (&self.target_essid, &target.essid) {
            if essid != pin {
                return true;
            }
        }
        false
    }
}

/// Normalised MAC, or the trimmed lowercase input when it is not a MAC.
fn canonical_mac(raw: &str) -> String {
    normalize_mac(raw).unwrap_or_else(|| raw.trim().to_ascii_lowercase())
}
