//! Decloaking: deauth bursts against hidden-ESSID access points.
//!
//! Kicking associated stations off a hidden network makes them reassociate,
//! and the probe/association exchange reveals the network name in the next
//! snapshot. Each BSSID gets at most one burst per interval.

use std::collections::HashMap;

use airscan_core::Target;

use crate::config::ScanConfig;

/// One aireplay-ng deauth invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeauthRequest {
    /// Deauth every station of `bssid`.
    Broadcast { bssid: String },
    /// Deauth a single station of `bssid`.
    Client { bssid: String, station: String },
}

/// All deauths due for one hidden target in a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeauthBurst {
    pub bssid: String,
    /// Stations currently associated with the target.
    pub stations: Vec<String>,
}

impl DeauthBurst {
    /// One broadcast request followed by one request per station.
    pub fn requests(&self) -> Vec<DeauthRequest> {
        std::iter::once(DeauthRequest::Broadcast {
            bssid: self.bssid.clone(),
        })
        .chain(self.stations.iter().map(|station| DeauthRequest::Client {
            bssid: self.bssid.clone(),
            station: station.clone(),
        }))
        .collect()
    }
}

/// Tracks the last burst per BSSID and decides which hidden targets are due.
#[derive(Debug, Clone)]
pub struct DecloakScheduler {
    enabled: bool,
    interval_secs: i64,
    last_deauth: HashMap<String, i64>,
    decloaking: bool,
}

impl DecloakScheduler {
    pub fn new(enabled: bool, interval_secs: u64) -> Self {
        Self {
            enabled,
            interval_secs: interval_secs as i64,
            last_deauth: HashMap::new(),
            decloaking: false,
        }
    }

    /// Enabled only when deauth is allowed and the channel is fixed; hopping
    /// channels makes targeted deauth unreliable.
    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(
            config.deauth_enabled && config.channel.is_some(),
            config.decloak_interval_secs,
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the last tick emitted any burst.
    pub fn is_decloaking(&self) -> bool {
        self.decloaking
    }

    /// Epoch seconds of the last burst sent to `bssid`.
    pub fn last_deauth(&self, bssid: &str) -> Option<i64> {
        self.last_deauth.get(bssid).copied()
    }

    /// Bursts due at `now` (epoch seconds) for hidden targets.
    ///
    /// A BSSID never seen before counts as last deauthed at epoch 0, so it is
    /// due on first sight. Every emitted burst stamps its BSSID with `now`.
    pub fn tick(&mut self, targets: &[Target], now: i64) -> Vec<DeauthBurst> {
        self.decloaking = false;
        if !self.enabled {
            return Vec::new();
        }

        let mut bursts = Vec::new();
        for target in targets.iter().filter(|t| !t.essid_known()) {
            let last = self.last_deauth.get(&target.bssid).copied().unwrap_or(0);
            if now - last < self.interval_secs {
                continue;
            }

            self.last_deauth.insert(target.bssid.clone(), now);
            tracing::debug!(
                bssid = %target.bssid,
                clients = target.clients.len(),
                "Deauthing hidden target (broadcast and clients)"
            );
            bursts.push(DeauthBurst {
                bssid: target.bssid.clone(),
                stations: target.clients.iter().map(|c| c.station.clone()).collect(),
            });
        }

        self.decloaking = !bursts.is_empty();
        bursts
    }
}
