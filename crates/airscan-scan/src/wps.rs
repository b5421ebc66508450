//! WPS detection against airodump's capture file.
//!
//! Detectors run in order and the first one that produces a report wins.
//! A detector never touches targets itself: it returns a `WpsReport`, which
//! is applied only on success, so a failed detector leaves nothing behind for
//! the next one to trip over.

use std::collections::HashSet;
use std::path::Path;
use std::process::Stdio;

use airscan_core::{normalize_mac, Target, WpsState};
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::{timeout, Duration};

use crate::config::ScanConfig;

const DETECTOR_TIMEOUT: Duration = Duration::from_secs(15);

/// Display filter selecting beacons that carry a WPS element.
const TSHARK_WPS_FILTER: &str =
    "wps.wifi_protected_setup_state && wlan.da == ff:ff:ff:ff:ff:ff";

#[derive(Error, Debug)]
pub enum WpsError {
    #[error("{tool} unavailable at {path}: {reason}")]
    Unavailable {
        tool: &'static str,
        path: String,
        reason: String,
    },

    #[error("{tool} exited with code {code}: {stderr}")]
    ToolFailed {
        tool: &'static str,
        code: i32,
        stderr: String,
    },

    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: &'static str, secs: u64 },

    #[error("Failed to parse {tool} output: {message}")]
    Parse {
        tool: &'static str,
        message: String,
    },
}

// ── Report ────────────────────────────────────────────────────────

/// BSSIDs seen advertising WPS, split by lock state.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WpsReport {
    pub unlocked: HashSet<String>,
    pub locked: HashSet<String>,
}

impl WpsReport {
    fn record(&mut self, bssid: &str, locked: bool) {
        let Some(bssid) = normalize_mac(bssid) else {
            return;
        };
        if locked {
            self.locked.insert(bssid);
        } else {
            self.unlocked.insert(bssid);
        }
    }

    /// Set `wps` on every target. Unlocked wins over locked when a BSSID was
    /// seen both ways; targets absent from the report get `None`.
    pub fn apply(&self, targets: &mut [Target]) {
        for target in targets.iter_mut() {
            target.wps = if self.unlocked.contains(&target.bssid) {
                WpsState::Unlocked
            } else if self.locked.contains(&target.bssid) {
                WpsState::Locked
            } else {
                WpsState::None
            };
        }
    }
}

// ── Detectors ─────────────────────────────────────────────────────

/// A WPS detection strategy backed by an external tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WpsDetector {
    /// `tshark -T pdml`, inspecting WPS information elements per packet.
    Tshark { path: String },
    /// `wash -j`, one JSON object per access point.
    Wash { path: String },
}

impl WpsDetector {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tshark { .. } => "tshark",
            Self::Wash { .. } => "wash",
        }
    }

    fn path(&self) -> &str {
        match self {
            Self::Tshark { path } | Self::Wash { path } => path,
        }
    }

    fn args(&self, capfile: &Path) -> Vec<String> {
        let capfile = capfile.display().to_string();
        match self {
            Self::Tshark { .. } => vec![
                "-r".into(),
                capfile,
                "-n".into(),
                "-Y".into(),
                TSHARK_WPS_FILTER.into(),
                "-T".into(),
                "pdml".into(),
            ],
            Self::Wash { .. } => vec!["-f".into(), capfile, "-j".into()],
        }
    }

    /// Run the tool against `capfile` and build a report.
    pub async fn detect(&self, capfile: &Path) -> Result<WpsReport, WpsError> {
        let tool = self.name();
        let mut cmd = Command::new(self.path());
        cmd.args(self.args(capfile))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = timeout(DETECTOR_TIMEOUT, cmd.output())
            .await
            .map_err(|_| WpsError::Timeout {
                tool,
                secs: DETECTOR_TIMEOUT.as_secs(),
            })?
            .map_err(|e| WpsError::Unavailable {
                tool,
                path: self.path().to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            // tshark exits 2 on a capture cut short mid-packet, which is the
            // normal state of a file airodump is still writing. Whatever it
            // printed for the complete packets is still usable.
            if matches!(self, Self::Tshark { .. }) && !output.stdout.is_empty() {
                if let Ok(report) = parse_tshark_pdml(&output.stdout) {
                    tracing::debug!(
                        code = ?output.status.code(),
                        "tshark exited with failure, using its partial output"
                    );
                    return Ok(report);
                }
            }
            return Err(WpsError::ToolFailed {
                tool,
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        match self {
            Self::Tshark { .. } => parse_tshark_pdml(&output.stdout),
            Self::Wash { .. } => Ok(parse_wash_output(&output.stdout)),
        }
    }
}

// ── Resolver ──────────────────────────────────────────────────────

/// Ordered chain of WPS detectors.
pub struct WpsResolver {
    detectors: Vec<WpsDetector>,
    warned: bool,
}

impl WpsResolver {
    pub fn new(detectors: Vec<WpsDetector>) -> Self {
        Self {
            detectors,
            warned: false,
        }
    }

    /// tshark first, wash as fallback.
    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(vec![
            WpsDetector::Tshark {
                path: config.tshark_path.clone(),
            },
            WpsDetector::Wash {
                path: config.wash_path.clone(),
            },
        ])
    }

    /// Set `wps` on `targets` from the first detector that succeeds.
    ///
    /// Returns the name of that detector. When the capture file is missing or
    /// every detector fails, targets are left untouched (`Unknown`).
    pub async fn resolve(&mut self, capfile: &Path, targets: &mut [Target]) -> Option<&'static str> {
        if !capfile.exists() {
            tracing::debug!(capfile = %capfile.display(), "No capture file for WPS detection yet");
            return None;
        }

        for detector in &self.detectors {
            match detector.detect(capfile).await {
                Ok(report) => {
                    report.apply(targets);
                    tracing::debug!(
                        detector = detector.name(),
                        unlocked = report.unlocked.len(),
                        locked = report.locked.len(),
                        "WPS detection complete"
                    );
                    return Some(detector.name());
                }
                Err(e) => {
                    tracing::debug!(detector = detector.name(), error = %e, "WPS detector failed");
                }
            }
        }

        if !self.warned {
            tracing::warn!("No WPS detector could run; WPS state stays unknown");
            self.warned = true;
        }
        None
    }
}

// ── tshark PDML ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename = "pdml")]
struct Pdml {
    #[serde(rename = "packet", default)]
    packets: Vec<PdmlPacket>,
}

#[derive(Debug, Deserialize)]
struct PdmlPacket {
    #[serde(rename = "proto", default)]
    protos: Vec<PdmlProto>,
}

#[derive(Debug, Deserialize)]
struct PdmlProto {
    #[serde(rename = "field", default)]
    fields: Vec<PdmlField>,
}

#[derive(Debug, Deserialize)]
struct PdmlField {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@show")]
    show: Option<String>,
    #[serde(rename = "field", default)]
    fields: Vec<PdmlField>,
}

impl PdmlPacket {
    fn find(&self, name: &str) -> Option<&PdmlField> {
        self.protos.iter().find_map(|p| find_field(&p.fields, name))
    }
}

fn find_field<'a>(fields: &'a [PdmlField], name: &str) -> Option<&'a PdmlField> {
    fields.iter().find_map(|f| {
        if f.name == name {
            Some(f)
        } else {
            find_field(&f.fields, name)
        }
    })
}

/// Parse `tshark -T pdml` output into a report.
fn parse_tshark_pdml(xml: &[u8]) -> Result<WpsReport, WpsError> {
    let pdml: Pdml = quick_xml::de::from_reader(xml).map_err(|e| WpsError::Parse {
        tool: "tshark",
        message: e.to_string(),
    })?;

    let mut report = WpsReport::default();
    for packet in &pdml.packets {
        let bssid = packet
            .find("wlan.bssid")
            .or_else(|| packet.find("wlan.ta"))
            .and_then(|f| f.show.as_deref());
        let Some(bssid) = bssid else {
            continue;
        };
        let locked = packet
            .find("wps.ap_setup_locked")
            .and_then(|f| f.show.as_deref())
            .is_some_and(|v| v.contains('1'));
        report.record(bssid, locked);
    }
    Ok(report)
}

// ── wash JSON ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct WashLine {
    bssid: String,
    #[serde(default)]
    wps_locked: Option<LockFlag>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LockFlag {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl LockFlag {
    fn is_locked(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(i) => *i == 1,
            Self::Text(s) => s == "1" || s.eq_ignore_ascii_case("yes"),
        }
    }
}

/// Parse `wash -j` output. Lines that are not valid JSON are skipped.
fn parse_wash_output(stdout: &[u8]) -> WpsReport {
    let mut report = WpsReport::default();
    for line in String::from_utf8_lossy(stdout).lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<WashLine>(line) {
            Ok(entry) => {
                let locked = entry.wps_locked.as_ref().is_some_and(LockFlag::is_locked);
                report.record(&entry.bssid, locked);
            }
            Err(e) => tracing::trace!(error = %e, "Skipping wash line"),
        }
    }
    report
}
