//! End-to-end poll scenarios for the scan engine.
//!
//! Snapshots are written into a temp directory the way airodump-ng writes
//! them; the sink and injector are recording fakes, and the WPS tools point
//! at nonexistent binaries so detection degrades to `Unknown`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use airscan_core::{NetworkObservation, WpsState};
use airscan_scan::config::{EncryptionCategory, ScanConfig};
use airscan_scan::decloak::DeauthRequest;
use airscan_scan::engine::ScanEngine;
use airscan_scan::error::{Result, ScanError};
use airscan_scan::inject::Injector;
use airscan_scan::sink::ObservationSink;

const AP_HEADER: &str = "BSSID, First time seen, Last time seen, channel, Speed, Privacy, Cipher, Authentication, Power, # beacons, # IV, LAN IP, ID-length, ESSID, Key";
const STATION_HEADER: &str =
    "Station MAC, First time seen, Last time seen, Power, # packets, BSSID, Probed ESSIDs";

#[derive(Default)]
struct RecordingSink {
    seen: Mutex<Vec<NetworkObservation>>,
}

impl ObservationSink for RecordingSink {
    fn submit(&self, observation: NetworkObservation) {
        self.seen.lock().unwrap().push(observation);
    }
}

#[derive(Default)]
struct RecordingInjector {
    sent: Mutex<Vec<DeauthRequest>>,
}

impl Injector for RecordingInjector {
    fn dispatch(&self, request: &DeauthRequest) -> Result<()> {
        self.sent.lock().unwrap().push(request.clone());
        Ok(())
    }
}

struct FailingInjector;

impl Injector for FailingInjector {
    fn dispatch(&self, _request: &DeauthRequest) -> Result<()> {
        Err(ScanError::InjectToolNotFound {
            path: "/nonexistent/aireplay-ng".into(),
        })
    }
}

struct Harness {
    dir: tempfile::TempDir,
    sink: Arc<RecordingSink>,
    injector: Arc<RecordingInjector>,
    engine: ScanEngine,
}

fn config() -> ScanConfig {
    ScanConfig {
        interface: "wlan0mon".into(),
        tshark_path: "/nonexistent/tshark".into(),
        wash_path: "/nonexistent/wash".into(),
        ..Default::default()
    }
}

fn harness(config: ScanConfig) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(RecordingSink::default());
    let injector = Arc::new(RecordingInjector::default());
    let engine = ScanEngine::new(config, dir.path(), sink.clone(), injector.clone()).unwrap();
    Harness {
        dir,
        sink,
        injector,
        engine,
    }
}

fn ap_row(bssid: &str, essid: &str, privacy: &str, power: i32) -> String {
    format!(
        "{bssid}, 2024-03-01 10:00:00, 2024-03-01 10:00:09,  6,  54, {privacy}, CCMP, PSK, {power},       25,        0,   0.  0.  0.  0, {len:>3}, {essid}, ",
        len = essid.len()
    )
}

fn station_row(station: &str, bssid: &str) -> String {
    format!("{station}, 2024-03-01 10:00:03, 2024-03-01 10:00:09, -60,       14, {bssid}, ")
}

fn write_snapshot(dir: &Path, name: &str, aps: &[String], stations: &[String]) {
    let mut out = String::from("\r\n");
    out.push_str(AP_HEADER);
    out.push_str("\r\n");
    for row in aps {
        out.push_str(row);
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    out.push_str(STATION_HEADER);
    out.push_str("\r\n");
    for row in stations {
        out.push_str(row);
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    std::fs::write(dir.join(name), out).unwrap();
}

#[tokio::test]
async fn test_max_power_survives_weaker_snapshot() {
    let mut h = harness(config());

    let mut history = Vec::new();
    for power in [-60, -30, -70] {
        write_snapshot(
            h.dir.path(),
            "airodump-01.csv",
            &[ap_row("AA:AA:AA:AA:AA:01", "MyNet", "WPA2", power)],
            &[],
        );
        let registry = h.engine.poll_at(1000).await;
        assert_eq!(registry[0].power, power);
        history.push(registry[0].max_power);
    }

    assert_eq!(history, vec![-60, -30, -30]);
}

#[tokio::test]
async fn test_hidden_target_decloak_throttle() {
    let mut h = harness(ScanConfig {
        channel: Some(6),
        ..config()
    });
    write_snapshot(
        h.dir.path(),
        "airodump-01.csv",
        &[ap_row("AA:AA:AA:AA:AA:AA", "", "WPA2", -40)],
        &[],
    );

    h.engine.poll_at(1000).await;
    assert!(h.engine.is_decloaking());
    assert_eq!(
        *h.injector.sent.lock().unwrap(),
        vec![DeauthRequest::Broadcast {
            bssid: "aa:aa:aa:aa:aa:aa".into()
        }]
    );

    h.engine.poll_at(1010).await;
    assert!(!h.engine.is_decloaking());
    assert_eq!(h.injector.sent.lock().unwrap().len(), 1);

    h.engine.poll_at(1031).await;
    assert_eq!(h.injector.sent.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_decloak_burst_targets_clients() {
    let mut h = harness(ScanConfig {
        channel: Some(6),
        ..config()
    });
    write_snapshot(
        h.dir.path(),
        "airodump-01.csv",
        &[ap_row("AA:AA:AA:AA:AA:AA", "", "WPA2", -40)],
        &[
            station_row("11:11:11:11:11:01", "AA:AA:AA:AA:AA:AA"),
            station_row("11:11:11:11:11:02", "(not associated)"),
        ],
    );

    h.engine.poll_at(1000).await;
    let sent = h.injector.sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(
        sent[1],
        DeauthRequest::Client {
            bssid: "aa:aa:aa:aa:aa:aa".into(),
            station: "11:11:11:11:11:01".into(),
        }
    );
}

#[tokio::test]
async fn test_hopping_channel_never_deauths() {
    let mut h = harness(config());
    write_snapshot(
        h.dir.path(),
        "airodump-01.csv",
        &[ap_row("AA:AA:AA:AA:AA:AA", "", "WPA2", -40)],
        &[],
    );

    h.engine.poll_at(1000).await;
    assert!(h.injector.sent.lock().unwrap().is_empty());
    assert!(!h.engine.is_decloaking());
}

#[tokio::test]
async fn test_injection_failure_does_not_fail_poll() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = ScanEngine::new(
        ScanConfig {
            channel: Some(6),
            ..config()
        },
        dir.path(),
        Arc::new(RecordingSink::default()),
        Arc::new(FailingInjector),
    )
    .unwrap();
    write_snapshot(
        dir.path(),
        "airodump-01.csv",
        &[ap_row("AA:AA:AA:AA:AA:AA", "", "WPA2", -40)],
        &[],
    );

    let registry = engine.poll_at(1000).await;
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn test_only_named_networks_are_reported() {
    let mut h = harness(ScanConfig {
        encryption_filter: vec![EncryptionCategory::Wep],
        ..config()
    });
    write_snapshot(
        h.dir.path(),
        "airodump-01.csv",
        &[
            ap_row("AA:AA:AA:AA:AA:01", "MyNet", "WPA2", -40),
            ap_row("AA:AA:AA:AA:AA:02", "", "WEP", -50),
            ap_row("AA:AA:AA:AA:AA:03", "Legacy", "WEP", -60),
        ],
        &[station_row("11:11:11:11:11:01", "AA:AA:AA:AA:AA:01")],
    );

    let registry = h.engine.poll_at(1000).await;

    // Reporting happens before filtering, so the WPA2 network is reported
    // even though it is not listed.
    let seen = h.sink.seen.lock().unwrap();
    let reported: Vec<_> = seen.iter().map(|o| o.bssid.as_str()).collect();
    assert_eq!(reported, vec!["aa:aa:aa:aa:aa:01", "aa:aa:aa:aa:aa:03"]);
    assert_eq!(seen[0].essid, "MyNet");
    assert_eq!(seen[0].client_number, 1);
    assert_eq!(seen[0].wps, WpsState::Unknown);

    let listed: Vec<_> = registry.iter().map(|t| t.bssid.as_str()).collect();
    assert_eq!(listed, vec!["aa:aa:aa:aa:aa:02", "aa:aa:aa:aa:aa:03"]);
}

#[tokio::test]
async fn test_registry_sorted_by_power() {
    let mut h = harness(config());
    write_snapshot(
        h.dir.path(),
        "airodump-01.csv",
        &[
            ap_row("AA:AA:AA:AA:AA:01", "Far", "WPA2", -80),
            ap_row("AA:AA:AA:AA:AA:02", "Near", "WPA2", -30),
            ap_row("AA:AA:AA:AA:AA:03", "Mid", "WEP", -55),
            ap_row("AA:AA:AA:AA:AA:04", "MidToo", "WEP", -55),
        ],
        &[],
    );

    let registry = h.engine.poll_at(1000).await;
    let order: Vec<_> = registry
        .iter()
        .map(|t| t.essid.as_deref().unwrap_or_default())
        .collect();
    assert_eq!(order, vec!["Near", "Mid", "MidToo", "Far"]);
}

#[tokio::test]
async fn test_missing_snapshot_keeps_previous_registry() {
    let mut h = harness(config());
    assert!(h.engine.poll_at(1000).await.is_empty());

    write_snapshot(
        h.dir.path(),
        "airodump-01.csv",
        &[ap_row("AA:AA:AA:AA:AA:01", "MyNet", "WPA2", -40)],
        &[],
    );
    assert_eq!(h.engine.poll_at(1001).await.len(), 1);

    std::fs::remove_file(h.dir.path().join("airodump-01.csv")).unwrap();
    let registry = h.engine.poll_at(1002).await;
    assert_eq!(registry.len(), 1);
    assert_eq!(h.engine.targets().len(), 1);
}

#[tokio::test]
async fn test_newest_snapshot_wins() {
    let mut h = harness(config());
    write_snapshot(
        h.dir.path(),
        "airodump-01.csv",
        &[ap_row("AA:AA:AA:AA:AA:01", "OldRun", "WPA2", -40)],
        &[],
    );
    write_snapshot(
        h.dir.path(),
        "airodump-02.csv",
        &[ap_row("AA:AA:AA:AA:AA:02", "NewRun", "WPA2", -40)],
        &[],
    );
    write_snapshot(
        h.dir.path(),
        "unrelated-03.csv",
        &[ap_row("AA:AA:AA:AA:AA:03", "Other", "WPA2", -40)],
        &[],
    );

    let registry = h.engine.poll_at(1000).await;
    assert_eq!(registry.len(), 1);
    assert_eq!(registry[0].essid.as_deref(), Some("NewRun"));
}

#[tokio::test]
async fn test_subscribers_see_each_poll() {
    let mut h = harness(config());
    let mut rx = h.engine.subscribe();

    write_snapshot(
        h.dir.path(),
        "airodump-01.csv",
        &[ap_row("AA:AA:AA:AA:AA:01", "MyNet", "WPA2", -40)],
        &[],
    );
    h.engine.poll_at(1000).await;

    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().len(), 1);
}

#[tokio::test]
async fn test_decloaked_network_flagged() {
    let mut h = harness(config());
    write_snapshot(
        h.dir.path(),
        "airodump-01.csv",
        &[ap_row("AA:AA:AA:AA:AA:01", "", "WPA2", -40)],
        &[],
    );
    let registry = h.engine.poll_at(1000).await;
    assert!(!registry[0].decloaked);
    assert!(h.sink.seen.lock().unwrap().is_empty());

    write_snapshot(
        h.dir.path(),
        "airodump-01.csv",
        &[ap_row("AA:AA:AA:AA:AA:01", "Hidden", "WPA2", -40)],
        &[],
    );
    let registry = h.engine.poll_at(1001).await;
    assert!(registry[0].decloaked);
    assert_eq!(h.sink.seen.lock().unwrap()[0].essid, "Hidden");
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let mut h = harness(ScanConfig {
        poll_interval_ms: 10,
        ..config()
    });
    write_snapshot(
        h.dir.path(),
        "airodump-01.csv",
        &[ap_row("AA:AA:AA:AA:AA:01", "MyNet", "WPA2", -40)],
        &[],
    );

    h.engine
        .run(tokio::time::sleep(std::time::Duration::from_millis(100)))
        .await;
    assert_eq!(h.engine.targets().len(), 1);
}

#[test]
fn test_blank_interface_is_rejected() {
    let err = ScanEngine::new(
        ScanConfig::default(),
        "/tmp",
        Arc::new(RecordingSink::default()),
        Arc::new(RecordingInjector::default()),
    )
    .err()
    .unwrap();
    assert!(matches!(err, ScanError::MissingInterface));
}
