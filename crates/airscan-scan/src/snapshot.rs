//! airodump-ng CSV snapshot parsing.
//!
//! airodump rewrites `<prefix>-NN.csv` every write interval with everything
//! seen so far: an AP table (header row starting with `BSSID`) followed by a
//! station table (header row starting with `Station MAC`). The file may be
//! mid-write when read, may use a platform-specific encoding, and may contain
//! NUL bytes, so every problem below file level only costs the affected row.

use std::path::Path;

use airscan_core::{Client, Target};
use chardetng::EncodingDetector;
use csv::ReaderBuilder;
use encoding_rs::Encoding;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Targets,
    Clients,
}

/// Read and parse one snapshot file.
///
/// Only a failed read is an error. A file with no data rows yields an empty
/// list.
pub fn parse_snapshot(path: &Path) -> Result<Vec<Target>> {
    let bytes = std::fs::read(path)?;
    let targets = parse_snapshot_bytes(&bytes);

    tracing::debug!(
        path = %path.display(),
        bytes = bytes.len(),
        targets = targets.len(),
        "Parsed snapshot"
    );

    Ok(targets)
}

/// Parse raw snapshot bytes into targets, in first-appearance order.
///
/// Clients are attached to the first target with a matching BSSID. Clients
/// that are not associated, or whose BSSID has no target row, are dropped.
pub fn parse_snapshot_bytes(bytes: &[u8]) -> Vec<Target> {
    let text = decode(bytes);

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .double_quote(false)
        .escape(Some(b'\\'))
        .from_reader(text.as_bytes());

    let mut section = Section::Targets;
    let mut targets: Vec<Target> = Vec::new();
    let mut dropped = 0usize;

    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unreadable CSV record");
                dropped += 1;
                continue;
            }
        };

        let row: Vec<&str> = record.iter().map(str::trim_start).collect();
        if row.iter().all(|f| f.trim().is_empty()) {
            continue;
        }

        match row[0].trim() {
            "BSSID" => {
                section = Section::Targets;
                continue;
            }
            "Station MAC" => {
                section = Section::Clients;
                continue;
            }
            _ => {}
        }

        match section {
            Section::Targets => match Target::from_csv_row(&row) {
                Ok(target) => targets.push(target),
                Err(e) => {
                    tracing::trace!(error = %e, "Dropping target row");
                    dropped += 1;
                }
            },
            Section::Clients => {
                let client = match Client::from_csv_row(&row) {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::trace!(error = %e, "Dropping client row");
                        dropped += 1;
                        continue;
                    }
                };
                attach_client(&mut targets, client);
            }
        }
    }

    if dropped > 0 {
        tracing::debug!(dropped, "Snapshot rows dropped");
    }

    targets
}

/// Append `client` to the first target it is associated with.
fn attach_client(targets: &mut [Target], client: Client) {
    let Some(bssid) = client.bssid.clone() else {
        return;
    };
    if let Some(target) = targets.iter_mut().find(|t| t.bssid == bssid) {
        target.clients.push(client);
    }
}

/// Detect the encoding, decode lossily, and strip NULs from every line.
///
/// Only complete lines are considered. A partly written last line can end
/// inside a multi-byte character, which would throw off detection for the
/// whole file, and it is an incomplete row anyway. Undecodable sequences are
/// dropped rather than kept as replacement characters.
fn decode(bytes: &[u8]) -> String {
    let bytes = match bytes.iter().rposition(|&b| b == b'\n') {
        Some(end) => &bytes[..=end],
        None => return String::new(),
    };

    let encoding: &'static Encoding = match Encoding::for_bom(bytes) {
        Some((bom, _)) => bom,
        None => {
            let mut detector = EncodingDetector::new();
            detector.feed(bytes, true);
            detector.guess(None, true)
        }
    };
    let (text, actual, had_errors) = encoding.decode(bytes);

    if had_errors {
        tracing::trace!(encoding = actual.name(), "Lossy snapshot decode");
    }

    text.lines()
        .map(|line| line.replace(&['\0', '\u{FFFD}'][..], ""))
        .collect::<Vec<_>>()
        .join("\n")
}
