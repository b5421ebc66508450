//! Scan engine: one poll = parse → WPS → notify → filter → publish → decloak.
//!
//! The registry is published through a `watch` channel as an immutable
//! `Arc<[Target]>`, so readers always see a complete poll result.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

use airscan_core::{NetworkObservation, Target};

use crate::config::ScanConfig;
use crate::decloak::DecloakScheduler;
use crate::error::{Result, ScanError};
use crate::filter::TargetFilter;
use crate::inject::{AireplayInjector, Injector};
use crate::sink::{build_sink, ObservationSink};
use crate::snapshot::parse_snapshot;
use crate::wps::WpsResolver;

/// Current filtered targets, strongest first.
pub type Registry = Arc<[Target]>;

pub struct ScanEngine {
    config: ScanConfig,
    output_dir: PathBuf,
    filter: TargetFilter,
    wps: WpsResolver,
    scheduler: DecloakScheduler,
    sink: Arc<dyn ObservationSink>,
    injector: Arc<dyn Injector>,
    /// Best `power` per BSSID across polls.
    max_power: HashMap<String, i32>,
    /// BSSIDs seen with a hidden ESSID and not yet revealed.
    hidden: HashSet<String>,
    decloaked: HashSet<String>,
    registry: watch::Sender<Registry>,
}

impl ScanEngine {
    /// Fails with `MissingInterface` when no wireless interface is configured.
    pub fn new(
        config: ScanConfig,
        output_dir: impl Into<PathBuf>,
        sink: Arc<dyn ObservationSink>,
        injector: Arc<dyn Injector>,
    ) -> Result<Self> {
        if config.interface.trim().is_empty() {
            return Err(ScanError::MissingInterface);
        }

        let (registry, _) = watch::channel(Registry::from(Vec::new()));
        Ok(Self {
            filter: TargetFilter::from_config(&config),
            wps: WpsResolver::from_config(&config),
            scheduler: DecloakScheduler::from_config(&config),
            output_dir: output_dir.into(),
            sink,
            injector,
            max_power: HashMap::new(),
            hidden: HashSet::new(),
            decloaked: HashSet::new(),
            registry,
            config,
        })
    }

    /// Engine wired to the configured HTTP sink and aireplay-ng.
    pub fn from_config(config: ScanConfig, output_dir: impl Into<PathBuf>) -> Result<Self> {
        let sink = build_sink(&config.sink);
        let injector: Arc<dyn Injector> = Arc::new(AireplayInjector::from_config(&config));
        Self::new(config, output_dir, sink, injector)
    }

    pub fn subscribe(&self) -> watch::Receiver<Registry> {
        self.registry.subscribe()
    }

    pub fn targets(&self) -> Registry {
        self.registry.borrow().clone()
    }

    pub fn is_decloaking(&self) -> bool {
        self.scheduler.is_decloaking()
    }

    /// Run one poll cycle at the current wall-clock time.
    pub async fn poll(&mut self) -> Registry {
        self.poll_at(chrono::Utc::now().timestamp()).await
    }

    /// Run one poll cycle with `now` (epoch seconds) as the decloak clock.
    ///
    /// Without a snapshot file, or when it cannot be read, the previous
    /// registry is returned unchanged and nothing is published.
    pub async fn poll_at(&mut self, now: i64) -> Registry {
        let Some(csv) = find_newest_snapshot(&self.output_dir, &self.config.output_prefix) else {
            tracing::debug!(dir = %self.output_dir.display(), "No snapshot yet");
            return self.targets();
        };

        let mut targets = match parse_snapshot(&csv) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(path = %csv.display(), error = %e, "Failed to read snapshot");
                return self.targets();
            }
        };

        self.merge_history(&mut targets);

        let capfile = csv.with_extension(self.config.capture_extension());
        self.wps.resolve(&capfile, &mut targets).await;

        self.notify(&targets);

        let parsed = targets.len();
        let mut targets = self.filter.apply(targets);
        targets.sort_by(|a, b| b.power.cmp(&a.power));

        let registry = Registry::from(targets);
        self.registry.send_replace(registry.clone());

        tracing::debug!(
            snapshot = %csv.display(),
            parsed,
            kept = registry.len(),
            "Poll complete"
        );

        self.decloak(&registry, now);
        registry
    }

    /// Poll every `poll_interval_ms` until `shutdown` resolves.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = interval(Duration::from_millis(self.config.poll_interval_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            dir = %self.output_dir.display(),
            interval_ms = self.config.poll_interval_ms,
            decloak = self.scheduler.is_enabled(),
            "Scan engine started"
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.poll().await;
                }
            }
        }

        tracing::info!("Scan engine stopped");
    }

    /// Carry `max_power` and decloak state over from earlier polls.
    fn merge_history(&mut self, targets: &mut [Target]) {
        for target in targets.iter_mut() {
            let best = self
                .max_power
                .entry(target.bssid.clone())
                .or_insert(target.power);
            *best = (*best).max(target.power);
            target.max_power = *best;

            if !target.essid_known() {
                self.hidden.insert(target.bssid.clone());
            } else if self.hidden.remove(&target.bssid) {
                tracing::info!(
                    bssid = %target.bssid,
                    essid = target.essid.as_deref().unwrap_or_default(),
                    "Hidden network decloaked"
                );
                self.decloaked.insert(target.bssid.clone());
            }
            target.decloaked = self.decloaked.contains(&target.bssid);
        }
    }

    fn notify(&self, targets: &[Target]) {
        for observation in targets.iter().filter_map(NetworkObservation::from_target) {
            self.sink.submit(observation);
        }
    }

    fn decloak(&mut self, targets: &[Target], now: i64) {
        for burst in self.scheduler.tick(targets, now) {
            for request in burst.requests() {
                if let Err(e) = self.injector.dispatch(&request) {
                    tracing::warn!(bssid = %burst.bssid, error = %e, "Deauth dispatch failed, skipping decloak this cycle");
                    return;
                }
            }
        }
    }
}

/// Newest `<prefix>*.csv` in `dir` by (modification time, file name).
pub fn find_newest_snapshot(dir: &Path, prefix: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;

    entries
        .flatten()
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !(name.starts_with(prefix) && name.ends_with(".csv")) {
                return None;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            Some(((modified, name), entry.path()))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, path)| path)
}
