//! CLI entry point for the airscan wireless scanner.

use clap::Parser;
use tokio::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

use airscan_scan::capture::CaptureSession;
use airscan_scan::config::{Band, EncryptionCategory, ScanConfig};
use airscan_scan::engine::{Registry, ScanEngine};
use airscan_scan::error::ScanError;

#[derive(Parser)]
#[command(name = "airscan")]
#[command(about = "Wireless target scanner with WPS detection and decloaking")]
struct Cli {
    /// Monitor-mode wireless interface (e.g., wlan0mon).
    #[arg(short, long)]
    interface: Option<String>,

    /// Fixed channel. Required for decloaking.
    #[arg(short, long)]
    channel: Option<u16>,

    /// Band to hop when no channel is fixed: all, 2, 5.
    #[arg(long)]
    band: Option<String>,

    /// List WEP targets.
    #[arg(long)]
    wep: bool,

    /// List WPA targets.
    #[arg(long)]
    wpa: bool,

    /// List WPS-enabled targets.
    #[arg(long)]
    wps: bool,

    /// Minimum signal quality (0-100).
    #[arg(long)]
    power: Option<i32>,

    /// Only list targets with associated clients.
    #[arg(long)]
    clients_only: bool,

    /// Only list this BSSID.
    #[arg(long)]
    bssid: Option<String>,

    /// Only list this ESSID.
    #[arg(long)]
    essid: Option<String>,

    /// ESSID to ignore (repeatable).
    #[arg(long)]
    ignore_essid: Vec<String>,

    /// List targets regardless of encryption.
    #[arg(long)]
    skip_wps: bool,

    /// Never send deauth packets.
    #[arg(long)]
    no_deauth: bool,

    /// Deauth packets per burst.
    #[arg(long)]
    num_deauths: Option<u32>,

    /// Do not report networks to the ingestion service.
    #[arg(long)]
    no_sink: bool,

    /// Config file prefix (default: airscan).
    #[arg(long, default_value = "airscan")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let mut scan_config = load_scan_config(&cli.config)?;
    apply_cli(&cli, &mut scan_config)?;
    if scan_config.interface.trim().is_empty() {
        return Err(ScanError::MissingInterface.into());
    }

    let banner = CaptureSession::verify_installation(&scan_config.airodump_path).await?;
    tracing::info!(airodump = %banner, "airodump-ng verified");

    let mut capture = CaptureSession::start(&scan_config)?;
    tokio::time::sleep(Duration::from_secs(1)).await;
    capture.check_alive().await?;

    let mut engine = ScanEngine::from_config(scan_config, capture.dir())?;

    let mut registry = engine.subscribe();
    let reporter = tokio::spawn(async move {
        while registry.changed().await.is_ok() {
            let targets = registry.borrow_and_update().clone();
            log_registry(&targets);
        }
    });

    engine
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            }
        })
        .await;

    reporter.abort();
    capture.stop().await?;
    Ok(())
}

fn log_registry(targets: &Registry) {
    tracing::info!(targets = targets.len(), "Targets updated");
    for target in targets.iter() {
        tracing::debug!(summary = %target, "Target");
    }
}

fn apply_cli(cli: &Cli, config: &mut ScanConfig) -> anyhow::Result<()> {
    if let Some(iface) = &cli.interface {
        config.interface = iface.clone();
    }
    if cli.channel.is_some() {
        config.channel = cli.channel;
    }
    if let Some(band) = &cli.band {
        config.band = Some(parse_band(band)?);
    }

    let requested: Vec<EncryptionCategory> = [
        (cli.wep, EncryptionCategory::Wep),
        (cli.wpa, EncryptionCategory::Wpa),
        (cli.wps, EncryptionCategory::Wps),
    ]
    .into_iter()
    .filter_map(|(on, category)| on.then_some(category))
    .collect();
    if !requested.is_empty() {
        config.encryption_filter = requested;
    }

    if let Some(power) = cli.power {
        config.min_power = power;
    }
    if let Some(bssid) = &cli.bssid {
        config.target_bssid = Some(bssid.clone());
    }
    if let Some(essid) = &cli.essid {
        config.target_essid = Some(essid.clone());
    }
    if let Some(n) = cli.num_deauths {
        config.num_deauths = n;
    }
    config.ignore_essids.extend(cli.ignore_essid.iter().cloned());
    config.clients_only |= cli.clients_only;
    config.skip_wps |= cli.skip_wps;
    if cli.no_deauth {
        config.deauth_enabled = false;
    }
    if cli.no_sink {
        config.sink.enabled = false;
    }
    Ok(())
}

fn parse_band(s: &str) -> anyhow::Result<Band> {
    match s.to_lowercase().as_str() {
        "all" | "abg" => Ok(Band::All),
        "2" | "2.4" | "bg" => Ok(Band::TwoGhz),
        "5" | "a" => Ok(Band::FiveGhz),
        _ => anyhow::bail!("Invalid band: {s}. Choose: all, 2, 5"),
    }
}

fn load_scan_config(file_prefix: &str) -> anyhow::Result<ScanConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("AIRSCAN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    match cfg.get::<ScanConfig>("scan") {
        Ok(c) => Ok(c),
        Err(config::ConfigError::NotFound(_)) => Ok(ScanConfig::default()),
        Err(e) => Err(ScanError::Config(e.to_string()).into()),
    }
}
