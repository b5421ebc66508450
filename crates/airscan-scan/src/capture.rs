//! airodump-ng process wrapper.
//!
//! A `CaptureSession` owns the running capture process and its scratch
//! files. Creating one starts airodump; `stop` or dropping it interrupts the
//! process and removes what it wrote, on every exit path.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use uuid::Uuid;

use crate::config::ScanConfig;
use crate::error::{Result, ScanError};

/// How long airodump gets to flush its files after SIGINT in `stop`.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Shorter blocking grace used when the session is dropped without `stop`.
const DROP_GRACE: Duration = Duration::from_millis(500);

/// A running airodump-ng capture writing snapshots into `dir`.
pub struct CaptureSession {
    session_id: Uuid,
    child: Child,
    dir: PathBuf,
    prefix: String,
    delete_files: bool,
    started: Instant,
    // Declared last so it is removed after our own cleanup in Drop.
    _scratch: Option<TempDir>,
}

impl CaptureSession {
    /// Verify airodump-ng is installed and accessible.
    pub async fn verify_installation(airodump_path: &str) -> Result<String> {
        let output = Command::new(airodump_path)
            .arg("--help")
            .output()
            .await
            .map_err(|_| ScanError::CaptureToolNotFound {
                path: airodump_path.to_string(),
            })?;

        let banner = String::from_utf8_lossy(&output.stdout);
        Ok(banner
            .lines()
            .find(|l| !l.trim().is_empty())
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    /// airodump-ng arguments writing to `<csv_prefix>-NN.{csv,cap|ivs}`.
    pub fn command_args(config: &ScanConfig, csv_prefix: &Path) -> Vec<String> {
        let mut args = vec![
            config.interface.clone(),
            // Background mode: we read the CSV, not the curses UI.
            "--background".to_string(),
            "1".to_string(),
            "-a".to_string(),
            "-w".to_string(),
            csv_prefix.display().to_string(),
            "--write-interval".to_string(),
            "1".to_string(),
        ];

        if let Some(channel) = config.channel {
            args.extend(["-c".to_string(), channel.to_string()]);
        } else if let Some(band) = config.band {
            args.extend(["--band".to_string(), band.airodump_flag().to_string()]);
        }

        if let Some(enc) = &config.capture_encryption {
            args.extend(["--enc".to_string(), enc.clone()]);
        }
        if config.capture_wps {
            args.push("--wps".to_string());
        }
        if let Some(bssid) = &config.target_bssid {
            args.extend(["--bssid".to_string(), bssid.clone()]);
        }

        let formats = if config.ivs_only { "ivs,csv" } else { "pcap,csv" };
        args.extend(["--output-format".to_string(), formats.to_string()]);
        args
    }

    /// Start airodump-ng.
    ///
    /// Fails with `MissingInterface` before touching anything when no
    /// interface is configured, `CaptureToolNotFound` when the binary is
    /// missing, and `CapturePermission` when it may not be executed.
    pub fn start(config: &ScanConfig) -> Result<Self> {
        if config.interface.trim().is_empty() {
            return Err(ScanError::MissingInterface);
        }

        let (dir, scratch) = match &config.scratch_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                (dir.clone(), None)
            }
            None => {
                let tmp = tempfile::Builder::new().prefix("airscan").tempdir()?;
                (tmp.path().to_path_buf(), Some(tmp))
            }
        };

        if config.delete_existing_files {
            delete_output_files(&dir, &config.output_prefix);
        }

        let session_id = Uuid::new_v4();
        let args = Self::command_args(config, &dir.join(&config.output_prefix));

        let child = Command::new(&config.airodump_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => ScanError::CaptureToolNotFound {
                    path: config.airodump_path.clone(),
                },
                ErrorKind::PermissionDenied => ScanError::CapturePermission {
                    path: config.airodump_path.clone(),
                    interface: config.interface.clone(),
                },
                _ => ScanError::Io(e),
            })?;

        tracing::info!(
            session_id = %session_id,
            interface = %config.interface,
            dir = %dir.display(),
            args = ?args,
            "Started capture"
        );

        Ok(Self {
            session_id,
            child,
            dir,
            prefix: config.output_prefix.clone(),
            delete_files: config.delete_existing_files,
            started: Instant::now(),
            _scratch: scratch,
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Directory airodump writes its snapshots into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Fail with `CaptureExited` if airodump already died, e.g. because the
    /// interface does not exist or is not in monitor mode.
    pub async fn check_alive(&mut self) -> Result<()> {
        let Some(status) = self.child.try_wait()? else {
            return Ok(());
        };

        let mut stderr = String::new();
        if let Some(mut pipe) = self.child.stderr.take() {
            if let Err(e) = pipe.read_to_string(&mut stderr).await {
                tracing::debug!(error = %e, "Could not read capture stderr");
            }
        }

        Err(ScanError::CaptureExited {
            code: status.code().unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        })
    }

    /// Stop airodump with SIGINT so it flushes its last CSV and capture
    /// writes, killing it if it has not exited within the grace period.
    /// Output files are removed afterwards when configured.
    pub async fn stop(mut self) -> Result<()> {
        if self.exited() {
            return Ok(());
        }

        if self.interrupt() {
            match tokio::time::timeout(STOP_GRACE, self.child.wait()).await {
                Ok(Ok(status)) => {
                    tracing::debug!(code = ?status.code(), "Capture exited after SIGINT");
                    return Ok(());
                }
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Error waiting for capture process");
                }
                Err(_) => {
                    tracing::warn!("Capture did not stop on SIGINT, killing");
                }
            }
        }

        self.child.kill().await?;
        Ok(())
    }

    fn exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    /// Send SIGINT. Returns false when no signal could be delivered.
    fn interrupt(&self) -> bool {
        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.child.id() {
                return kill(Pid::from_raw(pid as i32), Signal::SIGINT).is_ok();
            }
        }
        false
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if !self.exited() {
            if self.interrupt() {
                let deadline = Instant::now() + DROP_GRACE;
                while Instant::now() < deadline && !self.exited() {
                    std::thread::sleep(Duration::from_millis(20));
                }
            }
            if !self.exited() {
                if let Err(e) = self.child.start_kill() {
                    tracing::debug!(error = %e, "Capture process already gone");
                }
            }
        }
        if self.delete_files {
            delete_output_files(&self.dir, &self.prefix);
        }
        tracing::info!(
            session_id = %self.session_id,
            duration_ms = self.started.elapsed().as_millis(),
            "Capture stopped"
        );
    }
}

/// Remove `<prefix>*` files plus `replay_*.cap` and `*.xor` leftovers from
/// `dir`. Returns how many files were removed.
pub fn delete_output_files(dir: &Path, prefix: &str) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let stale = name.starts_with(prefix)
            || (name.starts_with("replay_") && name.ends_with(".cap"))
            || name.ends_with(".xor");
        if !stale {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(e) => tracing::debug!(file = %name, error = %e, "Failed to remove capture file"),
        }
    }
    removed
}
