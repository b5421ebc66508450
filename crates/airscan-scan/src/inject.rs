//! Deauth injection through short-lived aireplay-ng processes.

use std::io::ErrorKind;
use std::process::Stdio;

use tokio::process::Command;

use crate::config::ScanConfig;
use crate::decloak::DeauthRequest;
use crate::error::{Result, ScanError};

/// Launches deauth requests without waiting for them to finish.
pub trait Injector: Send + Sync {
    /// Start the injection. Errors only report a failed launch.
    fn dispatch(&self, request: &DeauthRequest) -> Result<()>;
}

/// Wrapper around the aireplay-ng binary.
pub struct AireplayInjector {
    aireplay_path: String,
    interface: String,
    num_deauths: u32,
}

impl AireplayInjector {
    pub fn new(aireplay_path: &str, interface: &str, num_deauths: u32) -> Self {
        Self {
            aireplay_path: aireplay_path.to_string(),
            interface: interface.to_string(),
            num_deauths,
        }
    }

    pub fn from_config(config: &ScanConfig) -> Self {
        Self::new(&config.aireplay_path, &config.interface, config.num_deauths)
    }

    /// aireplay-ng arguments for one request.
    pub fn args(&self, request: &DeauthRequest) -> Vec<String> {
        let mut args = vec![
            "-0".to_string(),
            self.num_deauths.to_string(),
            "--ignore-negative-one".to_string(),
        ];
        match request {
            DeauthRequest::Broadcast { bssid } => {
                args.extend(["-a".to_string(), bssid.clone()]);
            }
            DeauthRequest::Client { bssid, station } => {
                args.extend([
                    "-a".to_string(),
                    bssid.clone(),
                    "-c".to_string(),
                    station.clone(),
                ]);
            }
        }
        args.push(self.interface.clone());
        args
    }
}

impl Injector for AireplayInjector {
    fn dispatch(&self, request: &DeauthRequest) -> Result<()> {
        let mut child = Command::new(&self.aireplay_path)
            .args(self.args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => ScanError::InjectToolNotFound {
                    path: self.aireplay_path.clone(),
                },
                _ => ScanError::Io(e),
            })?;

        let request = request.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if !status.success() => {
                    tracing::debug!(?request, code = ?status.code(), "aireplay-ng exited with failure");
                }
                Ok(_) => {}
                Err(e) => tracing::debug!(?request, error = %e, "Failed to reap aireplay-ng"),
            }
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_args() {
        let inj = AireplayInjector::new("aireplay-ng", "wlan0mon", 1);
        let args = inj.args(&DeauthRequest::Broadcast {
            bssid: "aa:aa:aa:aa:aa:aa".into(),
        });
        assert_eq!(
            args,
            vec![
                "-0",
                "1",
                "--ignore-negative-one",
                "-a",
                "aa:aa:aa:aa:aa:aa",
                "wlan0mon"
            ]
        );
    }

    #[test]
    fn test_client_args() {
        let inj = AireplayInjector::new("aireplay-ng", "wlan0mon", 5);
        let args = inj.args(&DeauthRequest::Client {
            bssid: "aa:aa:aa:aa:aa:aa".into(),
            station: "11:11:11:11:11:11".into(),
        });
        assert_eq!(
            args,
            vec![
                "-0",
                "5",
                "--ignore-negative-one",
                "-a",
                "aa:aa:aa:aa:aa:aa",
                "-c",
                "11:11:11:11:11:11",
                "wlan0mon"
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_binary_reports_not_found() {
        let inj = AireplayInjector::new("/nonexistent/aireplay-ng", "wlan0mon", 1);
        let err = inj
            .dispatch(&DeauthRequest::Broadcast {
                bssid: "aa:aa:aa:aa:aa:aa".into(),
            })
            .unwrap_err();
        assert!(matches!(err, ScanError::InjectToolNotFound { .. }));
    }
}
