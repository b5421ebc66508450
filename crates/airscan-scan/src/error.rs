//! Error types for the airscan-scan crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("No wireless interface configured (set scan.interface or pass -i)")]
    MissingInterface,

    #[error("Capture tool not found at path: {path}")]
    CaptureToolNotFound { path: String },

    #[error("Permission denied launching {path} on interface {interface} (are you root?)")]
    CapturePermission { path: String, interface: String },

    #[error("Capture process exited with code {code}: {stderr}")]
    CaptureExited { code: i32, stderr: String },

    #[error("Injection tool not found at path: {path}")]
    InjectToolNotFound { path: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScanError>;
