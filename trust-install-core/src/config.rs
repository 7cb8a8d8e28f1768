//! Run configuration.

use crate::cert::CertFormat;
use crate::paths::TrustStorePaths;
use crate::strategy::InstallMode;
use std::path::PathBuf;

/// Everything one installation run needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallConfig {
    /// Local certificate file.
    pub cert_path: PathBuf,
    pub cert_format: CertFormat,
    pub mode: InstallMode,
    /// `None` selects the only connected device.
    pub device_serial: Option<String>,
    /// Remove the staged entry and temp cacerts dir after the run.
    pub clean_remote_temp: bool,
    pub paths: TrustStorePaths,
}

impl InstallConfig {
    /// Configuration with the CLI defaults for `cert_path`.
    pub fn new(cert_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            cert_format: CertFormat::Auto,
            mode: InstallMode::Auto,
            device_serial: None,
            clean_remote_temp: true,
            paths: TrustStorePaths::default(),
        }
    }

    pub fn with_format(mut self, format: CertFormat) -> Self {
        self.cert_format = format;
        self
    }

    pub fn with_mode(mut self, mode: InstallMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_device_serial(mut self, serial: Option<String>) -> Self {
        self.device_serial = serial;
        self
    }

    pub fn with_clean_remote_temp(mut self, clean: bool) -> Self {
        self.clean_remote_temp = clean;
        self
    }

    pub fn with_paths(mut self, paths: TrustStorePaths) -> Self {
        self.paths = paths;
        self
    }
}
