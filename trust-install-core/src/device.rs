//! Device probing: rootedness and OS version.

use crate::bridge::DeviceBridge;
use crate::error::{InstallError, Result};

/// Property holding the user-visible Android release (e.g. `14`, `8.1.0`).
pub const VERSION_PROPERTY: &str = "ro.build.version.release";

/// First release that reads trust anchors from the Conscrypt APEX.
pub const APEX_TRUST_STORE_VERSION: u32 = 14;

/// What was learned about a rooted device during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Only probed when the installation mode is `auto`.
    pub os_major_version: Option<u32>,
}

impl DeviceInfo {
    /// Whether the device ships the isolated Conscrypt trust directory.
    ///
    /// `None` when the version was not probed.
    pub fn has_isolated_crypto_module(&self) -> Option<bool> {
        self.os_major_version
            .map(|version| version >= APEX_TRUST_STORE_VERSION)
    }
}

/// True iff `su` resolves on the device's search path.
pub fn is_rooted(bridge: &dyn DeviceBridge) -> Result<bool> {
    let found = bridge.shell(&["which", "su"])?;
    Ok(!found.trim().is_empty())
}

/// Major Android version of the device.
pub fn os_major_version(bridge: &dyn DeviceBridge) -> Result<u32> {
    parse_major_version(&bridge.property(VERSION_PROPERTY)?)
}

/// Parse the first `.`-separated segment of a release string.
pub fn parse_major_version(release: &str) -> Result<u32> {
    let major = release.trim().split('.').next().unwrap_or("");
    major
        .parse::<u32>()
        .map_err(|_| InstallError::Parse(format!("invalid Android version {:?}", release)))
}
