//! Installation strategy selection.
//!
//! `auto` maps the detected major version onto a mechanism through
//! [`VERSION_TABLE`]. An explicit mode picks its mechanism directly, even if
//! it does not suit the device; the mechanism's own commands then fail.

use crate::error::Result;
use std::fmt;

/// User-facing installation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InstallMode {
    #[default]
    Auto,
    Permanently,
    Temporary,
    ApexTemporary,
}

/// The procedure that places the certificate into the trust store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Mechanism {
    /// Remount `/system` read-write and copy the entry in.
    Permanent,
    /// tmpfs over the system trust directory, seeded from itself.
    TemporaryOverlay,
    /// tmpfs seeded from the Conscrypt APEX, then bind-mounted into every
    /// live zygote namespace.
    OverlayWithPropagation,
}

/// Lowest major version for each mechanism, ascending.
pub const VERSION_TABLE: &[(u32, Mechanism)] = &[
    (0, Mechanism::Permanent),
    (10, Mechanism::TemporaryOverlay),
    (14, Mechanism::OverlayWithPropagation),
];

impl Mechanism {
    /// Mechanism suited to Android `version`.
    pub fn for_version(version: u32) -> Mechanism {
        VERSION_TABLE
            .iter()
            .rev()
            .find(|(min, _)| version >= *min)
            .map(|(_, mechanism)| *mechanism)
            .unwrap_or(Mechanism::Permanent)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mechanism::Permanent => "permanent",
            Mechanism::TemporaryOverlay => "temporary-overlay",
            Mechanism::OverlayWithPropagation => "apex-overlay",
        }
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl InstallMode {
    /// The mechanism an explicit mode forces, `None` for `auto`.
    pub fn forced_mechanism(self) -> Option<Mechanism> {
        match self {
            InstallMode::Auto => None,
            InstallMode::Permanently => Some(Mechanism::Permanent),
            InstallMode::Temporary => Some(Mechanism::TemporaryOverlay),
            InstallMode::ApexTemporary => Some(Mechanism::OverlayWithPropagation),
        }
    }

    /// Pick the mechanism, calling `detect_version` only for `auto`.
    ///
    /// Returns the mechanism and the version if one was detected.
    pub fn resolve<F>(self, detect_version: F) -> Result<(Mechanism, Option<u32>)>
    where
        F: FnOnce() -> Result<u32>,
    {
        match self.forced_mechanism() {
            Some(mechanism) => Ok((mechanism, None)),
            None => {
                let version = detect_version()?;
                tracing::info!("[*] detect android version {}", version);
                Ok((Mechanism::for_version(version), Some(version)))
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InstallMode::Auto => "auto",
            InstallMode::Permanently => "permanently",
            InstallMode::Temporary => "temporary",
            InstallMode::ApexTemporary => "apex-temporary",
        }
    }
}

impl fmt::Display for InstallMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
