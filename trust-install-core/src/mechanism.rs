//! Installation mechanisms.
//!
//! Each mechanism expects the prepared entry to be uploaded already to
//! `<staging_dir>/<entry>` and runs its privileged steps strictly in order.
//! A failure mid-way leaves the device as it is; nothing is rolled back.

use crate::error::{InstallError, Result};
use crate::paths::{join, TrustStorePaths};
use crate::propagate::{propagate, PropagationReport};
use crate::root::RootSession;
use crate::strategy::Mechanism;
use std::collections::HashMap;
use std::fmt;

/// SELinux label the trust-store loader expects on entries and directory.
pub const SYSTEM_FILE_CONTEXT: &str = "u:object_r:system_file:s0";

/// Mode for trust-store entries.
pub const ENTRY_MODE: &str = "644";

/// One way of placing a staged entry into the trust store.
pub trait InstallMechanism {
    fn mechanism(&self) -> Mechanism;

    /// Directory holding the trust anchors this mechanism starts from.
    fn existing_entries_dir<'p>(&self, paths: &'p TrustStorePaths) -> &'p str;

    /// Install the staged entry into the trust store.
    ///
    /// # Arguments
    /// * `session` - Privileged session; every step runs in enforcing mode
    /// * `paths` - Remote trust-store locations
    /// * `entry` - Entry name already uploaded to `paths.staging_dir`
    ///
    /// # Returns
    /// The propagation report when the mechanism propagates, `None` otherwise.
    /// The first failing step aborts with a `RemoteCommand` error.
    fn install(
        &self,
        session: &RootSession<'_>,
        paths: &TrustStorePaths,
        entry: &str,
    ) -> Result<Option<PropagationReport>>;
}

/// Writes into `/system` directly; for devices up to Android 9.
#[derive(Debug, Default)]
pub struct PermanentInstall;

/// tmpfs overlay over the system trust dir; Android 10 to 13.
#[derive(Debug, Default)]
pub struct OverlayInstall;

/// tmpfs overlay seeded from the Conscrypt APEX plus namespace propagation;
/// Android 14 and later.
#[derive(Debug, Default)]
pub struct ApexOverlayInstall;

impl InstallMechanism for PermanentInstall {
    fn mechanism(&self) -> Mechanism {
        Mechanism::Permanent
    }

    fn existing_entries_dir<'p>(&self, paths: &'p TrustStorePaths) -> &'p str {
        &paths.system_cacerts_dir
    }

    fn install(
        &self,
        session: &RootSession<'_>,
        paths: &TrustStorePaths,
        entry: &str,
    ) -> Result<Option<PropagationReport>> {
        tracing::info!("[*] perform mode permanently");
        permanent_install(session, paths, entry)?;
        Ok(None)
    }
}

impl InstallMechanism for OverlayInstall {
    fn mechanism(&self) -> Mechanism {
        Mechanism::TemporaryOverlay
    }

    fn existing_entries_dir<'p>(&self, paths: &'p TrustStorePaths) -> &'p str {
        &paths.system_cacerts_dir
    }

    fn install(
        &self,
        session: &RootSession<'_>,
        paths: &TrustStorePaths,
        entry: &str,
    ) -> Result<Option<PropagationReport>> {
        tracing::info!("[*] perform mode temporary");
        overlay_install(session, paths, &paths.system_cacerts_dir, entry)?;
        Ok(None)
    }
}

impl InstallMechanism for ApexOverlayInstall {
    fn mechanism(&self) -> Mechanism {
        Mechanism::OverlayWithPropagation
    }

    fn existing_entries_dir<'p>(&self, paths: &'p TrustStorePaths) -> &'p str {
        &paths.apex_cacerts_dir
    }

    fn install(
        &self,
        session: &RootSession<'_>,
        paths: &TrustStorePaths,
        entry: &str,
    ) -> Result<Option<PropagationReport>> {
        tracing::info!("[*] perform mode apex-temporary");
        overlay_install(session, paths, &paths.apex_cacerts_dir, entry)?;
        Ok(Some(propagate(session, paths)))
    }
}

/// Copy the staged entry into a read-write remounted system partition.
pub fn permanent_install(
    session: &RootSession<'_>,
    paths: &TrustStorePaths,
    entry: &str,
) -> Result<()> {
    let staged = paths.staged(entry);
    let installed = join(&paths.system_cacerts_dir, entry);

    session.exec(&["mount", "-o", "rw,remount,rw", &paths.system_mount_point])?;
    session.exec(&["cp", &staged, &paths.system_cacerts_dir])?;
    session.exec(&["chmod", ENTRY_MODE, &installed])?;
    session.exec(&["mount", "-o", "ro,remount,ro", &paths.system_mount_point])?;

    tracing::info!("[+] permanent install complete");
    Ok(())
}

/// Mount a tmpfs over the system trust dir holding the entries of
/// `source_dir` plus the staged entry.
///
/// The overlay is memory-backed and disappears on reboot.
pub fn overlay_install(
    session: &RootSession<'_>,
    paths: &TrustStorePaths,
    source_dir: &str,
    entry: &str,
) -> Result<()> {
    let temp = &paths.temp_cacerts_dir;
    let target = &paths.system_cacerts_dir;
    let staged = paths.staged(entry);
    let source_entries = join(source_dir, "*");
    let temp_entries = join(temp, "*");
    let target_entries = join(target, "*");

    session.exec(&["mkdir", "-p", "-m", "700", temp])?;
    session.exec(&["cp", &source_entries, temp])?;
    session.exec(&["mount", "-t", "tmpfs", "tmpfs", target])?;
    session.exec(&["cp", &temp_entries, target])?;
    session.exec(&["cp", &staged, target])?;
    session.exec(&["chmod", ENTRY_MODE, &target_entries])?;
    // Without the label the loader ignores the new entries under enforcing SELinux.
    session.exec(&["chcon", SYSTEM_FILE_CONTEXT, &target_entries])?;
    session.exec(&["chcon", SYSTEM_FILE_CONTEXT, target])?;

    tracing::info!("[+] temporary install complete");
    Ok(())
}

/// Lookup table from [`Mechanism`] to its implementation.
pub struct MechanismRegistry {
    mechanisms: HashMap<Mechanism, Box<dyn InstallMechanism>>,
}

impl MechanismRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            mechanisms: HashMap::new(),
        }
    }

    /// Registry holding the three built-in mechanisms.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(PermanentInstall));
        registry.register(Box::new(OverlayInstall));
        registry.register(Box::new(ApexOverlayInstall));
        registry
    }

    /// Register a mechanism, replacing any previous one of the same kind.
    pub fn register(&mut self, mechanism: Box<dyn InstallMechanism>) {
        self.mechanisms.insert(mechanism.mechanism(), mechanism);
    }

    pub fn get(&self, mechanism: Mechanism) -> Result<&dyn InstallMechanism> {
        self.mechanisms
            .get(&mechanism)
            .map(|b| b.as_ref())
            .ok_or(InstallError::UnregisteredMechanism(mechanism))
    }

    /// Registered mechanisms, sorted.
    pub fn mechanisms(&self) -> Vec<Mechanism> {
        let mut kinds: Vec<Mechanism> = self.mechanisms.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

impl Default for MechanismRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for MechanismRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MechanismRegistry")
            .field("mechanisms", &self.mechanisms())
            .finish()
    }
}
