//! End-to-end installation flow.
//!
//! Order of operations:
//! 1. Check for `su`. An unrooted device stops the run before anything else
//!    is sent.
//! 2. Select the mechanism (the version is only read in `auto` mode).
//! 3. Prepare the certificate locally.
//! 4. Resolve the entry name against the existing trust anchors.
//! 5. Upload the entry to the staging directory.
//! 6. Run the mechanism (and propagation, where it applies).
//! 7. Clean remote temp files, even after a failed mechanism. Cleanup errors
//!    are logged and never replace the primary result.

use crate::bridge::DeviceBridge;
use crate::cert::{self, PreparedCert, StagedCert};
use crate::collision;
use crate::config::InstallConfig;
use crate::device::{self, DeviceInfo};
use crate::error::{InstallError, Result};
use crate::mechanism::MechanismRegistry;
use crate::paths::TrustStorePaths;
use crate::propagate::PropagationReport;
use crate::root::RootSession;
use crate::strategy::Mechanism;
use crate::x509::X509Tool;

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub mechanism: Mechanism,
    pub device: DeviceInfo,
    /// Entry name inside the trust store, e.g. `9a5ba575.0`.
    pub entry_name: String,
    pub propagation: Option<PropagationReport>,
}

/// Drives one installation against one device.
pub struct Installer<'a> {
    bridge: &'a dyn DeviceBridge,
    tool: &'a dyn X509Tool,
    registry: MechanismRegistry,
}

impl<'a> Installer<'a> {
    pub fn new(bridge: &'a dyn DeviceBridge, tool: &'a dyn X509Tool) -> Self {
        Self {
            bridge,
            tool,
            registry: MechanismRegistry::with_defaults(),
        }
    }

    /// Replace the mechanism lookup table.
    pub fn with_registry(mut self, registry: MechanismRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn run(&self, config: &InstallConfig) -> Result<InstallOutcome> {
        let paths = &config.paths;
        tracing::info!(
            "[*] install {} (mode {}, format {})",
            config.cert_path.display(),
            config.mode,
            config.cert_format
        );

        if !device::is_rooted(self.bridge)? {
            return Err(InstallError::UnrootedDevice);
        }

        let (mechanism, version) = config
            .mode
            .resolve(|| device::os_major_version(self.bridge))?;
        let device = DeviceInfo {
            os_major_version: version,
        };
        if let Some(isolated) = device.has_isolated_crypto_module() {
            tracing::debug!("isolated Conscrypt trust store: {}", isolated);
        }

        let handler = self.registry.get(mechanism)?;
        let prepared = cert::prepare(&config.cert_path, config.cert_format, self.tool)?;
        let entry_name = collision::resolve_entry_name(
            self.bridge,
            handler.existing_entries_dir(paths),
            &prepared,
        )?;
        let remote_entry = paths.staged(&entry_name);

        let session = RootSession::open(self.bridge);
        let result = self
            .upload(&prepared, &entry_name, &remote_entry)
            .and_then(|()| handler.install(&session, paths, &entry_name));

        if config.clean_remote_temp {
            clean_remote_temp(&session, paths, &remote_entry);
        }

        Ok(InstallOutcome {
            mechanism,
            device,
            entry_name,
            propagation: result?,
        })
    }

    fn upload(&self, prepared: &PreparedCert, entry_name: &str, remote: &str) -> Result<()> {
        let staged = StagedCert::write(prepared, entry_name)?;
        self.bridge.push(staged.path(), remote)?;
        tracing::info!("[+] push prepared certificate: {}", remote);
        Ok(())
    }
}

/// Best-effort removal of the temp cacerts copy and the staged entry.
fn clean_remote_temp(session: &RootSession<'_>, paths: &TrustStorePaths, remote_entry: &str) {
    for target in [paths.temp_cacerts_dir.as_str(), remote_entry] {
        match session.exec_best_effort(&["rm", "-r", target]) {
            Ok(output) if !output.success() => {
                tracing::debug!(
                    "rm -r {} exited with {}: {}",
                    target,
                    output.exit_code,
                    output.stderr.trim()
                );
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("failed to remove {}: {}", target, e),
        }
    }
    tracing::info!("[+] clean temporary files");
}
