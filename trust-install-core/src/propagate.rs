//! Runtime propagation of the trust-store overlay into live processes.
//!
//! The Conscrypt APEX trust directory is bind-mounted into each process's own
//! mount namespace when the process is created. A mount made afterwards in
//! the global namespace never reaches zygote or anything it already forked,
//! so the bind has to be repeated inside every one of those namespaces.

use crate::bridge::DeviceBridge;
use crate::error::Result;
use crate::paths::TrustStorePaths;
use crate::root::RootSession;
use std::collections::HashSet;

/// Zygote process names; some devices run both at once.
pub const ZYGOTE_PROCESSES: &[&str] = &["zygote", "zygote64"];

/// Outcome of a propagation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropagationReport {
    pub zygotes: Vec<u32>,
    /// PIDs whose namespace received the bind mount.
    pub bound: Vec<u32>,
    /// PIDs whose bind failed, with the error.
    pub failed: Vec<(u32, String)>,
}

impl PropagationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// PIDs of every running zygote instance.
///
/// A zygote name whose lookup fails is logged and skipped.
pub fn zygote_pids(bridge: &dyn DeviceBridge) -> Vec<u32> {
    let mut pids = Vec::new();
    for name in ZYGOTE_PROCESSES {
        match bridge.shell(&["pidof", name]) {
            Ok(listing) => pids.extend(parse_pids(&listing)),
            Err(e) => tracing::warn!("failed to look up {}: {}", name, e),
        }
    }
    pids
}

/// Direct children of `parent`.
pub fn child_pids(bridge: &dyn DeviceBridge, parent: u32) -> Result<Vec<u32>> {
    let parent = parent.to_string();
    let listing = bridge.shell(&["ps", "-o", "PID", "-P", &parent])?;
    Ok(parse_pids(&listing))
}

/// Numeric tokens of `text`; headers and noise are skipped.
pub fn parse_pids(text: &str) -> Vec<u32> {
    text.split_whitespace()
        .filter_map(|token| token.parse().ok())
        .collect()
}

/// Each zygote's children followed by the zygote itself, without duplicates.
pub fn propagation_targets<F>(zygotes: &[u32], mut children_of: F) -> Vec<u32>
where
    F: FnMut(u32) -> Vec<u32>,
{
    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for &zygote in zygotes {
        let mut group = children_of(zygote);
        group.push(zygote);
        for pid in group {
            if seen.insert(pid) {
                targets.push(pid);
            }
        }
    }
    targets
}

/// Command binding the system trust dir over the APEX dir inside `pid`'s namespace.
pub fn bind_command(pid: u32, paths: &TrustStorePaths) -> Vec<String> {
    vec![
        "nsenter".to_string(),
        format!("--mount=/proc/{}/ns/mnt", pid),
        "--".to_string(),
        "/bin/mount".to_string(),
        "--bind".to_string(),
        paths.system_cacerts_dir.clone(),
        paths.apex_cacerts_dir.clone(),
    ]
}

/// Bind the updated trust store into every live zygote-derived namespace.
///
/// Best-effort throughout: a failed lookup or bind is logged and recorded,
/// and the remaining PIDs are still tried. Nothing is rolled back.
///
/// # Arguments
/// * `session` - Privileged session on the device
/// * `paths` - Trust-store locations; the system dir is bound over the APEX dir
///
/// # Returns
/// The PIDs that were bound and those whose bind failed
pub fn propagate(session: &RootSession<'_>, paths: &TrustStorePaths) -> PropagationReport {
    let bridge = session.bridge();
    let zygotes = zygote_pids(bridge);
    if zygotes.is_empty() {
        tracing::warn!("no zygote process found; running apps keep their old trust store");
    }

    let targets = propagation_targets(&zygotes, |zygote| {
        tracing::info!(
            "[*] found zygote process with pid {}. Inject certificates to it and all children",
            zygote
        );
        child_pids(bridge, zygote).unwrap_or_else(|e| {
            tracing::warn!("failed to list children of zygote {}: {}; binding it alone", zygote, e);
            Vec::new()
        })
    });

    let mut report = PropagationReport {
        zygotes,
        ..PropagationReport::default()
    };

    for pid in targets {
        let argv = bind_command(pid, paths);
        let argv: Vec<&str> = argv.iter().map(String::as_str).collect();
        let failure = match session.exec_best_effort(&argv) {
            Ok(output) if output.success() => None,
            Ok(output) => Some(format!(
                "exit status {}: {}",
                output.exit_code,
                output.stderr.trim()
            )),
            Err(e) => Some(e.to_string()),
        };

        match failure {
            None => report.bound.push(pid),
            Some(reason) => {
                tracing::warn!("bind mount into namespace of pid {} failed: {}", pid, reason);
                report.failed.push((pid, reason));
            }
        }
    }

    tracing::info!(
        "[+] runtime certificate injection complete ({} bound, {} failed)",
        report.bound.len(),
        report.failed.len()
    );
    report
}
