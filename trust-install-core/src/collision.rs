//! Trust-store filename collisions.
//!
//! Distinct certificates can share a legacy subject hash. The platform
//! convention is to number them `.0`, `.1`, ... so an existing entry holding
//! a different certificate is never overwritten. Only the unprivileged shell
//! is used here; the trust directories are world-readable.

use crate::bridge::DeviceBridge;
use crate::cert::{first_pem_block, PreparedCert};
use crate::error::Result;
use crate::paths::join;
use std::collections::HashSet;

/// Pick the entry name for `cert` in `existing_dir`.
///
/// The first free suffix wins; an entry already holding the same
/// certificate is reused so re-installs stay idempotent.
pub fn resolve_entry_name(
    bridge: &dyn DeviceBridge,
    existing_dir: &str,
    cert: &PreparedCert,
) -> Result<String> {
    let listing = bridge.shell(&["ls", existing_dir])?;
    let existing: HashSet<&str> = listing.split_whitespace().collect();

    // At most existing.len() candidates can be taken.
    for suffix in 0..=existing.len() as u32 {
        let candidate = cert.entry_name(suffix);
        if !existing.contains(candidate.as_str()) {
            return Ok(candidate);
        }

        let installed = bridge.shell(&["cat", &join(existing_dir, &candidate)])?;
        if same_certificate(&installed, cert) {
            tracing::info!("[*] {} already holds this certificate; reinstalling", candidate);
            return Ok(candidate);
        }

        tracing::warn!(
            "{} in {} holds a different certificate with the same subject hash; trying next suffix",
            candidate,
            existing_dir
        );
    }

    // Unreachable: the loop above always finds a free suffix.
    Ok(cert.entry_name(existing.len() as u32 + 1))
}

fn same_certificate(installed: &str, cert: &PreparedCert) -> bool {
    match (first_pem_block(&normalize(installed)), cert.pem_block()) {
        (Some(a), Some(b)) => a == normalize(b),
        _ => false,
    }
}

fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n")
}
