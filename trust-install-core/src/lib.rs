//! # Trust Install Core
//!
//! Installs a user-supplied X.509 certificate into the system trust store of a
//! rooted Android device reached over adb.
//!
//! ## Key Features
//! - **Version-adaptive installation**: permanent copy on legacy devices, a tmpfs
//!   overlay on Android 10-13, and overlay plus per-namespace propagation on 14+
//! - **One privileged shell per command**: no shell state survives between steps
//! - **Canonical trust-store entries**: `<subject_hash_old>.N` files with the PEM
//!   body followed by the text and fingerprint dump
//! - **Pluggable transports**: the adb bridge and the x509 tool sit behind traits

pub mod bridge;
pub mod cert;
pub mod collision;
pub mod config;
pub mod device;
pub mod error;
pub mod installer;
pub mod mechanism;
pub mod paths;
pub mod propagate;
pub mod root;
pub mod strategy;
pub mod x509;

#[cfg(test)]
pub(crate) mod testing;

pub use bridge::{AdbBridge, DeviceBridge, ShellOutput};
pub use cert::{CertFormat, PreparedCert, StagedCert};
pub use config::InstallConfig;
pub use device::DeviceInfo;
pub use error::{InstallError, Result};
pub use installer::{InstallOutcome, Installer};
pub use mechanism::{InstallMechanism, MechanismRegistry};
pub use paths::TrustStorePaths;
pub use propagate::PropagationReport;
pub use root::{CommandOutput, ExitCheck, RootSession};
pub use strategy::{InstallMode, Mechanism};
pub use x509::{CertEncoding, OpensslTool, X509Tool};
