//! Well-known remote filesystem locations.
//!
//! Every mechanism mutates the same handful of directories, so they are
//! gathered in one value and handed to each step explicitly.

/// Staging area for the uploaded certificate.
pub const REMOTE_STAGING_DIR: &str = "/data/local/tmp";
/// Private copy of the pre-existing trust anchors during an overlay install.
pub const REMOTE_TEMP_CACERTS_DIR: &str = "/data/local/tmp/cacerts";
/// Traditional system trust-store directory.
pub const SYSTEM_CACERTS_DIR: &str = "/system/etc/security/cacerts";
/// Trust anchors of the Conscrypt APEX module (Android 14+).
pub const APEX_CACERTS_DIR: &str = "/apex/com.android.conscrypt/cacerts";
/// Partition remounted read-write by the permanent install.
pub const SYSTEM_MOUNT_POINT: &str = "/system";

/// Remote paths used by the installation mechanisms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustStorePaths {
    pub staging_dir: String,
    pub temp_cacerts_dir: String,
    pub system_cacerts_dir: String,
    pub apex_cacerts_dir: String,
    pub system_mount_point: String,
}

impl TrustStorePaths {
    /// Remote path of a file uploaded to the staging area.
    pub fn staged(&self, name: &str) -> String {
        join(&self.staging_dir, name)
    }
}

impl Default for TrustStorePaths {
    fn default() -> Self {
        Self {
            staging_dir: REMOTE_STAGING_DIR.to_string(),
            temp_cacerts_dir: REMOTE_TEMP_CACERTS_DIR.to_string(),
            system_cacerts_dir: SYSTEM_CACERTS_DIR.to_string(),
            apex_cacerts_dir: APEX_CACERTS_DIR.to_string(),
            system_mount_point: SYSTEM_MOUNT_POINT.to_string(),
        }
    }
}

/// Join remote POSIX path segments regardless of the host platform.
pub fn join(dir: &str, entry: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), entry)
}
