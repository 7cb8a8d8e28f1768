//! Certificate preparation.
//!
//! Turns a local PEM or DER certificate into the file the Android trust
//! store expects: named `<subject_hash_old>.0`, containing the PEM block
//! followed by openssl's text and fingerprint dump. The trailer is ignored
//! by the loader but kept byte-compatible with entries written by the
//! platform tooling.

use crate::error::{InstallError, Result};
use crate::x509::{CertEncoding, X509Tool};
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";

/// Requested input format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CertFormat {
    /// Infer from the file extension.
    #[default]
    Auto,
    Pem,
    Der,
}

impl CertFormat {
    /// Resolve to a concrete encoding for `path`.
    pub fn resolve(self, path: &Path) -> Result<CertEncoding> {
        match self {
            CertFormat::Pem => Ok(CertEncoding::Pem),
            CertFormat::Der => Ok(CertEncoding::Der),
            CertFormat::Auto => {
                let ext = path.extension().and_then(OsStr::to_str).unwrap_or("");
                match ext.to_ascii_lowercase().as_str() {
                    "pem" => Ok(CertEncoding::Pem),
                    "der" => Ok(CertEncoding::Der),
                    _ => Err(InstallError::UnknownFormat(ext.to_string())),
                }
            }
        }
    }
}

impl fmt::Display for CertFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertFormat::Auto => write!(f, "auto"),
            CertFormat::Pem => write!(f, "pem"),
            CertFormat::Der => write!(f, "der"),
        }
    }
}

/// A certificate in trust-store form, held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedCert {
    /// Legacy subject hash, trimmed (e.g. `9a5ba575`).
    pub subject_hash: String,
    /// Canonical entry name, `<subject_hash>.0`.
    pub name: String,
    /// PEM block followed by the text and fingerprint dump.
    pub content: String,
}

impl PreparedCert {
    pub fn new(subject_hash: &str, pem: &str, text_dump: &str) -> Self {
        let subject_hash = subject_hash.trim().to_string();
        Self {
            name: entry_name(&subject_hash, 0),
            subject_hash,
            content: format!("{}{}", pem, text_dump),
        }
    }

    /// Entry name using collision suffix `suffix`.
    pub fn entry_name(&self, suffix: u32) -> String {
        entry_name(&self.subject_hash, suffix)
    }

    /// The leading PEM block of the content.
    pub fn pem_block(&self) -> Option<&str> {
        first_pem_block(&self.content)
    }
}

fn entry_name(subject_hash: &str, suffix: u32) -> String {
    format!("{}.{}", subject_hash, suffix)
}

/// Prepare `path` for the trust store.
///
/// The converted PEM lives in a scratch directory that is removed on every
/// return path. No device I/O happens here.
pub fn prepare(path: &Path, format: CertFormat, tool: &dyn X509Tool) -> Result<PreparedCert> {
    let encoding = format.resolve(path)?;

    let scratch = tempfile::Builder::new()
        .prefix("trust-install-")
        .tempdir()?;
    let stem = path.file_stem().unwrap_or_else(|| OsStr::new("cert"));
    let converted = scratch.path().join(stem).with_extension("pem");

    tool.convert(path, encoding, &converted)?;

    let subject_hash = tool.subject_hash_old(&converted)?;
    let subject_hash = subject_hash.trim();
    if subject_hash.is_empty() || !subject_hash.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(InstallError::Parse(format!(
            "invalid subject hash {:?}",
            subject_hash
        )));
    }

    let pem = tool.certificate_pem(&converted)?;
    let text_dump = tool.text_dump(&converted)?;

    let prepared = PreparedCert::new(subject_hash, &pem, &text_dump);
    tracing::info!("[+] prepare certificate: {}", prepared.name);
    Ok(prepared)
}

/// The prepared content written to a local temp file for upload.
///
/// The file and its directory are deleted when this value is dropped.
#[derive(Debug)]
pub struct StagedCert {
    _dir: TempDir,
    path: PathBuf,
}

impl StagedCert {
    /// Write `cert` to a fresh temp directory under `name`.
    pub fn write(cert: &PreparedCert, name: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("trust-install-")
            .tempdir()?;
        let path = dir.path().join(name);
        std::fs::write(&path, cert.content.as_bytes())?;
        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// First `BEGIN/END CERTIFICATE` block of `text`, delimiters included.
pub fn first_pem_block(text: &str) -> Option<&str> {
    let start = text.find(PEM_BEGIN)?;
    let end = text[start..].find(PEM_END)? + start + PEM_END.len();
    Some(&text[start..end])
}
