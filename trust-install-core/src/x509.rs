//! External x509 tool used for format conversion and trust-store metadata.
//!
//! The legacy subject hash (`-subject_hash_old`) and the text dump appended to
//! each trust-store entry must match what the platform tooling produces, so
//! they come from the `openssl` CLI rather than an in-process parser.

use crate::error::{InstallError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Environment variable overriding the `openssl` executable.
pub const OPENSSL_ENV: &str = "OPENSSL";

/// On-disk certificate encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertEncoding {
    Pem,
    Der,
}

impl CertEncoding {
    /// Value for openssl's `-inform` option.
    pub fn inform(&self) -> &'static str {
        match self {
            CertEncoding::Pem => "PEM",
            CertEncoding::Der => "DER",
        }
    }
}

/// File-based x509 operations.
///
/// All methods except [`X509Tool::convert`] expect a PEM certificate path.
pub trait X509Tool {
    /// Re-encode a certificate as PEM.
    ///
    /// # Arguments
    /// * `input` - Certificate file to read
    /// * `inform` - Encoding of `input`
    /// * `output` - Where the PEM result is written
    ///
    /// # Returns
    /// A `Conversion` error if the tool rejects the input.
    fn convert(&self, input: &Path, inform: CertEncoding, output: &Path) -> Result<()>;

    /// Legacy (pre-1.0 openssl) subject hash, as printed by the tool.
    ///
    /// # Returns
    /// The raw tool output; callers trim and validate it.
    fn subject_hash_old(&self, pem: &Path) -> Result<String>;

    /// The certificate re-emitted as a PEM block.
    fn certificate_pem(&self, pem: &Path) -> Result<String>;

    /// Human-readable text dump followed by the fingerprint line.
    fn text_dump(&self, pem: &Path) -> Result<String>;
}

/// [`X509Tool`] backed by the `openssl x509` command.
#[derive(Debug, Clone)]
pub struct OpensslTool {
    program: PathBuf,
}

impl OpensslTool {
    /// Use `$OPENSSL` if set, otherwise `openssl` from `PATH`.
    pub fn new() -> Self {
        let program = std::env::var_os(OPENSSL_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("openssl"));
        Self { program }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: Vec<OsString>) -> Result<String> {
        tracing::debug!("{} {:?}", self.program.display(), args);

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| self.failure(format!("failed to run: {}", e)))?;

        if !output.status.success() {
            return Err(self.failure(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn failure(&self, message: String) -> InstallError {
        InstallError::Conversion {
            tool: self.program.display().to_string(),
            message,
        }
    }
}

impl Default for OpensslTool {
    fn default() -> Self {
        Self::new()
    }
}

impl X509Tool for OpensslTool {
    fn convert(&self, input: &Path, inform: CertEncoding, output: &Path) -> Result<()> {
        self.run(convert_args(input, inform, output))?;
        Ok(())
    }

    fn subject_hash_old(&self, pem: &Path) -> Result<String> {
        self.run(info_args(pem, &["-subject_hash_old", "-noout"]))
    }

    fn certificate_pem(&self, pem: &Path) -> Result<String> {
        self.run(info_args(pem, &[]))
    }

    fn text_dump(&self, pem: &Path) -> Result<String> {
        self.run(info_args(pem, &["-text", "-fingerprint", "-noout"]))
    }
}

fn convert_args(input: &Path, inform: CertEncoding, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["x509", "-inform", inform.inform(), "-in"]
        .iter()
        .map(OsString::from)
        .collect();
    args.push(input.as_os_str().to_owned());
    args.push(OsString::from("-out"));
    args.push(output.as_os_str().to_owned());
    args
}

fn info_args(pem: &Path, fields: &[&str]) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["x509", "-inform", "PEM"]
        .iter()
        .chain(fields)
        .map(OsString::from)
        .collect();
    args.push(OsString::from("-in"));
    args.push(pem.as_os_str().to_owned());
    args
}
