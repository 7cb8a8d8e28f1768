//! Error taxonomy shared by every installation step.

use crate::strategy::Mechanism;
use thiserror::Error;

/// Errors that can occur while preparing or installing a certificate.
#[derive(Debug, Error)]
pub enum InstallError {
    /// `su` could not be resolved on the device. Raised before any mutation.
    #[error("Root device required: no `su` binary on the device search path")]
    UnrootedDevice,

    #[error("Unknown certificate format {0:?}; specify it with --cert-format")]
    UnknownFormat(String),

    #[error("Certificate conversion with {tool} failed: {message}")]
    Conversion { tool: String, message: String },

    #[error("Remote command `{command}` exited with status {exit_code}: {stderr}")]
    RemoteCommand {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    /// The trailing `echo $?` line was missing or not numeric.
    #[error("No exit status in output of remote command `{command}`: {stdout:?}")]
    MissingExitStatus { command: String, stdout: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Device bridge error: {0}")]
    Bridge(String),

    #[error("Device selection failed: {0}")]
    DeviceSelection(String),

    #[error("No installer registered for mechanism {0}")]
    UnregisteredMechanism(Mechanism),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, InstallError>;
