//! Device bridge: the transport used to reach the Android device.
//!
//! The installer only needs four primitives from the transport: an
//! unprivileged shell, file upload, property reads and a one-shot `su`
//! shell fed from stdin. [`AdbBridge`] implements them by spawning the
//! `adb` client; tests substitute a scripted bridge.

use crate::error::{InstallError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

/// Environment variable overriding the `adb` executable.
pub const ADB_ENV: &str = "ADB";

/// Captured output of a shell subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Transport primitives for one connected device.
pub trait DeviceBridge {
    /// Run an unprivileged shell command and return its stdout.
    ///
    /// The remote exit status is not inspected; absence is reported by empty
    /// output (e.g. `which su`, `pidof`).
    ///
    /// # Arguments
    /// * `argv` - Command and arguments, joined by the remote shell
    ///
    /// # Returns
    /// The command's stdout, or a `Bridge` error if the transport itself failed.
    fn shell(&self, argv: &[&str]) -> Result<String>;

    /// Upload a local file to the device.
    ///
    /// # Arguments
    /// * `local` - File on the host
    /// * `remote` - Destination path on the device, file name included
    fn push(&self, local: &Path, remote: &str) -> Result<()>;

    /// Read a system property.
    fn property(&self, key: &str) -> Result<String> {
        Ok(self.shell(&["getprop", key])?.trim().to_string())
    }

    /// Spawn a fresh `su` shell, feed it `script` on stdin, close stdin and
    /// wait for the process to exit.
    ///
    /// # Arguments
    /// * `script` - One command line; callers append their own status probe
    ///
    /// # Returns
    /// Both captured streams. The exit status of the script is not interpreted here.
    fn root_shell(&self, script: &str) -> Result<ShellOutput>;
}

/// [`DeviceBridge`] backed by the `adb` command-line client.
#[derive(Debug, Clone)]
pub struct AdbBridge {
    adb: PathBuf,
    serial: String,
}

impl AdbBridge {
    /// Address the device with `serial`, or the only connected device.
    pub fn connect(serial: Option<&str>) -> Result<Self> {
        let adb = adb_path();
        let serial = match serial {
            Some(serial) => serial.to_string(),
            None => autodetect_serial(&adb)?,
        };

        tracing::debug!("Using device {} via {}", serial, adb.display());
        Ok(Self { adb, serial })
    }

    /// Serial of the addressed device.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.adb);
        cmd.arg("-s").arg(&self.serial);
        cmd
    }
}

impl DeviceBridge for AdbBridge {
    fn shell(&self, argv: &[&str]) -> Result<String> {
        let output = self.command().arg("shell").args(argv).output()?;
        check_transport(&output)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn push(&self, local: &Path, remote: &str) -> Result<()> {
        let output = self.command().arg("push").arg(local).arg(remote).output()?;

        if !output.status.success() {
            return Err(InstallError::Bridge(format!(
                "adb push {} {} failed: {}",
                local.display(),
                remote,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }

    fn root_shell(&self, script: &str) -> Result<ShellOutput> {
        let mut child = self
            .command()
            .args(["shell", "su"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Dropping stdin sends EOF, which ends the su shell after the script.
        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| InstallError::Bridge("su shell has no stdin".to_string()))?;
            stdin.write_all(script.as_bytes())?;
            stdin.write_all(b"\n")?;
        }

        let output = child.wait_with_output()?;
        check_transport(&output)?;

        Ok(ShellOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn adb_path() -> PathBuf {
    std::env::var_os(ADB_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("adb"))
}

/// Distinguish adb client failures (no device, unauthorized) from remote output.
fn check_transport(output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.starts_with("error:") || stderr.starts_with("adb: error") {
        return Err(InstallError::Bridge(stderr.to_string()));
    }
    Ok(())
}

fn autodetect_serial(adb: &Path) -> Result<String> {
    let output = Command::new(adb).arg("devices").output()?;
    if !output.status.success() {
        return Err(InstallError::Bridge(format!(
            "adb devices failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let mut devices = parse_devices(&String::from_utf8_lossy(&output.stdout));
    match devices.len() {
        1 => Ok(devices.remove(0)),
        0 => Err(InstallError::DeviceSelection(
            "no device connected".to_string(),
        )),
        n => Err(InstallError::DeviceSelection(format!(
            "{} devices connected ({}); select one with --device-serial",
            n,
            devices.join(", ")
        ))),
    }
}

/// Parse `adb devices` output into the serials of ready devices.
pub fn parse_devices(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.starts_with("List of devices") && !line.starts_with('*'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let serial = fields.next()?;
            match fields.next() {
                Some("device") => Some(serial.to_string()),
                _ => None,
            }
        })
        .collect()
}
