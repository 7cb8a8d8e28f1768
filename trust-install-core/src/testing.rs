//! Scripted doubles for the device bridge and the x509 tool.

use crate::bridge::{DeviceBridge, ShellOutput};
use crate::error::{InstallError, Result};
use crate::root::EXIT_STATUS_PROBE;
use crate::x509::{CertEncoding, X509Tool};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub(crate) const TEST_HASH: &str = "9a5ba575";

pub(crate) const TEST_PEM: &str = "-----BEGIN CERTIFICATE-----\n\
MIIBszCCAVmgAwIBAgIUTESTTESTTESTTESTTESTTESTTESTMAoGCCqGSM49BAMC\n\
-----END CERTIFICATE-----\n";

pub(crate) const TEST_DUMP: &str = concat!(
    "Certificate:\n",
    "    Data:\n",
    "        Version: 3 (0x2)\n",
    "        Subject: CN = Test Root CA\n",
    "SHA1 Fingerprint=AA:BB:CC:DD:EE:FF:00:11:22:33:44:55:66:77:88:99:AA:BB:CC:DD\n",
);

/// A pushed file as observed at push time.
#[derive(Debug, Clone)]
pub(crate) struct Pushed {
    pub local: PathBuf,
    pub remote: String,
    pub content: String,
}

#[derive(Debug, Clone)]
struct RootFailure {
    prefix: String,
    exit_code: i32,
    stderr: String,
}

/// In-memory [`DeviceBridge`] with scripted replies and a command log.
#[derive(Debug, Default)]
pub(crate) struct MockBridge {
    shell_replies: HashMap<String, String>,
    shell_failures: HashMap<String, String>,
    properties: HashMap<String, String>,
    root_failures: Vec<RootFailure>,
    root_stdout: HashMap<String, String>,
    raw_root_reply: Option<ShellOutput>,
    push_error: Option<String>,
    shell_log: RefCell<Vec<String>>,
    root_log: RefCell<Vec<String>>,
    pushes: RefCell<Vec<Pushed>>,
    push_attempts: RefCell<Vec<PathBuf>>,
}

impl MockBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// A rooted device reporting `version` as `ro.build.version.release`.
    pub fn rooted(version: &str) -> Self {
        Self::new()
            .with_shell("which su", "/system/bin/su\n")
            .with_property("ro.build.version.release", version)
    }

    pub fn with_shell(mut self, command: &str, reply: &str) -> Self {
        self.shell_replies.insert(command.to_string(), reply.to_string());
        self
    }

    /// Unprivileged `command` fails at the transport level with `message`.
    pub fn failing_shell(mut self, command: &str, message: &str) -> Self {
        self.shell_failures.insert(command.to_string(), message.to_string());
        self
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }

    /// Privileged commands starting with `prefix` report `exit_code`.
    pub fn failing_root(mut self, prefix: &str, exit_code: i32, stderr: &str) -> Self {
        self.root_failures.push(RootFailure {
            prefix: prefix.to_string(),
            exit_code,
            stderr: stderr.to_string(),
        });
        self
    }

    /// Privileged command `command` prints `stdout` before the status probe.
    pub fn with_root_stdout(mut self, command: &str, stdout: &str) -> Self {
        self.root_stdout.insert(command.to_string(), stdout.to_string());
        self
    }

    /// Every privileged shell returns exactly `reply`, probe included.
    pub fn with_raw_root_reply(mut self, reply: ShellOutput) -> Self {
        self.raw_root_reply = Some(reply);
        self
    }

    pub fn failing_push(mut self, message: &str) -> Self {
        self.push_error = Some(message.to_string());
        self
    }

    /// Privileged command lines, without the status probe, in issue order.
    pub fn root_commands(&self) -> Vec<String> {
        self.root_log.borrow().clone()
    }

    pub fn shell_commands(&self) -> Vec<String> {
        self.shell_log.borrow().clone()
    }

    pub fn pushes(&self) -> Vec<Pushed> {
        self.pushes.borrow().clone()
    }

    /// Local paths handed to `push`, failed attempts included.
    pub fn push_attempts(&self) -> Vec<PathBuf> {
        self.push_attempts.borrow().clone()
    }
}

impl DeviceBridge for MockBridge {
    fn shell(&self, argv: &[&str]) -> Result<String> {
        let command = argv.join(" ");
        self.shell_log.borrow_mut().push(command.clone());
        if let Some(message) = self.shell_failures.get(&command) {
            return Err(InstallError::Bridge(message.clone()));
        }
        Ok(self.shell_replies.get(&command).cloned().unwrap_or_default())
    }

    fn push(&self, local: &Path, remote: &str) -> Result<()> {
        self.push_attempts.borrow_mut().push(local.to_path_buf());
        if !local.is_file() {
            return Err(InstallError::Bridge(format!("{}: no such file", local.display())));
        }
        if let Some(message) = &self.push_error {
            return Err(InstallError::Bridge(message.clone()));
        }
        let content = std::fs::read_to_string(local)?;
        self.pushes.borrow_mut().push(Pushed {
            local: local.to_path_buf(),
            remote: remote.to_string(),
            content,
        });
        Ok(())
    }

    fn property(&self, key: &str) -> Result<String> {
        self.shell_log.borrow_mut().push(format!("getprop {}", key));
        Ok(self.properties.get(key).cloned().unwrap_or_default())
    }

    fn root_shell(&self, script: &str) -> Result<ShellOutput> {
        let command = script
            .strip_suffix(EXIT_STATUS_PROBE)
            .unwrap_or(script)
            .to_string();
        self.root_log.borrow_mut().push(command.clone());

        if let Some(reply) = &self.raw_root_reply {
            return Ok(reply.clone());
        }

        let stdout = self.root_stdout.get(&command).cloned().unwrap_or_default();
        match self
            .root_failures
            .iter()
            .find(|failure| command.starts_with(&failure.prefix))
        {
            Some(failure) => Ok(ShellOutput {
                stdout: format!("{}{}\n", stdout, failure.exit_code),
                stderr: failure.stderr.clone(),
            }),
            None => Ok(ShellOutput {
                stdout: format!("{}0\n", stdout),
                stderr: String::new(),
            }),
        }
    }
}

/// Deterministic [`X509Tool`] that never touches openssl.
#[derive(Debug)]
pub(crate) struct FakeX509Tool {
    pub hash: String,
    pub pem: String,
    pub dump: String,
    pub fail_conversion: bool,
    pub conversions: RefCell<Vec<CertEncoding>>,
    pub last_output: RefCell<Option<PathBuf>>,
}

impl FakeX509Tool {
    pub fn new() -> Self {
        Self::with_cert(TEST_HASH, TEST_PEM, TEST_DUMP)
    }

    pub fn with_cert(hash: &str, pem: &str, dump: &str) -> Self {
        Self {
            hash: hash.to_string(),
            pem: pem.to_string(),
            dump: dump.to_string(),
            fail_conversion: false,
            conversions: RefCell::new(Vec::new()),
            last_output: RefCell::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_conversion: true,
            ..Self::new()
        }
    }
}

impl X509Tool for FakeX509Tool {
    fn convert(&self, _input: &Path, inform: CertEncoding, output: &Path) -> Result<()> {
        self.conversions.borrow_mut().push(inform);
        *self.last_output.borrow_mut() = Some(output.to_path_buf());
        if self.fail_conversion {
            return Err(InstallError::Conversion {
                tool: "fake".to_string(),
                message: "unable to load certificate".to_string(),
            });
        }
        std::fs::write(output, &self.pem)?;
        Ok(())
    }

    fn subject_hash_old(&self, _pem: &Path) -> Result<String> {
        Ok(format!("{}\n", self.hash))
    }

    fn certificate_pem(&self, pem: &Path) -> Result<String> {
        Ok(std::fs::read_to_string(pem)?)
    }

    fn text_dump(&self, _pem: &Path) -> Result<String> {
        Ok(self.dump.clone())
    }
}

/// Write a throwaway certificate file named `name` into a fresh temp dir.
pub(crate) fn cert_file(name: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, TEST_PEM).unwrap();
    (dir, path)
}
