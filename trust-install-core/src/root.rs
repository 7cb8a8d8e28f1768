//! Privileged command execution.
//!
//! Every call spawns its own `su` shell, sends one command line followed by
//! an exit-status probe and waits for the shell to exit. No shell state is
//! carried from one command to the next.
//!
//! Arguments are joined with single spaces and are NOT escaped: paths with
//! whitespace or shell metacharacters are unsupported. Globs such as
//! `/system/etc/security/cacerts/*` rely on this and expand in the remote shell.

use crate::bridge::DeviceBridge;
use crate::error::{InstallError, Result};

/// Appended to every command line; its output is the last stdout line.
///
/// The status is framed by the newline before it. A command whose stdout
/// does not end in a newline gets the status glued onto its last line and is
/// misread; the commands issued here print nothing or end their output with
/// a newline.
pub const EXIT_STATUS_PROBE: &str = "; echo $?";

/// How a nonzero exit status is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCheck {
    /// Nonzero status is a [`InstallError::RemoteCommand`].
    Enforce,
    /// Nonzero status is returned in [`CommandOutput::exit_code`].
    Ignore,
}

/// Result of one privileged command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Stdout without the probe line.
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Factory for one-shot privileged commands against a device.
///
/// Holds nothing but the bridge; each [`RootSession::exec`] owns and tears
/// down its own subprocess.
#[derive(Clone, Copy)]
pub struct RootSession<'a> {
    bridge: &'a dyn DeviceBridge,
}

impl<'a> RootSession<'a> {
    pub fn open(bridge: &'a dyn DeviceBridge) -> Self {
        Self { bridge }
    }

    /// The underlying bridge, for unprivileged queries.
    pub fn bridge(&self) -> &'a dyn DeviceBridge {
        self.bridge
    }

    /// Run `argv` as root; a nonzero exit status is an error.
    pub fn exec(&self, argv: &[&str]) -> Result<CommandOutput> {
        self.exec_with(argv, ExitCheck::Enforce)
    }

    /// Run `argv` as root, tolerating a nonzero exit status.
    ///
    /// Transport failures are still returned as errors.
    pub fn exec_best_effort(&self, argv: &[&str]) -> Result<CommandOutput> {
        self.exec_with(argv, ExitCheck::Ignore)
    }

    pub fn exec_with(&self, argv: &[&str], check: ExitCheck) -> Result<CommandOutput> {
        let command = command_line(argv);
        tracing::debug!("perform command as root: {}", command);

        let raw = self
            .bridge
            .root_shell(&format!("{}{}", command, EXIT_STATUS_PROBE))?;
        let (stdout, exit_code) = split_exit_status(&command, &raw.stdout)?;

        let output = CommandOutput {
            stdout,
            stderr: raw.stderr,
            exit_code,
        };

        if check == ExitCheck::Enforce && !output.success() {
            return Err(InstallError::RemoteCommand {
                command,
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

/// Join arguments with single spaces, without quoting.
pub fn command_line(argv: &[&str]) -> String {
    for arg in argv.iter().filter(|arg| arg.chars().any(char::is_whitespace)) {
        tracing::warn!("argument {:?} contains whitespace and will be split by the remote shell", arg);
    }
    argv.join(" ")
}

/// Split the trailing status line off `stdout`.
pub fn split_exit_status(command: &str, stdout: &str) -> Result<(String, i32)> {
    let trimmed = stdout.trim_end_matches(['\n', '\r']);
    let (body, last) = match trimmed.rsplit_once('\n') {
        Some((body, last)) => (body, last),
        None => ("", trimmed),
    };

    let exit_code = last
        .trim()
        .parse::<i32>()
        .map_err(|_| InstallError::MissingExitStatus {
            command: command.to_string(),
            stdout: stdout.to_string(),
        })?;

    let body = body.trim_end_matches('\r');
    let body = if body.is_empty() {
        String::new()
    } else {
        format!("{}\n", body)
    };
    Ok((body, exit_code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::ShellOutput;
    use crate::testing::MockBridge;
    use proptest::prelude::*;

    #[test]
    fn test_command_line_appends_probe() {
        let bridge = MockBridge::new();
        let session = RootSession::open(&bridge);

        session.exec(&["chmod", "644", "/system/etc/security/cacerts/9a5ba575.0"]).unwrap();

        assert_eq!(
            bridge.root_commands(),
            vec!["chmod 644 /system/etc/security/cacerts/9a5ba575.0"]
        );
    }

    #[test]
    fn test_each_exec_opens_its_own_shell() {
        let bridge = MockBridge::new();
        let session = RootSession::open(&bridge);

        session.exec(&["id"]).unwrap();
        session.exec(&["id"]).unwrap();

        assert_eq!(bridge.root_commands().len(), 2);
    }

    #[test]
    fn test_nonzero_status_is_error() {
        let bridge = MockBridge::new().failing_root("mount", 1, "mount: Operation not permitted\n");
        let session = RootSession::open(&bridge);

        let err = session.exec(&["mount", "-o", "rw,remount,rw", "/system"]).unwrap_err();
        match err {
            InstallError::RemoteCommand { command, exit_code, stderr } => {
                assert_eq!(command, "mount -o rw,remount,rw /system");
                assert_eq!(exit_code, 1);
                assert_eq!(stderr, "mount: Operation not permitted");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_zero_status_with_stderr_succeeds() {
        let bridge = MockBridge::new().with_raw_root_reply(ShellOutput {
            stdout: "0\n".to_string(),
            stderr: "warning: something odd\n".to_string(),
        });
        let session = RootSession::open(&bridge);

        let output = session.exec(&["cp", "a", "b"]).unwrap();
        assert!(output.success());
        assert_eq!(output.stderr, "warning: something odd\n");
    }

    #[test]
    fn test_best_effort_returns_status() {
        let bridge = MockBridge::new().failing_root("rm", 1, "rm: no such file\n");
        let session = RootSession::open(&bridge);

        let output = session.exec_best_effort(&["rm", "-r", "/data/local/tmp/cacerts"]).unwrap();
        assert_eq!(output.exit_code, 1);
    }

    #[test]
    fn test_stdout_body_preserved() {
        let bridge = MockBridge::new().with_root_stdout("ls /data/local/tmp", "a.0\nb.0\n");
        let session = RootSession::open(&bridge);

        let output = session.exec(&["ls", "/data/local/tmp"]).unwrap();
        assert_eq!(output.stdout, "a.0\nb.0\n");
    }

    #[test]
    fn test_missing_status() {
        let bridge = MockBridge::new().with_raw_root_reply(ShellOutput::default());
        let session = RootSession::open(&bridge);

        let result = session.exec(&["true"]);
        assert!(matches!(result, Err(InstallError::MissingExitStatus { .. })));
    }

    #[test]
    fn test_status_needs_newline_terminated_stdout() {
        let (body, code) = split_exit_status("echo 7", "7\n0\n").unwrap();
        assert_eq!((body.as_str(), code), ("7\n", 0));

        // `printf 7` leaves no newline, so the status merges into its output.
        let (body, code) = split_exit_status("printf 7", "70\n").unwrap();
        assert_eq!((body.as_str(), code), ("", 70));
    }

    #[test]
    fn test_split_exit_status_crlf() {
        let (body, code) = split_exit_status("x", "out\r\n127\r\n").unwrap();
        assert_eq!(body, "out\n");
        assert_eq!(code, 127);
    }

    proptest! {
        #[test]
        fn prop_error_iff_nonzero(code in 0i32..256, stderr in "[a-z :]{0,30}") {
            let bridge = MockBridge::new().with_raw_root_reply(ShellOutput {
                stdout: format!("{}\n", code),
                stderr,
            });
            let session = RootSession::open(&bridge);

            let result = session.exec(&["cp", "src", "dst"]);
            if code == 0 {
                prop_assert!(result.is_ok());
            } else {
                let is_remote_error = matches!(
                    result,
                    Err(InstallError::RemoteCommand { exit_code, .. }) if exit_code == code
                );
                prop_assert!(is_remote_error);
            }
        }

        #[test]
        fn prop_status_split_from_body(lines in proptest::collection::vec("[a-z0-9./]{1,12}", 0..5), code in 0i32..256) {
            let mut stdout = String::new();
            for line in &lines {
                stdout.push_str(line);
                stdout.push('\n');
            }
            stdout.push_str(&format!("{}\n", code));

            let (body, parsed) = split_exit_status("cmd", &stdout).unwrap();
            prop_assert_eq!(parsed, code);
            prop_assert_eq!(body.lines().count(), lines.len());
        }
    }
}
