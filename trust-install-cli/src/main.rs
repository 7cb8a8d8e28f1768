use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use trust_install_core::{
    AdbBridge, CertFormat, InstallConfig, InstallMode, InstallOutcome, Installer, OpensslTool,
};

#[derive(Debug, Parser)]
#[command(name = "adb-install-cert")]
#[command(about = "Install a CA certificate into the system trust store of a rooted Android device", long_about = None)]
struct Cli {
    /// Certificate file to install
    #[arg(long)]
    cert: PathBuf,

    /// Certificate encoding; `auto` infers it from the file extension
    #[arg(long, value_enum, default_value_t = FormatArg::Auto)]
    cert_format: FormatArg,

    /// Installation mechanism; `auto` picks one from the Android version
    #[arg(long, value_enum, default_value_t = ModeArg::Auto)]
    mode: ModeArg,

    /// Device to target; defaults to the only connected device
    #[arg(long)]
    device_serial: Option<String>,

    /// Log progress (default)
    #[arg(long, overrides_with = "silent")]
    verbose: bool,

    /// Only log errors
    #[arg(long, overrides_with = "verbose")]
    silent: bool,

    /// Remove temporary files from the device afterwards (default)
    #[arg(long, overrides_with = "no_clean_remote_temp")]
    clean_remote_temp: bool,

    /// Leave temporary files on the device
    #[arg(long, overrides_with = "clean_remote_temp")]
    no_clean_remote_temp: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Auto,
    Pem,
    Der,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Auto,
    Permanently,
    Temporary,
    ApexTemporary,
}

impl From<FormatArg> for CertFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Auto => CertFormat::Auto,
            FormatArg::Pem => CertFormat::Pem,
            FormatArg::Der => CertFormat::Der,
        }
    }
}

impl From<ModeArg> for InstallMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Auto => InstallMode::Auto,
            ModeArg::Permanently => InstallMode::Permanently,
            ModeArg::Temporary => InstallMode::Temporary,
            ModeArg::ApexTemporary => InstallMode::ApexTemporary,
        }
    }
}

impl Cli {
    fn install_config(&self) -> InstallConfig {
        InstallConfig::new(&self.cert)
            .with_format(self.cert_format.into())
            .with_mode(self.mode.into())
            .with_device_serial(self.device_serial.clone())
            .with_clean_remote_temp(self.clean_remote_temp || !self.no_clean_remote_temp)
    }

    fn default_log_level(&self) -> &'static str {
        // overrides_with leaves at most one of the pair set.
        if self.silent && !self.verbose {
            "error"
        } else {
            "info"
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<InstallOutcome> {
    if !cli.cert.is_file() {
        bail!("Certificate file {} does not exist", cli.cert.display());
    }

    let config = cli.install_config();
    let bridge = AdbBridge::connect(config.device_serial.as_deref())
        .context("Failed to select a device")?;
    let tool = OpensslTool::new();

    let outcome = Installer::new(&bridge, &tool).run(&config)?;
    report(&bridge, &outcome);
    Ok(outcome)
}

fn report(bridge: &AdbBridge, outcome: &InstallOutcome) {
    if let Some(propagation) = &outcome.propagation {
        if !propagation.is_complete() {
            tracing::warn!(
                "[!] {} of {} processes kept the old trust store",
                propagation.failed.len(),
                propagation.failed.len() + propagation.bound.len()
            );
        }
    }
    tracing::info!(
        "[+] installed {} on {} using {}",
        outcome.entry_name,
        bridge.serial(),
        outcome.mechanism
    );
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.default_log_level());

    match run(&cli) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
