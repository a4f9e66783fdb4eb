use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use super::probe_config::{
    DEFAULT_HOST, DEFAULT_PAYLOAD, DEFAULT_PORT, DEFAULT_TIMEOUT_MS, ProbeConfig, ProbeProfile,
    ProfileFile, ReportStyle, TerminationMode,
};

/// Open one TCP connection, send a payload, then close it with a FIN or a RST.
#[derive(Debug, Parser)]
#[command(name = "tcpprobe", version, about)]
pub struct Cli {
    /// YAML file with named probe profiles
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Profile to run from the config file
    #[arg(short = 'P', long, env = "PROBE_PROFILE")]
    pub profile: Option<String>,

    /// Host name or IP address of the peer
    #[arg(long, env = "PROBE_HOST")]
    pub host: Option<String>,

    /// TCP port of the peer
    #[arg(short, long, env = "PROBE_PORT")]
    pub port: Option<u16>,

    /// Payload sent verbatim
    #[arg(long, env = "PROBE_PAYLOAD")]
    pub payload: Option<String>,

    /// Read the payload bytes from a file (wins over --payload)
    #[arg(long, env = "PROBE_PAYLOAD_FILE")]
    pub payload_file: Option<PathBuf>,

    /// How to end the connection
    #[arg(short, long, value_enum, env = "PROBE_MODE")]
    pub mode: Option<TerminationMode>,

    /// Connect timeout in milliseconds
    #[arg(short, long, env = "PROBE_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// Which status lines to print
    #[arg(short, long, value_enum, env = "PROBE_REPORT")]
    pub report: Option<ReportStyle>,

    /// Shorthand for `--report verbose`
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid YAML in config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("config file {} defines no profiles", path.display())]
    NoProfiles { path: PathBuf },

    #[error("profile '{name}' not found (available: {})", available.join(", "))]
    UnknownProfile {
        name: String,
        available: Vec<String>,
    },

    #[error("config file defines several profiles ({}), pick one with --profile", available.join(", "))]
    AmbiguousProfile { available: Vec<String> },

    #[error("profile '{0}' requested but no config file given")]
    ProfileWithoutFile(String),

    #[error("failed to read payload file {}", path.display())]
    PayloadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("port must be greater than zero")]
    ZeroPort,

    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}

pub struct AppConfig {
    pub probe: ProbeConfig,
    pub report_style: ReportStyle,
    pub profile_name: Option<String>,
}

/// Build the run configuration.
/// Layers, lowest first: built-in defaults, the selected profile of the YAML
/// file named by `--config`/`CONFIG_FILE`, then environment variables and
/// command line flags (clap merges those two, flags winning).
pub fn load_config(cli: &Cli) -> Result<AppConfig, ConfigError> {
    let (profile_name, profile) = match &cli.config {
        Some(path) => {
            let (name, profile) = load_profile(path, cli.profile.as_deref())?;
            (Some(name), profile)
        }
        None => {
            if let Some(name) = &cli.profile {
                return Err(ConfigError::ProfileWithoutFile(name.clone()));
            }
            (None, ProbeProfile::default())
        }
    };

    let port = cli.port.or(profile.port).unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(ConfigError::ZeroPort);
    }

    let timeout_ms = cli
        .timeout_ms
        .or(profile.timeout_ms)
        .unwrap_or(DEFAULT_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(ConfigError::ZeroTimeout);
    }

    let report_style = if cli.verbose {
        ReportStyle::Verbose
    } else {
        cli.report.or(profile.report).unwrap_or_default()
    };

    let probe = ProbeConfig {
        host: unbracket(
            cli.host
                .as_deref()
                .or(profile.host.as_deref())
                .unwrap_or(DEFAULT_HOST),
        ),
        port,
        payload: resolve_payload(cli, &profile)?,
        termination: cli.mode.or(profile.mode).unwrap_or_default(),
        timeout: Duration::from_millis(timeout_ms),
    };

    log::debug!(
        "Resolved probe config: target={}, payload={} bytes, mode={}, timeout={:?}",
        probe.target(),
        probe.payload.len(),
        probe.termination,
        probe.timeout
    );

    Ok(AppConfig {
        probe,
        report_style,
        profile_name,
    })
}

/// Read the profile file and pick one profile from it.
/// Without an explicit name, a single-profile file uses that profile and a
/// multi-profile file falls back to one called `default`.
fn load_profile(path: &Path, name: Option<&str>) -> Result<(String, ProbeProfile), ConfigError> {
    let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let mut profiles: ProfileFile =
        serde_yaml::from_str(&config_str).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    let mut available: Vec<String> = profiles.keys().cloned().collect();
    available.sort();

    let chosen = match name {
        Some(name) => name.to_string(),
        None if available.is_empty() => {
            return Err(ConfigError::NoProfiles {
                path: path.to_path_buf(),
            });
        }
        None if available.len() == 1 => available[0].clone(),
        None if profiles.contains_key("default") => "default".to_string(),
        None => return Err(ConfigError::AmbiguousProfile { available }),
    };

    let mut profile = profiles
        .remove(&chosen)
        .ok_or_else(|| ConfigError::UnknownProfile {
            name: chosen.clone(),
            available,
        })?;

    // Payload files are relative to the config file, not the working directory.
    if let Some(payload_file) = profile.payload_file.take() {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        profile.payload_file = Some(base.join(payload_file));
    }

    log::info!("Using profile '{}' from {}", chosen, path.display());
    Ok((chosen, profile))
}

/// `[::1]` becomes `::1`; the resolver only takes bare IPv6 literals.
fn unbracket(host: &str) -> String {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host)
        .to_string()
}

fn resolve_payload(cli: &Cli, profile: &ProbeProfile) -> Result<Vec<u8>, ConfigError> {
    if let Some(path) = &cli.payload_file {
        return read_payload(path);
    }
    if let Some(text) = &cli.payload {
        return Ok(text.as_bytes().to_vec());
    }
    if let Some(path) = &profile.payload_file {
        return read_payload(path);
    }
    Ok(profile
        .payload
        .as_deref()
        .unwrap_or(DEFAULT_PAYLOAD)
        .as_bytes()
        .to_vec())
}

fn read_payload(path: &Path) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path).map_err(|source| ConfigError::PayloadFile {
        path: path.to_path_buf(),
        source,
    })
}
