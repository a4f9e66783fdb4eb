use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use serde::Deserialize;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_PAYLOAD: &str = "mirrit";
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;

/// How the probe ends the connection once the payload is sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TerminationMode {
    /// Half-close the write side, the peer sees a FIN.
    #[default]
    Graceful,
    /// Close with a zero linger timeout, the peer sees a RST.
    Abortive,
}

impl fmt::Display for TerminationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationMode::Graceful => write!(f, "graceful"),
            TerminationMode::Abortive => write!(f, "abortive"),
        }
    }
}

/// Which status lines end up on stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportStyle {
    /// `connected`, `disconnected` and `ok`.
    Verbose,
    /// Only the final `ok`.
    #[default]
    Terse,
}

/// A named probe profile as written in the YAML config file.
/// Every field is optional; anything left out falls through to the
/// environment, the command line or the built-in defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeProfile {
    /// Host name or IP address of the peer.
    pub host: Option<String>,

    /// TCP port of the peer.
    pub port: Option<u16>,

    /// Payload sent verbatim as UTF-8 bytes.
    pub payload: Option<String>,

    /// File whose raw bytes are used as payload.
    /// Takes precedence over `payload` when both are given in the same profile.
    pub payload_file: Option<PathBuf>,

    /// `graceful` or `abortive`.
    pub mode: Option<TerminationMode>,

    /// Connect timeout in milliseconds.
    pub timeout_ms: Option<u64>,

    /// `verbose` or `terse`.
    pub report: Option<ReportStyle>,
}

pub type ProfileFile = HashMap<String, ProbeProfile>;

/// Everything a single probe run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub host: String,
    pub port: u16,
    pub payload: Vec<u8>,
    pub termination: TerminationMode,
    pub timeout: Duration,
}

impl ProbeConfig {
    /// `host:port`, with IPv6 literals bracketed.
    pub fn target(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            payload: DEFAULT_PAYLOAD.as_bytes().to_vec(),
            termination: TerminationMode::default(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}
