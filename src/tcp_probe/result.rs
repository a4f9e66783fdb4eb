use std::net::SocketAddr;

use crate::config::probe_config::TerminationMode;

use super::error::ProbeError;

/// Outcome of one probe run. `error` is set exactly when the run failed,
/// whether before or after the connection was established.
#[derive(Debug)]
pub struct ProbeResult {
    pub target: String,
    pub peer: Option<SocketAddr>,
    pub connected: bool,
    pub sent_bytes: usize,
    pub termination_mode: TerminationMode,
    pub error: Option<ProbeError>,
    pub connect_time: Option<f64>,
    pub total_probe_time: f64,
}

impl ProbeResult {
    pub fn new(target: String, termination_mode: TerminationMode) -> Self {
        Self {
            target,
            peer: None,
            connected: false,
            sent_bytes: 0,
            termination_mode,
            error: None,
            connect_time: None,
            total_probe_time: 0.0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.connected && self.error.is_none()
    }
}

/// Progress notifications emitted while a probe runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The peer address is `None` when the socket could not report it.
    Connected(Option<SocketAddr>),
    Sent(usize),
    Closed(TerminationMode),
}
