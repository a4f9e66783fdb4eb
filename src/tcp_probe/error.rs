use std::io;

use thiserror::Error;

use crate::config::probe_config::TerminationMode;

/// Why a probe run failed. Every variant is terminal for the run.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Resolution, refusal, unreachable host or the connect timeout.
    #[error("failed to connect to {target}")]
    Connect {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to send payload ({sent} of {total} bytes accepted)")]
    Send {
        sent: usize,
        total: usize,
        #[source]
        source: io::Error,
    },

    #[error("failed to close connection ({mode})")]
    Close {
        mode: TerminationMode,
        #[source]
        source: io::Error,
    },
}

impl ProbeError {
    /// The underlying transport error.
    pub fn io_error(&self) -> &io::Error {
        match self {
            ProbeError::Connect { source, .. }
            | ProbeError::Send { source, .. }
            | ProbeError::Close { source, .. } => source,
        }
    }
}
