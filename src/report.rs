use std::io::Write;

use crate::config::probe_config::ReportStyle;
use crate::tcp_probe::prelude::*;

pub const EXIT_OK: u8 = 0;
pub const EXIT_PROBE_FAILED: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;

/// Prints the status lines of a probe run and decides the exit code.
pub struct Reporter<W: Write> {
    out: W,
    style: ReportStyle,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, style: ReportStyle) -> Self {
        Self { out, style }
    }

    pub fn stage(&mut self, stage: &Stage) {
        if self.style != ReportStyle::Verbose {
            return;
        }
        let line = match stage {
            Stage::Connected(_) => "connected",
            Stage::Closed(_) => "disconnected",
            Stage::Sent(n) => {
                log::debug!("{n} bytes sent");
                return;
            }
        };
        self.line(line);
    }

    /// Print the final line and return the process exit code.
    pub fn finish(&mut self, result: &ProbeResult) -> u8 {
        match &result.error {
            None if result.connected => {
                self.line("ok");
                EXIT_OK
            }
            None => {
                self.line("probe did not connect");
                EXIT_PROBE_FAILED
            }
            Some(e) => {
                self.line(&report(e));
                EXIT_PROBE_FAILED
            }
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{line}").and_then(|_| self.out.flush()) {
            log::warn!("Failed to write status line: {e}");
        }
    }
}
