pub mod error;
pub mod probe;
pub mod result;

pub mod prelude {
    pub use super::error::ProbeError;
    pub use super::probe::probe_endpoint;
    pub use super::report;
    pub use super::result::{ProbeResult, Stage};
}

use std::fmt::Write;

/// Render an error followed by its chain of sources, on one line.
pub fn report(mut err: &(dyn std::error::Error + 'static)) -> String {
    let mut s = format!("{}", err);
    while let Some(src) = err.source() {
        let _ = write!(s, ": {}", src);
        err = src;
    }
    s
}
