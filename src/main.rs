use std::io;
use std::process::ExitCode;

use clap::Parser;

pub mod config;
use config::app_config::{Cli, load_config};
pub mod report;
use report::{EXIT_CONFIG_ERROR, Reporter};
pub mod tcp_probe;
use tcp_probe::prelude::*;

fn main() -> ExitCode {
    // Before clap reads its env fallbacks.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let app = match load_config(&cli) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("{}", report(&e));
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    log::info!(
        "Probing {} ({} bytes, {} close, timeout {:?}{})",
        app.probe.target(),
        app.probe.payload.len(),
        app.probe.termination,
        app.probe.timeout,
        app.profile_name
            .as_deref()
            .map(|name| format!(", profile {name}"))
            .unwrap_or_default()
    );

    let mut reporter = Reporter::new(io::stdout().lock(), app.report_style);
    let result = probe_endpoint(&app.probe, |stage| reporter.stage(stage));

    log::info!(
        "Probe of {} ({} close, peer {:?}) finished in {:.2}ms (connect {}), sent {} bytes",
        result.target,
        result.termination_mode,
        result.peer,
        result.total_probe_time * 1000.0,
        result
            .connect_time
            .map(|t| format!("{:.2}ms", t * 1000.0))
            .unwrap_or_else(|| "N/A".to_string()),
        result.sent_bytes
    );

    ExitCode::from(reporter.finish(&result))
}
