//! Rayview Demo — scripted viewer session against a simulated renderer.
//!
//! Streams a live viewport and keeps three thumbnails up to date while the
//! camera orbits the scene, then writes the results and an event log to the
//! output directory.

mod config;
mod ipc;
mod session;
mod sim_renderer;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

fn main() -> ExitCode {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("rayview-demo: {err}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with_target(false)
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!("failed to build tokio runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(output = %config.output_dir.display(), "starting session");
    match runtime.block_on(session::run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("session failed: {err}");
            ExitCode::FAILURE
        }
    }
}
