//! Application configuration for the demo.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Time the simulated renderer spends on one streaming pass.
const DEFAULT_FRAME_LATENCY_MS: u64 = 30;
/// Time the simulated renderer spends on a low-quality snapshot.
const DEFAULT_SNAPSHOT_LATENCY_MS: u64 = 60;
/// Passes until a still scene is fully converged.
const DEFAULT_ACCUMULATION_PASSES: u32 = 8;
/// Length of the scripted camera orbit.
const DEFAULT_SESSION_SECS: u64 = 6;
/// Where surfaces and the event log are written.
const DEFAULT_OUTPUT_DIR: &str = "rayview-out";
/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info";

/// Runtime configuration for the Rayview demo session.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub frame_latency: Duration,
    pub snapshot_latency: Duration,
    pub accumulation_passes: u32,
    pub session_length: Duration,
    pub output_dir: PathBuf,
    /// Watchdog for every renderer call. Unset waits forever.
    pub render_timeout: Option<Duration>,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            frame_latency: Duration::from_millis(DEFAULT_FRAME_LATENCY_MS),
            snapshot_latency: Duration::from_millis(DEFAULT_SNAPSHOT_LATENCY_MS),
            accumulation_passes: DEFAULT_ACCUMULATION_PASSES,
            session_length: Duration::from_secs(DEFAULT_SESSION_SECS),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            render_timeout: None,
            log_filter: DEFAULT_LOG_FILTER.to_owned(),
        }
    }
}

impl AppConfig {
    /// Read `RAYVIEW_*` variables, falling back to defaults for unset ones.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let millis = |name: &'static str, fallback: Duration| -> Result<Duration, ConfigError> {
            Ok(parse::<u64>(&lookup, name)?.map_or(fallback, Duration::from_millis))
        };

        let accumulation_passes = parse::<u32>(&lookup, "RAYVIEW_ACCUMULATION_PASSES")?
            .unwrap_or(defaults.accumulation_passes);
        if accumulation_passes == 0 {
            return Err(ConfigError::Invalid {
                var: "RAYVIEW_ACCUMULATION_PASSES",
                value: "0".to_owned(),
            });
        }

        Ok(Self {
            frame_latency: millis("RAYVIEW_FRAME_LATENCY_MS", defaults.frame_latency)?,
            snapshot_latency: millis("RAYVIEW_SNAPSHOT_LATENCY_MS", defaults.snapshot_latency)?,
            accumulation_passes,
            session_length: parse::<u64>(&lookup, "RAYVIEW_SESSION_SECS")?
                .map_or(defaults.session_length, Duration::from_secs),
            output_dir: lookup("RAYVIEW_OUTPUT_DIR").map_or(defaults.output_dir, PathBuf::from),
            render_timeout: parse::<u64>(&lookup, "RAYVIEW_RENDER_TIMEOUT_MS")?
                .map(Duration::from_millis),
            log_filter: lookup("RAYVIEW_LOG").unwrap_or(defaults.log_filter),
        })
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}
