//! Birdwatch - detection consolidation core for real-time bioacoustic
//! monitoring.
//!
//! Raw per-window species predictions arrive on a bounded ingress channel;
//! the pipeline filters, de-duplicates, and confirms them, then fans each
//! confirmed detection out to side-effecting actions (logging, persistence,
//! remote upload, publish, clip export, external commands) on a bounded
//! worker pool.

#![warn(missing_docs)]

pub mod audio;
pub mod clock;
pub mod config;
pub mod constants;
pub mod datastore;
pub mod detection;
pub mod error;
pub mod integrations;
pub mod metrics;
pub mod observation;
pub mod processor;

pub use error::{Error, Result};
pub use processor::{ingress_channel, Pipeline, Processor};

/// Initialize tracing output for standalone use and tests.
///
/// The embedding application normally installs its own subscriber; this
/// helper mirrors the usual setup: `RUST_LOG` wins, otherwise verbosity
/// maps to `info`/`debug`/`trace`.
pub fn init_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter_str = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));

    fmt().with_env_filter(filter).init();
}
