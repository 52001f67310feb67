//! Shared plumbing for the `confsync` binary: configuration loading and
//! wiring of the library crates against a configured backend.

mod app;
mod config;

pub use app::{render_entries, App};
pub use config::{CliConfig, Overrides};
