//! ---
//! gw_section: "01-core-functionality"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Shared primitives and utilities for the polling client."
//! gw_version: "v0.1.0"
//! gw_owner: "tbd"
//! ---
//! Shared primitives for the gridwatch workspace: configuration loading, tracing setup,
//! display-time helpers, and version metadata.

pub mod config;
pub mod logging;
pub mod time;
pub mod version;

pub use config::{
    AppConfig, CursorScope, EndpointConfig, LoggingConfig, MetricsConfig, Mode, PollConfig,
    WatcherConfig,
};
pub use logging::{init_console, init_tracing, LogFormat};
pub use version::VersionInfo;
