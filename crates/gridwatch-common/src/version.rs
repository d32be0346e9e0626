//! ---
//! gw_section: "01-core-functionality"
//! gw_subsection: "module"
//! gw_type: "source"
//! gw_scope: "code"
//! gw_description: "Shared primitives and utilities for the polling client."
//! gw_version: "v0.1.0"
//! gw_owner: "tbd"
//! ---
use std::fmt;

/// Build metadata reported by `--version` and in startup logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    pub semver: &'static str,
    pub package: &'static str,
    pub profile: &'static str,
}

impl VersionInfo {
    pub fn current() -> Self {
        Self {
            semver: env!("CARGO_PKG_VERSION"),
            package: env!("CARGO_PKG_NAME"),
            profile: if cfg!(debug_assertions) {
                "debug"
            } else {
                "release"
            },
        }
    }

    /// Short form used in log lines.
    pub fn cli_string(&self) -> String {
        format!("v{}", self.semver)
    }

    /// Multi-line form printed by `--version`.
    pub fn extended(&self) -> String {
        format!(
            "gridwatch {}\npackage: {}\nprofile: {}",
            self.cli_string(),
            self.package,
            self.profile
        )
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cli_string())
    }
}
