//! Pre-flight sanity checks for the runtime environment
//!
//! Verified before the agent claims its bus name:
//! - Running with root privileges (EUID 0)
//! - The module loader binary is present and executable
//!
//! Failures are reported on stderr and the process exits before touching
//! the bus.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::config::AgentConfig;

/// Set to `1` or `true` to skip the root check (development on a session bus)
pub const SKIP_ROOT_CHECK_ENV: &str = "HAOS_AGENT_SKIP_ROOT_CHECK";

/// Result of environment verification
#[derive(Debug)]
pub struct SanityCheckResult {
    pub missing_binaries: Vec<String>,
    pub is_root: bool,
}

impl SanityCheckResult {
    /// Returns true if all checks passed
    pub fn is_ok(&self) -> bool {
        self.missing_binaries.is_empty() && self.is_root
    }
}

/// Check that `path` is a regular file with an execute bit set
fn is_executable(path: &Path) -> bool {
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// Check if running as root (EUID 0)
fn is_running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Perform all sanity checks and return the result
pub fn verify_environment(config: &AgentConfig) -> SanityCheckResult {
    let mut missing = Vec::new();

    if !is_executable(&config.module_loader) {
        missing.push(config.module_loader.display().to_string());
    }

    SanityCheckResult {
        missing_binaries: missing,
        is_root: is_running_as_root(),
    }
}

/// Print the failed checks to stderr and exit
pub fn print_error_and_exit(result: &SanityCheckResult) -> ! {
    eprintln!();
    eprintln!("haos-agent: pre-flight check failed");
    eprintln!();

    if !result.is_root {
        eprintln!("  ERROR: Root privileges required");
        eprintln!("    The agent formats partitions and loads kernel modules.");
        eprintln!("    Set {}=1 to skip this check during development.", SKIP_ROOT_CHECK_ENV);
        eprintln!();
    }

    if !result.missing_binaries.is_empty() {
        eprintln!("  ERROR: Missing required binaries");
        for binary in &result.missing_binaries {
            eprintln!("    - {}", binary);
        }
        eprintln!();
    }

    std::process::exit(1);
}

/// Returns true if the root check should be skipped
pub fn should_skip_root_check() -> bool {
    std::env::var(SKIP_ROOT_CHECK_ENV)
        .map(|v| v == "1" || v.to_lowercase() == "true")
        .unwrap_or(false)
}

/// Verify the environment, exiting the process if a check fails
pub fn run_preflight_checks(config: &AgentConfig) {
    tracing::debug!("Running pre-flight sanity checks...");

    let mut result = verify_environment(config);

    if should_skip_root_check() {
        tracing::warn!("Root check skipped ({}=1)", SKIP_ROOT_CHECK_ENV);
        result.is_root = true;
    }

    if !result.is_ok() {
        print_error_and_exit(&result);
    }

    tracing::info!("Pre-flight checks passed");
}
