//! Analysis harness around the `ffarank` estimators: JSON game stores, CSV
//! rating files and the delegated TrueSkill baseline, with one binary per
//! analysis workflow.

pub mod games;
pub mod store;
pub mod trueskill;

use tracing_subscriber::EnvFilter;

/// Install the process-wide subscriber the analysis binaries log through.
/// Diagnostics go to stderr so reports and tables own stdout.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
