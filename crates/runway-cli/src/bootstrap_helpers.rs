use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Crates whose `info` events (dispatches, server lifecycle) are shown by default.
const RUNWAY_LOG_TARGETS: &[&str] = &[
    "runway",
    "runway_cli",
    "runway_core",
    "runway_github",
    "runway_runtime",
];

/// `warn` for dependencies, `info` for Runway's own crates.
pub(crate) fn default_log_directives() -> String {
    let mut directives = vec!["warn".to_string()];
    directives.extend(
        RUNWAY_LOG_TARGETS
            .iter()
            .map(|target| format!("{target}=info")),
    );
    directives.join(",")
}

/// Builds the filter from a `RUST_LOG` value, falling back to the Runway
/// defaults when it is unset or blank.
pub(crate) fn build_env_filter(rust_log: Option<&str>) -> EnvFilter {
    match rust_log.map(str::trim).filter(|value| !value.is_empty()) {
        Some(directives) => EnvFilter::builder()
            .with_default_directive(LevelFilter::WARN.into())
            .parse_lossy(directives),
        None => EnvFilter::builder().parse_lossy(default_log_directives()),
    }
}

pub(crate) fn init_tracing() {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(rust_log.as_deref()))
        .with_target(false)
        .compact()
        .init();
}
