//! Tracing subscriber setup.

/// Initialize the tracing subscriber with environment filter.
///
/// Uses a static directive string that is a compile-time constant
/// guaranteed to parse.
#[allow(clippy::expect_used)]
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(
                "monitor_engine=info"
                    .parse()
                    .expect("static directive 'monitor_engine=info' is valid"),
            ),
        )
        .init();
}
