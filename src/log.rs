use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins over the configured filter when it is set.
pub fn set(env_filter: String) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new(env_filter)))
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(true)
        .init();
}

pub fn default_filter(level: &str) -> String {
    format!("whipdump={level},signal={level},tower_http={level},webrtc=error")
}
