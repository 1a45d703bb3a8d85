use tracing_subscriber::EnvFilter;

/// Third-party targets that are too chatty at info level.
const NOISY: &[(&str, &str)] = &[("sqlx", "warn"), ("hyper", "warn"), ("reqwest", "warn")];

fn build_env_filter(debug: bool) -> anyhow::Result<EnvFilter> {
    if let Ok(from_env) = std::env::var(EnvFilter::DEFAULT_ENV) {
        return EnvFilter::try_new(&from_env)
            .map_err(|e| anyhow::anyhow!("Invalid tracing filter '{}': {}", from_env, e));
    }

    let level = if debug { "debug" } else { "info" };
    let mut directives = vec![level.to_string()];
    for (target, lvl) in NOISY {
        directives.push(format!("{}={}", target, lvl));
    }

    let filter_str = directives.join(",");
    EnvFilter::try_new(&filter_str)
        .map_err(|e| anyhow::anyhow!("Invalid tracing filter '{}': {}", filter_str, e))
}

/// Logs go to stderr; stdout carries only the answer.
pub fn init(debug: bool) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(debug)?)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))
}
