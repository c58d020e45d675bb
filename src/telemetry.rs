// Structured logging setup for hosts embedding the pose engine

use tracing_subscriber::{filter::Directive, fmt, prelude::*, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` refines filtering on top of `poise=info`. Set `LOG_FORMAT=json`
/// for one JSON object per event. Returns `false` if a subscriber was
/// already installed, which leaves the existing one in place.
pub fn init_tracing() -> bool {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let mut env_filter = EnvFilter::from_default_env();
    if let Ok(directive) = "poise=info".parse::<Directive>() {
        env_filter = env_filter.add_directive(directive);
    }

    let installed = if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .try_init()
    };

    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_harmless() {
        init_tracing();
        assert!(!init_tracing());
        tracing::info!("still logging after repeated init");
    }
}
