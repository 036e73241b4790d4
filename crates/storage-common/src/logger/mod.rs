use tracing_subscriber::{fmt, EnvFilter};

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Build the filter: `RUST_LOG` wins when set, otherwise DEBUG or INFO.
pub fn filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    })
}

/// Initialize the tracing subscriber with timestamp, level, and structured fields.
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init(debug: bool, format: LogFormat) {
    let builder = fmt()
        .with_env_filter(filter(debug))
        .with_timer(fmt::time::SystemTime)
        .with_level(true)
        .with_target(true);

    let installed = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_does_not_panic() {
        init(true, LogFormat::Text);
        init(false, LogFormat::Json);
    }

    #[test]
    fn test_filter_levels() {
        if std::env::var("RUST_LOG").is_err() {
            assert_eq!(filter(true).to_string(), "debug");
            assert_eq!(filter(false).to_string(), "info");
        }
    }
}
