use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "info,tower_http=info";

/// Installs the global subscriber. `RUST_LOG` overrides the filter and
/// `LOG_FORMAT=pretty` switches from compact single-line output.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    let layer = fmt::layer().with_target(false);
    if pretty_requested(std::env::var("LOG_FORMAT").ok().as_deref()) {
        registry.with(layer.pretty()).init();
    } else {
        registry.with(layer.compact()).init();
    }
}

fn pretty_requested(format: Option<&str>) -> bool {
    format.is_some_and(|f| f.trim().eq_ignore_ascii_case("pretty"))
}

#[cfg(test)]
mod tests {
    use super::pretty_requested;

    #[test]
    fn only_pretty_switches_format() {
        assert!(pretty_requested(Some("Pretty")));
        assert!(!pretty_requested(Some("json")));
        assert!(!pretty_requested(None));
    }
}
