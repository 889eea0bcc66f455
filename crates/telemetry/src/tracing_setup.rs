//! Log output for the engine and its binaries.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Used when neither the config nor `RUST_LOG` gives a usable filter.
const FALLBACK_FILTER: &str = "info";

/// How logs are filtered and rendered.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// `EnvFilter` directives, e.g. `"info,tracker=debug,pipeline=trace"`
    pub filter: String,
    /// One JSON object per line instead of human readable lines
    pub json: bool,
    /// Log span open/close, useful when following a single request
    pub span_events: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: FALLBACK_FILTER.to_string(),
            json: false,
            span_events: false,
        }
    }
}

impl TracingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `RUST_LOG`, `LOG_JSON` and `LOG_SPANS`.
    pub fn from_env() -> Self {
        let flag = |name: &str| std::env::var(name).map(|v| is_enabled(&v)).unwrap_or(false);

        Self {
            filter: std::env::var("RUST_LOG").unwrap_or_else(|_| FALLBACK_FILTER.to_string()),
            json: flag("LOG_JSON"),
            span_events: flag("LOG_SPANS"),
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn with_span_events(mut self, span_events: bool) -> Self {
        self.span_events = span_events;
        self
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new(FALLBACK_FILTER))
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let spans = if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        if self.json {
            fmt::layer()
                .json()
                .with_span_events(spans)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .boxed()
        } else {
            fmt::layer().with_span_events(spans).with_target(true).boxed()
        }
    }
}

/// Installs the global subscriber. A second call keeps the first subscriber.
pub fn init_tracing(config: TracingConfig) {
    let installed = tracing_subscriber::registry()
        .with(config.fmt_layer())
        .with(config.env_filter())
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(filter = %config.filter, json = config.json, "Logging initialized");
    }
}

/// [`init_tracing`] with [`TracingConfig::from_env`].
pub fn init_tracing_from_env() {
    init_tracing(TracingConfig::from_env());
}

fn is_enabled(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
