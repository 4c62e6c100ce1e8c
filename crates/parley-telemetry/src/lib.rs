mod metrics;

pub use metrics::{HistogramSummary, MetricSample, MetricType, MetricsRecorder};

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Layer, Registry};

/// Configuration for the telemetry subsystem.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by RUST_LOG env var.
    pub log_level: Level,
    /// Per-module level overrides (e.g. "parley_channel" => DEBUG).
    pub module_levels: Vec<(String, Level)>,
    /// JSON lines on stdout; plain text when false.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            module_levels: Vec::new(),
            json: true,
        }
    }
}

type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Handle kept alive by the host for the lifetime of the process.
pub struct TelemetryGuard {
    metrics: Arc<MetricsRecorder>,
    base_directives: String,
    module_levels: Arc<RwLock<Vec<(String, Level)>>>,
    filter: FilterHandle,
}

impl TelemetryGuard {
    /// Override the level of one module and swap the rebuilt filter into
    /// the installed subscriber. Fails once that subscriber is gone.
    pub fn set_module_level(&self, module: &str, level: Level) -> Result<(), reload::Error> {
        let directives = {
            let mut levels = self.module_levels.write();
            if let Some(entry) = levels.iter_mut().find(|(m, _)| m == module) {
                entry.1 = level;
            } else {
                levels.push((module.to_string(), level));
            }
            join_directives(&self.base_directives, &levels)
        };
        self.filter.reload(EnvFilter::new(directives))
    }

    pub fn module_levels(&self) -> Vec<(String, Level)> {
        self.module_levels.read().clone()
    }

    /// Directives of the filter currently in effect.
    pub fn current_filter(&self) -> Option<String> {
        self.filter.with_current(|filter| filter.to_string()).ok()
    }

    /// Shared recorder to hand to channels and sessions.
    pub fn metrics(&self) -> Arc<MetricsRecorder> {
        Arc::clone(&self.metrics)
    }
}

/// Filter directive string for a config, e.g. `info,parley_channel=debug`.
pub fn filter_directives(config: &TelemetryConfig) -> String {
    join_directives(&level_name(config.log_level), &config.module_levels)
}

fn join_directives(base: &str, module_levels: &[(String, Level)]) -> String {
    let mut filter = base.to_string();
    for (module, level) in module_levels {
        filter.push_str(&format!(",{}={}", module, level_name(*level)));
    }
    filter
}

fn level_name(level: Level) -> String {
    level.to_string().to_lowercase()
}

/// Reloadable filter layer plus the guard that controls it. `base` is the
/// directive string module overrides are appended to.
fn reloadable_filter(
    base: String,
    config: TelemetryConfig,
) -> (reload::Layer<EnvFilter, Registry>, TelemetryGuard) {
    let filter = EnvFilter::new(join_directives(&base, &config.module_levels));
    let (layer, handle) = reload::Layer::new(filter);
    let guard = TelemetryGuard {
        metrics: Arc::new(MetricsRecorder::new()),
        base_directives: base,
        module_levels: Arc::new(RwLock::new(config.module_levels)),
        filter: handle,
    };
    (layer, guard)
}

/// Initialize the telemetry subsystem. Call once at startup.
pub fn init_telemetry(config: TelemetryConfig) -> TelemetryGuard {
    let base = std::env::var(EnvFilter::DEFAULT_ENV)
        .ok()
        .filter(|directives| !directives.trim().is_empty())
        .unwrap_or_else(|| level_name(config.log_level));
    let json = config.json;
    let (filter_layer, guard) = reloadable_filter(base, config);

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_list(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
    {
        eprintln!("parley-telemetry: subscriber already installed: {e}");
    }

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_include_module_overrides() {
        let config = TelemetryConfig {
            log_level: Level::WARN,
            module_levels: vec![("parley_channel".into(), Level::DEBUG)],
            json: false,
        };
        assert_eq!(filter_directives(&config), "warn,parley_channel=debug");
    }

    #[test]
    fn default_is_info_json() {
        let config = TelemetryConfig::default();
        assert_eq!(config.log_level, Level::INFO);
        assert!(config.json);
        assert_eq!(filter_directives(&config), "info");
    }

    #[test]
    fn guard_tracks_module_levels() {
        let (_filter, guard) = reloadable_filter("info".into(), TelemetryConfig::default());
        guard.set_module_level("parley_vocab", Level::TRACE).unwrap();
        guard.set_module_level("parley_vocab", Level::DEBUG).unwrap();
        assert_eq!(guard.module_levels(), vec![("parley_vocab".to_string(), Level::DEBUG)]);
        guard.metrics().counter_inc("x", &[], 1);
        assert_eq!(guard.metrics().counter_get("x", &[]), 1);
    }

    #[test]
    fn module_level_change_reaches_the_live_filter() {
        let config = TelemetryConfig {
            log_level: Level::WARN,
            ..TelemetryConfig::default()
        };
        let (filter, guard) = reloadable_filter("warn".into(), config);
        let subscriber = tracing_subscriber::registry().with(filter);

        tracing::subscriber::with_default(subscriber, || {
            assert!(!tracing::enabled!(target: "parley_vocab::pool", Level::DEBUG));
            guard.set_module_level("parley_vocab", Level::DEBUG).unwrap();
            assert!(tracing::enabled!(target: "parley_vocab::pool", Level::DEBUG));
            assert!(!tracing::enabled!(target: "parley_channel", Level::DEBUG));

            let live = guard.current_filter().unwrap();
            assert!(live.contains("parley_vocab=debug"), "{live}");
            assert!(live.contains("warn"), "{live}");
        });
    }

    #[test]
    fn module_level_fails_once_subscriber_is_gone() {
        let (filter, guard) = reloadable_filter("info".into(), TelemetryConfig::default());
        drop(filter);
        assert!(guard.set_module_level("parley_session", Level::TRACE).is_err());
        assert!(guard.current_filter().is_none());
    }
}
