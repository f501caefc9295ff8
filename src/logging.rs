//! Subscriber installation for the crate's `tracing` events.
//!
//! The dispatcher and the middleware emit structured events keyed by
//! `request_id`; nothing here changes what is logged, only how it is rendered
//! and filtered. Production wants one JSON object per line, local work wants
//! the multi-line pretty form with source locations.
//!
//! | variable | meaning | default |
//! |---|---|---|
//! | `BRRTR_LOG_LEVEL` | base level | `info` |
//! | `BRRTR_LOG_FORMAT` | `json` or `pretty` | `json` |
//! | `BRRTR_LOG_TARGET_FILTER` | extra directives, e.g. `brrtrest::middleware=debug` | none |
//! | `BRRTR_LOG_INCLUDE_LOCATION` | `true` adds file and line | `false` |
//!
//! A set `RUST_LOG` replaces the base level; the extra directives still apply.

use anyhow::Context;
use std::env;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("json") {
            Ok(LogFormat::Json)
        } else if s.eq_ignore_ascii_case("pretty") {
            Ok(LogFormat::Pretty)
        } else {
            Err(format!("unknown log format `{s}`"))
        }
    }
}

/// How events are filtered and rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    /// Directives added on top of the base level.
    pub directives: Vec<String>,
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::production()
    }
}

impl LogConfig {
    /// JSON at `info`.
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Json,
            directives: Vec::new(),
            include_location: false,
        }
    }

    /// Pretty output at `debug` with source locations.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::Pretty,
            directives: Vec::new(),
            include_location: true,
        }
    }

    /// Production settings overridden by the `BRRTR_LOG_*` variables.
    ///
    /// Values that do not parse are ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::production().with_overrides(|name| env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(level) = lookup("BRRTR_LOG_LEVEL").and_then(|v| v.parse().ok()) {
            self.level = level;
        }
        if let Some(format) = lookup("BRRTR_LOG_FORMAT").and_then(|v| v.parse().ok()) {
            self.format = format;
        }
        if let Some(extra) = lookup("BRRTR_LOG_TARGET_FILTER") {
            self.directives = extra
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(flag) = lookup("BRRTR_LOG_INCLUDE_LOCATION").and_then(|v| v.parse().ok()) {
            self.include_location = flag;
        }
        self
    }

    fn filter(&self) -> anyhow::Result<EnvFilter> {
        let level = LevelFilter::from_level(self.level);
        let base = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));
        self.directives.iter().try_fold(base, |filter, raw| {
            let directive: Directive = raw
                .parse()
                .with_context(|| format!("invalid log directive `{raw}`"))?;
            Ok(filter.add_directive(directive))
        })
    }

    fn fmt_layer<S>(&self) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: tracing::Subscriber + for<'a> LookupSpan<'a> + 'static,
    {
        let layer = tracing_subscriber::fmt::layer()
            .with_file(self.include_location)
            .with_line_number(self.include_location);
        match self.format {
            LogFormat::Json => layer.json().with_span_list(true).boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
        }
    }
}

/// Install `config` as the global subscriber.
///
/// Errors on an invalid directive or when a global subscriber already exists.
///
/// ```no_run
/// use brrtrest::logging::{init_logging, LogConfig};
///
/// init_logging(&LogConfig::from_env())?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let filter = config.filter()?;
    Registry::default()
        .with(filter)
        .with(config.fmt_layer())
        .try_init()
        .context("a global tracing subscriber is already installed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overrides(pairs: &[(&str, &str)]) -> LogConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LogConfig::production().with_overrides(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_format_names() {
        assert_eq!("Pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let config = overrides(&[
            ("BRRTR_LOG_LEVEL", "warn"),
            ("BRRTR_LOG_FORMAT", "pretty"),
            ("BRRTR_LOG_TARGET_FILTER", "brrtrest::jobs=trace, ,hyper=off"),
            ("BRRTR_LOG_INCLUDE_LOCATION", "true"),
        ]);
        assert_eq!(config.level, Level::WARN);
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.directives, ["brrtrest::jobs=trace", "hyper=off"]);
        assert!(config.include_location);
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let config = overrides(&[("BRRTR_LOG_LEVEL", "loud"), ("BRRTR_LOG_FORMAT", "xml")]);
        assert_eq!(config, LogConfig::production());
        assert_ne!(LogConfig::development(), LogConfig::default());
    }

    #[test]
    fn test_invalid_directive_is_an_error() {
        let config = LogConfig {
            directives: vec!["brrtrest=notalevel".to_string()],
            ..LogConfig::production()
        };
        assert!(config.filter().is_err());
    }
}
