use std::sync::Once;

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info", "warn",
/// "solstice_engine=debug,wgpu=warn").
///
/// `verbose` switches the default level of the solstice crates to `debug`.
/// An explicit `env_filter` wins over `RUST_LOG`, which wins over `verbose`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub verbose: bool,
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            verbose: false,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

impl LoggingConfig {
    /// Default filter used when neither `env_filter` nor `RUST_LOG` is given.
    ///
    /// wgpu and naga are noisy at info; keep them at warn.
    pub fn default_filter(&self) -> String {
        let level = if self.verbose { "debug" } else { "info" };
        format!("info,solstice_engine={level},solstice_server={level},wgpu=warn,wgpu_core=warn,wgpu_hal=warn,naga=warn")
    }
}

static INIT: Once = Once::new();

/// Initializes the global logger once.
///
/// This function is idempotent; subsequent calls are ignored.
/// Intended usage is early in `main`, before the render worker is spawned.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = config.env_filter.as_deref() {
            builder.parse_filters(filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.parse_filters(&config.default_filter());
        }

        builder.write_style(config.write_style);

        // try_init: a test harness may already have installed a logger.
        if builder.try_init().is_err() {
            return;
        }

        log::debug!("logging initialized");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_raises_solstice_level_only() {
        let quiet = LoggingConfig::default().default_filter();
        assert!(quiet.contains("solstice_engine=info"));
        assert!(quiet.contains("wgpu=warn"));

        let loud = LoggingConfig { verbose: true, ..LoggingConfig::default() }.default_filter();
        assert!(loud.contains("solstice_engine=debug"));
        assert!(loud.contains("solstice_server=debug"));
        assert!(loud.contains("wgpu=warn"));
    }

    #[test]
    fn init_is_idempotent() {
        init_logging(LoggingConfig::default());
        init_logging(LoggingConfig { verbose: true, ..LoggingConfig::default() });
    }
}
