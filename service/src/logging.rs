use crate::config::Config;
use log::{LevelFilter, SetLoggerError};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

/// Crates whose logs are hidden below Trace.
///
/// The HTTP stack logs every flushed stream chunk, which drowns out the
/// connection lifecycle messages on a busy server.
const NOISY_DEPENDENCIES: &[&str] = &["tower", "tower_http", "tracing", "hyper", "axum", "mio"];

pub struct Logger;

impl Logger {
    /// Installs the global terminal logger at the configured level.
    pub fn init_logger(config: &Config) -> Result<(), SetLoggerError> {
        let level = config.log_level_filter;
        TermLogger::init(
            level,
            Self::log_config(level),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        )
    }

    /// Trace shows everything; any other level hides the noisy dependencies.
    fn hides_dependencies(level: LevelFilter) -> bool {
        level != LevelFilter::Trace
    }

    fn log_config(level: LevelFilter) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        builder
            .set_time_format_rfc3339()
            .set_target_level(LevelFilter::Error)
            .set_thread_level(LevelFilter::Off);

        if Self::hides_dependencies(level) {
            for module in NOISY_DEPENDENCIES {
                builder.add_filter_ignore_str(module);
            }
        }

        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::{Level, Log, Record};
    use simplelog::WriteLogger;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    // Logs one line from a dependency and one from a platform crate.
    fn captured_output(level: LevelFilter) -> String {
        let captured = Captured::default();
        let logger = WriteLogger::new(level, Logger::log_config(level), captured.clone());

        for (target, text) in [("hyper::proto::h1", "from-hyper"), ("sse::stream", "from-sse")] {
            logger.log(
                &Record::builder()
                    .args(format_args!("{text}"))
                    .level(Level::Info)
                    .target(target)
                    .build(),
            );
        }
        logger.flush();

        let bytes = captured.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_dependency_logs_hidden_below_trace() {
        let output = captured_output(LevelFilter::Info);
        assert!(output.contains("from-sse"));
        assert!(!output.contains("from-hyper"));
    }

    #[test]
    fn test_dependency_logs_shown_at_trace() {
        let output = captured_output(LevelFilter::Trace);
        assert!(output.contains("from-sse"));
        assert!(output.contains("from-hyper"));
    }

    #[test]
    fn test_only_trace_shows_dependencies() {
        assert!(!Logger::hides_dependencies(LevelFilter::Trace));
        for level in [
            LevelFilter::Off,
            LevelFilter::Error,
            LevelFilter::Warn,
            LevelFilter::Info,
            LevelFilter::Debug,
        ] {
            assert!(Logger::hides_dependencies(level), "{level} should hide");
        }
    }

    #[test]
    fn test_log_config_builds_at_every_level() {
        for level in [LevelFilter::Info, LevelFilter::Trace] {
            let _config = Logger::log_config(level);
        }
    }
}
