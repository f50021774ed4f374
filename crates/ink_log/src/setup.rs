//! Function to setup logging in the `webink` binary.

/// Directs [`log`] calls to stderr.
///
/// Filtering is controlled with the `RUST_LOG` environment variable
/// (default: `info`). Safe to call more than once.
pub fn setup_logging() {
    fn setup() {
        let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_owned());

        let mut stderr_logger = env_logger::Builder::new();
        stderr_logger.parse_filters(&log_filter);
        stderr_logger.init();
    }

    use std::sync::Once;
    static START: Once = Once::new();
    START.call_once(setup);
}
