//! Logging utilities
//!
//! Sets up the `env_logger` backend behind the `log` facade.

/// Initialize the logging system
///
/// `RUST_LOG` takes precedence over `level` when it is set.
///
/// # Panics
///
/// Panics if a global logger has already been installed.
pub fn init_logger(level: &str) {
    env_logger::init_from_env(logger_env(level));
}

/// Initialize the logging system, returning an error if a logger is already set
pub fn try_init_logger(level: &str) -> Result<(), log::SetLoggerError> {
    env_logger::try_init_from_env(logger_env(level))
}

fn logger_env(level: &str) -> env_logger::Env<'_> {
    env_logger::Env::default().filter_or("RUST_LOG", level)
}
