use std::sync::Mutex;

use slog::Drain;
use slog::Fuse;
use slog_async::Async;
use slog_json::Json;

pub use slog::{debug, error, info, o, trace, warn, Discard, Logger};

/// Builds the root logger: JSON lines on stderr, written from a
/// background thread, tagged with the build metadata.
pub fn initialize_logger() -> Logger {
    let drain = Mutex::new(Json::default(std::io::stderr())).map(Fuse);
    let drain = Async::new(drain).build().fuse();

    Logger::root(
        drain,
        o!("name" => info::NAME, "version" => info::VERSION, "revision" => info::REVISION, "build_timestamp" => info::BUILD_TIMESTAMP),
    )
}

/// Routes the `log` facade used by our dependencies (sqlx, reqwest,
/// warp) through an env-filtered slog logger. The returned guard must
/// outlive the program.
#[cfg(feature = "env_logging")]
pub fn initialize_env_logging() -> slog_scope::GlobalLoggerGuard {
    slog_envlogger::init().expect("initialize slog-envlogger")
}

/// A logger that drops everything, for tests and helpers.
pub fn discard() -> Logger {
    Logger::root(Discard, o!())
}
