//! Logging bootstrap (SPEC_FULL.md Module J), grounded in
//! `kata-containers`'s `slog` + `slog-term` + `slog-async` stack: a
//! terminal decorator wrapped in an async drain, installed as the
//! process-wide `slog_scope` logger so `sbus` and `identityd` can log via
//! `slog_scope::{info, warn, error}` without threading a `Logger` through
//! every function signature — the same "one global sink" shape as the
//! original C's `DEBUG()` macro.

use slog::Drain;

/// Builds the terminal+async drain and installs it as the global scope
/// logger. The returned guard must be kept alive for the process's
/// lifetime; dropping it restores the previous (discard) logger.
pub fn init() -> slog_scope::GlobalLoggerGuard {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let logger = slog::Logger::root(drain, slog::o!("service" => "identityd"));
    slog_scope::set_global_logger(logger)
}
