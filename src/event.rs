//! Event and log callback system.
//!
//! The navigation engines run embedded inside a screen reader's event
//! loop and have no output channel of their own. Diagnostics (defunct
//! recovery, structural invariant violations) are reported through a
//! process-global callback that the host installs once at startup,
//! gated by a minimum level so a quiet session pays nothing for
//! debug chatter.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock};

/// Log level for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Debug,
            1 => Self::Info,
            2 => Self::Warn,
            _ => Self::Error,
        }
    }
}

type EventCallback = Box<dyn Fn(&str, &str) + Send + Sync + 'static>;
type LogCallback = Box<dyn Fn(LogLevel, &str) + Send + Sync + 'static>;

fn event_callback() -> &'static Mutex<Option<EventCallback>> {
    static CALLBACK: OnceLock<Mutex<Option<EventCallback>>> = OnceLock::new();
    CALLBACK.get_or_init(|| Mutex::new(None))
}

fn log_callback() -> &'static Mutex<Option<LogCallback>> {
    static CALLBACK: OnceLock<Mutex<Option<LogCallback>>> = OnceLock::new();
    CALLBACK.get_or_init(|| Mutex::new(None))
}

fn min_level() -> &'static AtomicU8 {
    static LEVEL: AtomicU8 = AtomicU8::new(0);
    &LEVEL
}

/// Set the global event callback.
///
/// Events are named diagnostics the host may want to surface or count:
/// `caret-context-recovered` carries the defunct node's handle.
pub fn set_event_callback<F>(callback: F)
where
    F: Fn(&str, &str) + Send + Sync + 'static,
{
    let mut guard = event_callback().lock().expect("event callback lock");
    *guard = Some(Box::new(callback));
}

/// Emit an event to the registered callback.
pub fn emit_event(name: &str, data: &str) {
    if let Ok(guard) = event_callback().lock() {
        if let Some(callback) = guard.as_ref() {
            callback(name, data);
        }
    }
}

/// Set the global log callback.
pub fn set_log_callback<F>(callback: F)
where
    F: Fn(LogLevel, &str) + Send + Sync + 'static,
{
    let mut guard = log_callback().lock().expect("log callback lock");
    *guard = Some(Box::new(callback));
}

/// Drop log messages below `level`.
pub fn set_log_level(level: LogLevel) {
    min_level().store(level as u8, Ordering::Relaxed);
}

/// The current minimum log level.
#[must_use]
pub fn log_level() -> LogLevel {
    LogLevel::from_u8(min_level().load(Ordering::Relaxed))
}

/// Emit a log message, subject to the minimum level.
pub fn emit_log(level: LogLevel, message: &str) {
    if level < log_level() {
        return;
    }
    if let Ok(guard) = log_callback().lock() {
        if let Some(callback) = guard.as_ref() {
            callback(level, message);
        }
    }
}
