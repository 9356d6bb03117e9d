//! Level-tagged console reporting.
//!
//! The pipeline accumulates soft failures (dropped fields, unresolvable
//! types) as warnings instead of aborting, so every crate funnels its
//! user-facing messages through here. In silent mode only errors are
//! printed; in test mode messages are retained on a stack so tests can
//! assert on them.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Severity of a reported message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }

    fn color(self) -> Color {
        match self {
            Level::Info => Color::Green,
            Level::Warn => Color::Yellow,
            Level::Error => Color::Red,
        }
    }
}

static SILENT: AtomicBool = AtomicBool::new(false);
static TEST_MODE: AtomicBool = AtomicBool::new(false);
static MESSAGES: Mutex<Vec<(Level, String)>> = Mutex::new(Vec::new());

/// Suppress everything below error level.
pub fn set_silent(silent: bool) {
    SILENT.store(silent, Ordering::SeqCst);
}

/// Retain messages on a stack instead of printing them.
pub fn set_test_mode(enabled: bool) {
    TEST_MODE.store(enabled, Ordering::SeqCst);
    if !enabled {
        MESSAGES.lock().unwrap().clear();
    }
}

/// Take every message retained while test mode was active.
pub fn drain_messages() -> Vec<(Level, String)> {
    std::mem::take(&mut *MESSAGES.lock().unwrap())
}

/// Report a message at the given level.
pub fn emit(level: Level, message: &str) {
    if TEST_MODE.load(Ordering::SeqCst) {
        MESSAGES.lock().unwrap().push((level, message.to_string()));
        return;
    }

    if SILENT.load(Ordering::SeqCst) && level != Level::Error {
        return;
    }

    let mut stream = StandardStream::stdout(ColorChoice::Auto);
    let _ = stream.set_color(ColorSpec::new().set_fg(Some(level.color())));
    let _ = write!(stream, "{}", level.tag());
    let _ = stream.reset();
    let _ = writeln!(stream, ": {}", message);
}

pub fn info(message: &str) {
    emit(Level::Info, message);
}

pub fn warn(message: &str) {
    emit(Level::Warn, message);
}

pub fn error(message: &str) {
    emit(Level::Error, message);
}

/// Report a formatted info message.
#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::emit($crate::Level::Info, &format!($($arg)*))
    };
}

/// Report a formatted warning.
#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::emit($crate::Level::Warn, &format!($($arg)*))
    };
}

/// Report a formatted error.
#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::emit($crate::Level::Error, &format!($($arg)*))
    };
}
