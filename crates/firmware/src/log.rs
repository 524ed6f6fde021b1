use core::fmt;

use crate::{arch, console};

macro_rules! log {
    ($level:expr, $($arg:tt)*) => {
        $crate::log::log($level, format_args!($($arg)*))
    };
}

macro_rules! trace {
    ($($arg:tt)*) => {
        log!($crate::log::LogLevel::Trace, $($arg)*)
    };
}

macro_rules! debug {
    ($($arg:tt)*) => {
        log!($crate::log::LogLevel::Debug, $($arg)*)
    };
}

macro_rules! info {
    ($($arg:tt)*) => {
        log!($crate::log::LogLevel::Info, $($arg)*)
    };
}

macro_rules! warn {
    ($($arg:tt)*) => {
        log!($crate::log::LogLevel::Warn, $($arg)*)
    };
}

macro_rules! error {
    ($($arg:tt)*) => {
        log!($crate::log::LogLevel::Error, $($arg)*)
    };
}

pub fn log(level: LogLevel, message: fmt::Arguments) {
    if !console::is_registered() {
        return;
    }
    let level = LevelFormat(level);
    match arch::current_hart() {
        Some(hart) => console::print(format_args!("[hart {hart}] {level} {message}\n")),
        None => console::print(format_args!("[hart ?] {level} {message}\n")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn style(self) -> (u8, &'static str) {
        match self {
            Self::Trace => (35, "TRACE"),
            Self::Debug => (34, "DEBUG"),
            Self::Info => (32, " INFO"),
            Self::Warn => (33, " WARN"),
            Self::Error => (31, "ERROR"),
        }
    }
}

struct LevelFormat(LogLevel);

impl fmt::Display for LevelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (color, label) = self.0.style();
        write!(f, "\x1B[{color};1m{label}\x1B[0m")
    }
}
