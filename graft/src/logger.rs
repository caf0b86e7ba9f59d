use chrono::Local;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

pub const ERROR: u8 = 0;
pub const WARN: u8 = 1;
pub const INFO: u8 = 2;
pub const DEBUG: u8 = 3;

/// Level is read from GRAFT_LOG once, on first use.
static LEVEL: Lazy<AtomicU8> = Lazy::new(|| {
    let lvl = match std::env::var("GRAFT_LOG").unwrap_or_default().to_ascii_lowercase().as_str() {
        "error" => ERROR,
        "warn" => WARN,
        "debug" => DEBUG,
        _ => INFO,
    };
    AtomicU8::new(lvl)
});

fn level() -> u8 {
    LEVEL.load(Ordering::Relaxed)
}

pub fn set_level(lvl: u8) {
    LEVEL.store(lvl, Ordering::Relaxed);
}

fn emit(tag: &str, args: fmt::Arguments) {
    let now = Local::now();
    println!("[{}] {} {}", now.format("%Y-%m-%d %H:%M:%S"), tag, args);
}

pub fn info(args: fmt::Arguments) {
    if level() >= INFO {
        emit("INFO", args);
    }
}

pub fn warn(args: fmt::Arguments) {
    if level() >= WARN {
        emit("WARN", args);
    }
}

pub fn error(args: fmt::Arguments) {
    if level() >= ERROR {
        emit("ERROR", args);
    }
}

pub fn debug(args: fmt::Arguments) {
    if level() >= DEBUG {
        emit("DEBUG", args);
    }
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::logger::info(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::logger::warn(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::logger::error(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::logger::debug(format_args!($($arg)*))
    };
}
