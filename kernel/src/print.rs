//! Printing facilities.
//!
//! The `pr_*` macros format a single log line and hand it, together with its
//! level, to the console installed by the host. Without a console the output
//! is dropped, like `printk` before a console is registered.

use core::{cmp, fmt};

use spin::RwLock;

/// Kernel log levels, `KERN_EMERG` (0) to `KERN_DEBUG` (7).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum KernLevel {
    Emerg = 0,
    Alert = 1,
    Crit = 2,
    Err = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
    /// Continuation of the previous line (`KERN_CONT`).
    Cont = 8,
}

/// Destination of formatted log lines.
pub trait Console: Sync {
    fn write(&self, level: KernLevel, line: &[u8]);
}

static CONSOLE: RwLock<Option<&'static dyn Console>> = RwLock::new(None);

/// Installs `console` as the destination of every `pr_*` line, replacing the previous one.
pub fn set_console(console: &'static dyn Console) {
    *CONSOLE.write() = Some(console);
}

#[doc(hidden)]
pub fn printk(level: KernLevel, s: &[u8]) {
    if let Some(console) = *CONSOLE.read() {
        console.write(level, s);
    }
}

// From kernel/print/printk.c
const LOG_LINE_MAX: usize = 1024 - 32;

#[doc(hidden)]
pub struct LogLineWriter {
    data: [u8; LOG_LINE_MAX],
    pos: usize,
}

#[allow(clippy::new_without_default)]
impl LogLineWriter {
    pub fn new() -> LogLineWriter {
        LogLineWriter {
            data: [0u8; LOG_LINE_MAX],
            pos: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.pos]
    }
}

impl fmt::Write for LogLineWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let copy_len = cmp::min(LOG_LINE_MAX - self.pos, s.as_bytes().len());
        self.data[self.pos..self.pos + copy_len].copy_from_slice(&s.as_bytes()[..copy_len]);
        self.pos += copy_len;
        Ok(())
    }
}

#[doc(hidden)]
pub fn call_printk(level: KernLevel, args: fmt::Arguments<'_>) {
    let mut writer = LogLineWriter::new();
    // `LogLineWriter` truncates instead of failing.
    let _ = fmt::write(&mut writer, args);
    printk(level, writer.as_bytes());
}

#[doc(hidden)]
#[macro_export]
macro_rules! print_macro {
    ($level:expr, $($arg:tt)+) => {
        $crate::print::call_printk($level, format_args!($($arg)+))
    };
}

/// Prints an error-level message (level 3).
#[macro_export]
macro_rules! pr_err {
    ($($arg:tt)*) => ($crate::print_macro!($crate::print::KernLevel::Err, $($arg)*));
}

/// Prints a warning-level message (level 4).
#[macro_export]
macro_rules! pr_warn {
    ($($arg:tt)*) => ($crate::print_macro!($crate::print::KernLevel::Warning, $($arg)*));
}

/// Prints an info-level message (level 6).
#[macro_export]
macro_rules! pr_info {
    ($($arg:tt)*) => ($crate::print_macro!($crate::print::KernLevel::Info, $($arg)*));
}

/// Prints a debug-level message (level 7).
///
/// Compiled out of release builds, like `pr_debug` without `DEBUG`.
#[macro_export]
macro_rules! pr_debug {
    ($($arg:tt)*) => (
        if cfg!(debug_assertions) {
            $crate::print_macro!($crate::print::KernLevel::Debug, $($arg)*)
        }
    );
}

/// Continues a previous log message in the same line.
#[macro_export]
macro_rules! pr_cont {
    ($($arg:tt)*) => ($crate::print_macro!($crate::print::KernLevel::Cont, $($arg)*));
}
