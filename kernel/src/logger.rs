use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Once;

use crate::{pr_cont, pr_debug, pr_err, pr_info, pr_warn};

struct SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }
    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let module_path = record.module_path().unwrap_or_default();
        match record.level() {
            Level::Error => {
                pr_err!("[ERROR] [{}] {}\n", module_path, record.args());
            }
            Level::Warn => {
                pr_warn!("[ WARN] [{}] {}\n", module_path, record.args());
            }
            Level::Info => {
                pr_info!("[ INFO] [{}] {}\n", module_path, record.args());
            }
            Level::Debug => {
                pr_debug!("[DEBUG] [{}] {}\n", module_path, record.args());
            }
            Level::Trace => {
                pr_cont!("[TRACE] [{}] {}\n", module_path, record.args());
            }
        };
    }
    fn flush(&self) {}
}

static LOGGER: SimpleLogger = SimpleLogger;
static INIT: Once = Once::new();

/// Parses the value of the `LOG` build variable.
fn level_filter(level: Option<&str>) -> LevelFilter {
    match level {
        Some("ERROR") => LevelFilter::Error,
        Some("WARN") => LevelFilter::Warn,
        Some("INFO") => LevelFilter::Info,
        Some("DEBUG") => LevelFilter::Debug,
        Some("TRACE") => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Routes the `log` facade to the kernel console.
///
/// Only the first call installs the logger; later calls are no-ops, so every
/// module can call this from its `init`.
pub fn init_logger() {
    INIT.call_once(|| {
        pr_info!("Init logger {:?}\n", option_env!("LOG"));
        if log::set_logger(&LOGGER).is_err() {
            pr_warn!("a logger is already installed, keeping it\n");
            return;
        }
        log::set_max_level(level_filter(option_env!("LOG")));
    });
}
