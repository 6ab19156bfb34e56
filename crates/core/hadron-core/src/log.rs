//! Log sink for the DXE phase.
//!
//! Firmware crates log through the [`log`](::log) facade. This module provides
//! the backend: a [`Log`] implementation that formats each record with a
//! fixed-width level name and its target, then hands it to a registered print
//! function (serial port, debug console, or a test buffer). Before
//! [`set_print_fn`] is called, output is silently discarded.

use core::fmt;
use core::sync::atomic::{AtomicPtr, Ordering};

use ::log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};

/// The signature of the output function records are written to.
pub type PrintFn = fn(fmt::Arguments<'_>);

fn null_print(_args: fmt::Arguments<'_>) {}

static PRINT_FN: AtomicPtr<()> = AtomicPtr::new(null_print as *mut ());

/// Registers the output function.
///
/// May be called more than once (e.g., once for early serial, once for the
/// full console). Uses `Release` ordering so subsequent loads see the new
/// function.
pub fn set_print_fn(f: PrintFn) {
    PRINT_FN.store(f as *mut (), Ordering::Release);
}

/// Loads the current print function from the atomic pointer.
#[inline]
fn load_print_fn() -> PrintFn {
    let ptr = PRINT_FN.load(Ordering::Acquire);
    // SAFETY: We only ever store valid `PrintFn` function pointers into PRINT_FN.
    unsafe { core::mem::transmute::<*mut (), PrintFn>(ptr) }
}

/// Returns the fixed-width name printed for `level`.
pub const fn level_name(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN ",
        Level::Info => "INFO ",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

struct FirmwareLogger;

static LOGGER: FirmwareLogger = FirmwareLogger;

impl Log for FirmwareLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= ::log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        load_print_fn()(format_args!(
            "[{}] {}: {}\n",
            level_name(record.level()),
            record.target(),
            record.args()
        ));
    }

    fn flush(&self) {}
}

/// Installs the firmware logger as the global `log` backend.
///
/// # Errors
///
/// Returns [`SetLoggerError`] if a logger was already installed.
pub fn init(max_level: LevelFilter) -> Result<(), SetLoggerError> {
    ::log::set_logger(&LOGGER)?;
    ::log::set_max_level(max_level);
    Ok(())
}
