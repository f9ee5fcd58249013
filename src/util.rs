//! Timing and reporting helpers.

use std::time::Instant;

/// Whether this process prints progress and timings.
///
/// Several renderers may run side by side (one per worker); only the primary
/// one reports so the log is not multiplied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reporter {
    primary: bool,
}

impl Reporter {
    pub const PRIMARY: Reporter = Reporter { primary: true };
    pub const SILENT: Reporter = Reporter { primary: false };

    pub fn new(primary: bool) -> Self {
        Self { primary }
    }

    /// Log a progress line at INFO level, if this reporter is primary.
    pub fn progress(&self, args: std::fmt::Arguments<'_>) {
        if self.primary {
            log::info!("{}", args);
        }
    }

    /// Timer that logs at INFO level on drop, if this reporter is primary.
    pub fn info(&self, name: &'static str) -> Timed {
        Timed::new(name, log::Level::Info, self.primary)
    }

    /// Timer that logs at DEBUG level on drop, if this reporter is primary.
    pub fn debug(&self, name: &'static str) -> Timed {
        Timed::new(name, log::Level::Debug, self.primary)
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::PRIMARY
    }
}

/// RAII timer that logs elapsed time on drop.
///
/// # Example
/// ```ignore
/// let _t = reporter.info("Building regular grid");
/// // ... do work ...
/// // logs "Building regular grid: 1.234s" when _t is dropped
/// ```
pub struct Timed {
    name: &'static str,
    start: Instant,
    level: log::Level,
    enabled: bool,
}

impl Timed {
    fn new(name: &'static str, level: log::Level, enabled: bool) -> Self {
        if enabled {
            log::trace!("{}...", name);
        }
        Self {
            name,
            start: Instant::now(),
            level,
            enabled,
        }
    }
}

impl Drop for Timed {
    fn drop(&mut self) {
        if self.enabled {
            log::log!(self.level, "{}: {:.3?}", self.name, self.start.elapsed());
        }
    }
}
