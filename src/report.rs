//! User-facing run log.
//!
//! Lines keep a fixed `[channel] message` shape that external tooling
//! scrapes, so they are collected verbatim and also mirrored to `tracing`.

use std::fmt;

/// Severity of a report line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Progress and results.
    Info,
    /// Skipped or degraded input.
    Warn,
    /// A list could not be synced.
    Error,
}

/// One line of the run log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    /// Severity.
    pub level: Level,
    /// Verbatim text.
    pub text: String,
}

impl fmt::Display for ReportLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Ordered run log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    lines: Vec<ReportLine>,
}

impl Report {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a progress line.
    pub fn info(&mut self, text: impl Into<String>) {
        self.push(Level::Info, text.into());
    }

    /// Records a warning line.
    pub fn warn(&mut self, text: impl Into<String>) {
        self.push(Level::Warn, text.into());
    }

    /// Records an error line.
    pub fn error(&mut self, text: impl Into<String>) {
        self.push(Level::Error, text.into());
    }

    /// All lines in emission order.
    #[must_use]
    pub fn lines(&self) -> &[ReportLine] {
        &self.lines
    }

    /// Returns `true` if any line contains `needle`.
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.text.contains(needle))
    }

    /// Number of error lines.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.lines.iter().filter(|l| l.level == Level::Error).count()
    }

    fn push(&mut self, level: Level, text: String) {
        match level {
            Level::Info => tracing::info!(target: "geosite_sync::report", "{text}"),
            Level::Warn => tracing::warn!(target: "geosite_sync::report", "{text}"),
            Level::Error => tracing::error!(target: "geosite_sync::report", "{text}"),
        }
        self.lines.push(ReportLine { level, text });
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
