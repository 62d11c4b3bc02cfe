//! # Structured Logging
//!
//! Synchronous single-line JSON logs with deterministic key ordering:
//! `event`, `severity`, and `ts` first, then fields alphabetically.
//! One log line = one event; no buffering, so lines survive a crash.

use chrono::{SecondsFormat, Utc};
use std::fmt::{self, Write as _};
use std::io::{self, Write};

/// Log severity levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Debug-level detail.
    Trace = 0,
    /// Normal operations.
    Info = 1,
    /// Recoverable issues.
    Warn = 2,
    /// Operation failures.
    Error = 3,
    /// Unrecoverable, process exits.
    Fatal = 4,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Trace => "TRACE",
            Severity::Info => "INFO",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured JSON logger.
pub struct Logger;

impl Logger {
    /// Log an event to stdout. Fields are emitted in alphabetical order
    /// after the fixed `event`/`severity`/`ts` header keys.
    pub fn log(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        Self::log_to_writer(severity, event, fields, &mut io::stdout());
    }

    /// Log to stderr, for errors and fatal events.
    pub fn log_stderr(severity: Severity, event: &str, fields: &[(&str, &str)]) {
        Self::log_to_writer(severity, event, fields, &mut io::stderr());
    }

    /// Shorthand for INFO events.
    pub fn info(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Info, event, fields);
    }

    /// Shorthand for WARN events.
    pub fn warn(event: &str, fields: &[(&str, &str)]) {
        Self::log(Severity::Warn, event, fields);
    }

    /// Shorthand for ERROR events.
    pub fn error(event: &str, fields: &[(&str, &str)]) {
        Self::log_stderr(Severity::Error, event, fields);
    }

    fn log_to_writer<W: Write>(
        severity: Severity,
        event: &str,
        fields: &[(&str, &str)],
        writer: &mut W,
    ) {
        let mut line = String::with_capacity(256);

        line.push_str("{\"event\":\"");
        Self::escape_json_string(&mut line, event);
        line.push_str("\",\"severity\":\"");
        line.push_str(severity.as_str());
        line.push_str("\",\"ts\":\"");
        line.push_str(&Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
        line.push('"');

        let mut sorted: Vec<_> = fields.to_vec();
        sorted.sort_by_key(|(k, _)| *k);
        for (key, value) in sorted {
            line.push_str(",\"");
            Self::escape_json_string(&mut line, key);
            line.push_str("\":\"");
            Self::escape_json_string(&mut line, value);
            line.push('"');
        }
        line.push_str("}\n");

        // One write call per line keeps concurrent log lines whole.
        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }

    fn escape_json_string(output: &mut String, s: &str) {
        for ch in s.chars() {
            match ch {
                '"' | '\\' => {
                    output.push('\\');
                    output.push(ch);
                }
                '\n' => output.push_str("\\n"),
                '\r' => output.push_str("\\r"),
                '\t' => output.push_str("\\t"),
                ch if ch.is_control() => {
                    let _ = write!(output, "\\u{:04x}", ch as u32);
                }
                ch => output.push(ch),
            }
        }
    }
}
