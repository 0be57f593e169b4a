//! Terminal output for human and JSON modes
//!
//! Commands print through an [`OutputFormatter`] so `--json` switches every
//! message at once. In JSON mode only structured payloads and errors are
//! written; informational lines are suppressed.

use serde_json::{json, Value};

use healthbuddy_core::domain::SyncIndicator;

/// Selected with `--json`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn is_json(&self) -> bool {
        *self == OutputFormat::Json
    }
}

pub trait OutputFormatter {
    /// Headline for a completed action
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    /// Detail line under a headline
    fn info(&self, message: &str);
    /// Structured payload (JSON mode only)
    fn print_json(&self, value: &Value);
}

struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {message}");
    }

    fn error(&self, message: &str) {
        eprintln!("\u{2717} {message}");
    }

    fn warn(&self, message: &str) {
        eprintln!("! {message}");
    }

    fn info(&self, message: &str) {
        println!("  {message}");
    }

    fn print_json(&self, _value: &Value) {}
}

struct JsonFormatter;

impl JsonFormatter {
    fn emit(value: &Value) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("{}", json!({"level": "error", "message": e.to_string()})),
        }
    }
}

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!("{}", json!({"level": "ok", "message": message}));
    }

    fn error(&self, message: &str) {
        eprintln!("{}", json!({"level": "error", "message": message}));
    }

    fn warn(&self, message: &str) {
        eprintln!("{}", json!({"level": "warning", "message": message}));
    }

    fn info(&self, _message: &str) {}

    fn print_json(&self, value: &Value) {
        Self::emit(value);
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Human => Box::new(HumanFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Badge shown next to the sync indicator
pub fn indicator_badge(indicator: SyncIndicator) -> &'static str {
    match indicator {
        SyncIndicator::Offline => "[offline]",
        SyncIndicator::Syncing => "[syncing]",
        SyncIndicator::Pending => "[pending]",
        SyncIndicator::Synced => "[synced]",
    }
}

/// Appends an "s" when `count` is not one
pub fn plural(count: u64) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}
