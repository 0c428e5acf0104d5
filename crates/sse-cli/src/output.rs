//! Output formatting for sse-cli (text, json, csv)

use clap::ValueEnum;
use colored::Colorize;
use sse_client::Event;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines / ASCII table (default)
    #[default]
    Text,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{}", msg.green());
        }
    }

    /// Print an info message (unless in quiet mode)
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{}", msg);
        }
    }

    /// Print a warning message
    pub fn warn(&self, msg: &str) {
        eprintln!("{}", msg.yellow());
    }

    /// Print an error message
    pub fn error(&self, msg: &str) {
        eprintln!("{}", msg.red());
    }

    /// Print the CSV header for streamed events
    pub fn print_event_header(&self) {
        if self.format == OutputFormat::Csv {
            println!("event,id,retry,data");
        }
    }

    /// Print one event as it arrives
    pub fn print_event(&self, event: &Event) {
        println!("{}", self.format_event(event));
    }

    /// Render one streamed event in the configured format
    pub fn format_event(&self, event: &Event) -> String {
        match self.format {
            OutputFormat::Text => {
                let id = event
                    .id()
                    .map(|id| format!(" #{}", id))
                    .unwrap_or_default();
                format!("{}{}: {}", event.event().cyan().bold(), id, event.data())
            }
            OutputFormat::Json => {
                serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string())
            }
            OutputFormat::Csv => EventRow::from(event).to_csv(),
        }
    }

    /// Print a batch of events (table for text output)
    pub fn print_events(&self, events: &[Event]) {
        match self.format {
            OutputFormat::Text => {
                if events.is_empty() {
                    if !self.quiet {
                        println!("No events");
                    }
                } else {
                    let rows: Vec<EventRow> = events.iter().map(EventRow::from).collect();
                    println!("{}", Table::new(rows));
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(events).unwrap_or_else(|_| "[]".to_string())
                );
            }
            OutputFormat::Csv => {
                self.print_event_header();
                for event in events {
                    println!("{}", EventRow::from(event).to_csv());
                }
            }
        }
    }
}

/// Escape a value for CSV output
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Event display for tables and CSV
#[derive(Debug, Tabled)]
pub struct EventRow {
    #[tabled(rename = "Event")]
    pub event: String,
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Retry")]
    pub retry: String,
    #[tabled(rename = "Data")]
    pub data: String,
}

impl EventRow {
    fn to_csv(&self) -> String {
        [&self.event, &self.id, &self.retry, &self.data]
            .iter()
            .map(|v| escape_csv(v))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl From<&Event> for EventRow {
    fn from(event: &Event) -> Self {
        Self {
            event: event.event().to_string(),
            id: event.id().unwrap_or_default().to_string(),
            retry: event.retry().map(|r| r.to_string()).unwrap_or_default(),
            data: event.data().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_csv_row() {
        let ctx = OutputContext::new(OutputFormat::Csv, true, true);
        let event = Event::new("x,y").with_id("3").with_retry(10);
        assert_eq!(ctx.format_event(&event), "message,3,10,\"x,y\"");
    }

    #[test]
    fn test_json_line() {
        let ctx = OutputContext::new(OutputFormat::Json, true, true);
        let line = ctx.format_event(&Event::new("x").with_event("e"));
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["event"], "e");
        assert_eq!(value["data"], "x");
    }
}
