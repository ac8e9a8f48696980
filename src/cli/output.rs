// Output formatting for CLI

use std::io::Write;

use serde_json::Value;

use crate::cli::config::OutputFormat;
use crate::sync::SyncSummary;

/// Format and output the run summary
pub struct OutputFormatter {
    format: OutputFormat,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    /// Output the summary; quiet mode prints nothing in the pretty format
    pub fn output_summary(&self, summary: &SyncSummary, writer: &mut impl Write) -> anyhow::Result<()> {
        let value = serde_json::to_value(summary)?;
        match self.format {
            OutputFormat::Json => {
                writeln!(writer, "{}", serde_json::to_string(&value)?)?;
            }
            OutputFormat::Pretty if self.quiet => {}
            OutputFormat::Pretty => {
                self.output_table(&value, writer)?;
                if let Some(stats) = value.get("statistics") {
                    writeln!(writer)?;
                    self.output_table(stats, writer)?;
                }
            }
        }
        Ok(())
    }

    /// Output as table
    fn output_table(&self, value: &Value, writer: &mut impl Write) -> anyhow::Result<()> {
        if let Some(obj) = value.as_object() {
            let max_key_len = obj.keys().map(|k| k.len()).max().unwrap_or(0);

            writeln!(writer, "{}", "=".repeat(max_key_len + 30))?;

            for (key, value) in obj {
                if value.is_object() {
                    continue;
                }
                writeln!(
                    writer,
                    "{:<width$} {}",
                    format!("{}:", key),
                    self.format_value(value),
                    width = max_key_len + 1
                )?;
            }

            writeln!(writer, "{}", "=".repeat(max_key_len + 30))?;
        }
        Ok(())
    }

    /// Format a JSON value for display
    fn format_value(&self, value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            Value::Null => "(null)".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => match n.as_f64() {
                Some(f) if n.is_f64() => format!("{:.2}", f),
                _ => n.to_string(),
            },
            Value::Array(arr) => {
                if arr.is_empty() {
                    "[]".to_string()
                } else {
                    format!("[{} items]", arr.len())
                }
            }
            Value::Object(obj) => format!("{{{} items}}", obj.len()),
        }
    }
}
