use std::fmt::Write as _;

use itertools::Itertools;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::{
    Map,
    Value,
};

use crate::utils::{
    format_megabytes,
    log_timestamp,
};

/// One recorded tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUsage {
    pub tool:        String,
    pub parameters:  Map<String, Value>,
    pub description: Option<String>,
    pub timestamp:   String,
}

/// Loaded data facts shown at the top of the technical summary.
#[derive(Debug, Clone, PartialEq)]
pub struct DataInfo {
    pub rows:          usize,
    pub cols:          usize,
    pub memory_bytes:  usize,
    pub metadata_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingHistory {
    log:   Vec<String>,
    tools: Vec<ToolUsage>,
}

impl ProcessingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_log<S: Into<String>>(
        &mut self,
        entry: S,
    ) {
        self.log.push(entry.into())
    }

    pub fn record(
        &mut self,
        tool: &str,
        parameters: Map<String, Value>,
        description: Option<&str>,
    ) -> &ToolUsage {
        self.tools.push(ToolUsage {
            tool: tool.to_string(),
            parameters,
            description: description.map(str::to_string),
            timestamp: log_timestamp(),
        });
        &self.tools[self.tools.len() - 1]
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn tools(&self) -> &[ToolUsage] {
        &self.tools
    }

    /// Last `n` log entries.
    pub fn recent_log(
        &self,
        n: usize,
    ) -> &[String] {
        &self.log[self.log.len().saturating_sub(n)..]
    }

    /// Markdown report of the data, the processing log and every tool call.
    pub fn technical_summary(
        &self,
        data: Option<&DataInfo>,
    ) -> String {
        let mut out = String::from("# Technical Summary\n\n");

        if let Some(info) = data {
            out.push_str("## Data Information\n\n");
            let _ = writeln!(out, "- Shape: {} rows × {} columns", info.rows, info.cols);
            let _ = writeln!(
                out,
                "- Memory usage: {}",
                format_megabytes(info.memory_bytes, 2)
            );
            if !info.metadata_keys.is_empty() {
                let _ = writeln!(
                    out,
                    "- Metadata keys: {}",
                    info.metadata_keys.iter().take(5).join(", ")
                );
            }
            out.push('\n');
        }

        if !self.log.is_empty() {
            out.push_str("## Processing Log\n\n");
            for entry in &self.log {
                let _ = writeln!(out, "- {}", entry);
            }
            out.push('\n');
        }

        if !self.tools.is_empty() {
            out.push_str("## Tool Usage History\n\n");
            for (i, usage) in self.tools.iter().enumerate() {
                let _ = writeln!(out, "### {}. {} ({})\n", i + 1, usage.tool, usage.timestamp);
                if let Some(description) = &usage.description {
                    let _ = writeln!(out, "{}\n", description);
                }
                if !usage.parameters.is_empty() {
                    out.push_str("**Parameters:**\n\n");
                    for (name, value) in &usage.parameters {
                        let _ = writeln!(out, "- {}: {}", name, render_value(value));
                    }
                    out.push('\n');
                }
            }
        }

        out
    }
}

/// Parameter value as shown in the summary; long arrays are cut to their
/// first five items.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) if items.len() > 5 => {
            format!(
                "[{}...] (length: {})",
                items.iter().take(5).map(render_value).join(", "),
                items.len()
            )
        },
        Value::Array(items) => format!("[{}]", items.iter().map(render_value).join(", ")),
        other => other.to_string(),
    }
}
