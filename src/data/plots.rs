//! Plot history kept by the data manager.
//!
//! Figures are Plotly specs stored as JSON values, so they can be written
//! out as standalone HTML pages or raw JSON.

use std::collections::VecDeque;

use anyhow::bail;
use serde::{
    Deserialize,
    Serialize,
};
use serde_json::{
    json,
    Value,
};

use crate::utils::{
    log_timestamp,
    sanitize_filename,
};

pub const DEFAULT_PLOT_CAPACITY: usize = 50;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plot {
    pub id:        String,
    pub title:     String,
    pub timestamp: String,
    pub source:    Option<String>,
    pub figure:    Value,
}

/// Plot entry without the figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotInfo {
    pub id:        String,
    pub title:     String,
    pub timestamp: String,
    pub source:    Option<String>,
}

impl Plot {
    /// Plotly histogram figure.
    pub fn histogram(
        values: &[f64],
        title: &str,
        x_label: &str,
    ) -> Value {
        json!({
            "data": [{
                "type": "histogram",
                "x": values,
                "nbinsx": 50,
            }],
            "layout": {
                "title": {"text": title},
                "xaxis": {"title": {"text": x_label}},
                "yaxis": {"title": {"text": "Count"}},
            }
        })
    }

    /// `<id>_<sanitized title>`, or the id alone when the title has no
    /// usable characters.
    pub fn file_stem(&self) -> String {
        let title = sanitize_filename(&self.title);
        if title.is_empty() {
            self.id.clone()
        }
        else {
            format!("{}_{}", self.id, title)
        }
    }

    pub fn info(&self) -> PlotInfo {
        PlotInfo {
            id:        self.id.clone(),
            title:     self.title.clone(),
            timestamp: self.timestamp.clone(),
            source:    self.source.clone(),
        }
    }

    /// Human readable description written next to exported plots.
    pub fn info_text(&self) -> String {
        format!(
            "ID: {}\nTitle: {}\nCreated: {}\nSource: {}\n",
            self.id,
            self.title,
            self.timestamp,
            self.source.as_deref().unwrap_or("N/A")
        )
    }

    pub fn to_html(&self) -> anyhow::Result<String> {
        let data = self.figure.get("data").cloned().unwrap_or(json!([]));
        let layout = self.figure.get("layout").cloned().unwrap_or(json!({}));
        Ok(format!(
            r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{cdn}"></script>
</head>
<body>
<div id="plot" style="width:100%;height:100vh;"></div>
<script>
Plotly.newPlot("plot", {data}, {layout}, {{"responsive": true}});
</script>
</body>
</html>
"#,
            title = html_escape(&self.title),
            cdn = PLOTLY_CDN,
            data = serde_json::to_string(&data)?,
            layout = serde_json::to_string(&layout)?,
        ))
    }
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Bounded plot history. Ids come from a counter that is never reset, so an
/// id is never handed out twice.
#[derive(Debug, Clone)]
pub struct PlotStore {
    plots:    VecDeque<Plot>,
    counter:  usize,
    capacity: usize,
}

impl Default for PlotStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_PLOT_CAPACITY)
    }
}

impl PlotStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            plots: VecDeque::with_capacity(capacity),
            counter: 0,
            capacity: capacity.max(1),
        }
    }

    /// Stores a figure and returns its id. The figure must be a JSON object
    /// with a `data` entry.
    pub fn add(
        &mut self,
        mut figure: Value,
        title: Option<&str>,
        source: Option<&str>,
    ) -> anyhow::Result<String> {
        if figure.get("data").is_none() {
            bail!("Plot must be a Plotly figure with a 'data' entry");
        }

        let title = match title {
            Some(title) => {
                if let Some(obj) = figure.as_object_mut() {
                    let layout = obj.entry("layout").or_insert_with(|| json!({}));
                    if let Some(layout) = layout.as_object_mut() {
                        layout.insert("title".into(), json!({ "text": title }));
                    }
                }
                title.to_string()
            },
            None => figure_title(&figure).unwrap_or_else(|| "Untitled".to_string()),
        };

        self.counter += 1;
        let id = format!("plot_{}", self.counter);
        self.plots.push_back(Plot {
            id: id.clone(),
            title,
            timestamp: log_timestamp(),
            source: source.map(str::to_string),
            figure,
        });

        while self.plots.len() > self.capacity {
            self.plots.pop_front();
        }
        Ok(id)
    }

    pub fn get(
        &self,
        id: &str,
    ) -> Option<&Plot> {
        self.plots.iter().find(|p| p.id == id)
    }

    /// The `n` most recent plots in insertion order, or all of them.
    pub fn latest(
        &self,
        n: Option<usize>,
    ) -> Vec<&Plot> {
        let skip = n
            .map(|n| self.plots.len().saturating_sub(n))
            .unwrap_or(0);
        self.plots.iter().skip(skip).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Plot> {
        self.plots.iter()
    }

    pub fn history(&self) -> Vec<PlotInfo> {
        self.plots.iter().map(Plot::info).collect()
    }

    pub fn clear(&mut self) {
        self.plots.clear();
    }

    pub fn len(&self) -> usize {
        self.plots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

fn figure_title(figure: &Value) -> Option<String> {
    let title = figure.get("layout")?.get("title")?;
    match title {
        Value::String(s) => Some(s.clone()),
        other => other.get("text")?.as_str().map(str::to_string),
    }
}
