use std::fs::File;
use std::io::{
    BufWriter,
    Write,
};
use std::path::{
    Path,
    PathBuf,
};

use anyhow::{
    anyhow,
    Context,
};
use itertools::Itertools;
use log::info;
use polars::prelude::{
    CsvWriter,
    SerWriter,
};
use serde_json::json;
use zip::write::SimpleFileOptions;
use zip::{
    CompressionMethod,
    ZipWriter,
};

use super::manager::DataManager;
use crate::utils::file_timestamp;

impl DataManager {
    /// Bundles the technical summary, the raw and processed data and every
    /// stored plot into `data_export_<timestamp>.zip`. Without
    /// `output_dir` the archive goes into the workspace `exports/`.
    pub fn create_data_package(
        &self,
        output_dir: Option<&Path>,
    ) -> anyhow::Result<PathBuf> {
        let mut raw = self
            .current_data()
            .cloned()
            .ok_or_else(|| anyhow!("No data to export"))?;
        let matrix = self
            .matrix()
            .ok_or_else(|| anyhow!("No data to export"))?;

        let output_dir = output_dir.unwrap_or(self.exports_dir().as_path());
        std::fs::create_dir_all(output_dir)?;
        let zip_path = output_dir.join(format!("data_export_{}.zip", file_timestamp()));

        let file = File::create(&zip_path)
            .with_context(|| format!("creating {}", zip_path.display()))?;
        let mut zip = ZipWriter::new(BufWriter::new(file));
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        zip.start_file("technical_summary.md", options)?;
        zip.write_all(self.technical_summary().as_bytes())?;

        let mut raw_csv = Vec::new();
        CsvWriter::new(&mut raw_csv)
            .include_header(true)
            .finish(&mut raw)?;
        zip.start_file("raw_data.csv", options)?;
        zip.write_all(&raw_csv)?;

        zip.start_file("processed_data.csv", options)?;
        matrix.write_csv_to(&mut zip)?;

        let plots = self.latest_plots(None);
        if !plots.is_empty() {
            for plot in &plots {
                let stem = plot.file_stem();
                zip.start_file(format!("plots/{stem}.html"), options)?;
                zip.write_all(plot.to_html()?.as_bytes())?;
                zip.start_file(format!("plots/{stem}.json"), options)?;
                zip.write_all(serde_json::to_string_pretty(&plot.figure)?.as_bytes())?;
                zip.start_file(format!("plots/{stem}_info.txt"), options)?;
                zip.write_all(plot.info_text().as_bytes())?;
            }

            let index = plots
                .iter()
                .map(|plot| {
                    let stem = plot.file_stem();
                    json!({
                        "id": plot.id,
                        "title": plot.title,
                        "timestamp": plot.timestamp,
                        "source": plot.source,
                        "html_file": format!("{stem}.html"),
                        "json_file": format!("{stem}.json"),
                    })
                })
                .collect_vec();
            zip.start_file("plots/index.json", options)?;
            zip.write_all(serde_json::to_string_pretty(&index)?.as_bytes())?;

            zip.start_file("plots/README.md", options)?;
            zip.write_all(plots_readme(plots.len()).as_bytes())?;
        }

        let mut writer = zip.finish()?;
        writer.flush()?;
        info!("Data package written to {}", zip_path.display());
        Ok(zip_path)
    }
}

fn plots_readme(count: usize) -> String {
    format!(
        "# Plots\n\n\
         This directory contains {count} plot(s).\n\n\
         - `*.html`: interactive plots, open in a web browser\n\
         - `*.json`: Plotly figure specifications\n\
         - `*_info.txt`: plot metadata\n\
         - `index.json`: list of all plots\n"
    )
}
