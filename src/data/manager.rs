use std::fs;
use std::path::{
    Path,
    PathBuf,
};

use anyhow::{
    anyhow,
    bail,
    ensure,
    Context,
};
use chrono::{
    DateTime,
    Local,
};
use hashbrown::HashMap;
use indexmap::IndexMap;
use itertools::Itertools;
use log::{
    debug,
    error,
    info,
    warn,
};
use polars::prelude::{
    DataFrame,
    DataType,
};
use serde::{
    Serialize,
    Serializer,
};
use serde_json::{
    json,
    Map,
    Value,
};

use super::io::{
    self,
    detect_dataset,
    FileType,
};
use super::matrix::{
    index_offset,
    ExpressionMatrix,
};
use super::plots::{
    Plot,
    PlotInfo,
    PlotStore,
};
use super::provenance::{
    DataInfo,
    ProcessingHistory,
    ToolUsage,
};
use crate::utils::{
    file_timestamp,
    format_megabytes,
    getter_fn,
};

/// Dataset level annotations, in insertion order.
pub type Metadata = IndexMap<String, Value>;

pub const DEFAULT_WORKSPACE_DIR: &str = ".lobster_workspace";

/// Sub directory of a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Data,
    Plots,
    Exports,
}

impl Category {
    pub const ALL: [Category; 3] = [Self::Data, Self::Plots, Self::Exports];

    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Plots => "plots",
            Self::Exports => "exports",
        }
    }
}

impl std::str::FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "data" => Ok(Self::Data),
            "plots" => Ok(Self::Plots),
            "exports" => Ok(Self::Exports),
            other => bail!("Unknown workspace directory '{}'", other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    pub name:     String,
    pub path:     PathBuf,
    pub size:     u64,
    pub modified: DateTime<Local>,
}

fn serialize_sorted_map<S, K: Ord + Serialize, V: Serialize>(
    map: &HashMap<K, V>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer, {
    let sorted_map: std::collections::BTreeMap<_, _> = map.iter().collect();
    sorted_map.serialize(serializer)
}

/// Overview of the loaded dataset given to the assistant and the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct DataSummary {
    pub status:         String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape:          Option<(usize, usize)>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns:        Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sample_names:   Vec<String>,
    #[serde(
        serialize_with = "serialize_sorted_map",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub data_types:     HashMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage:   Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metadata_keys:  Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub processing_log: Vec<String>,
}

impl DataSummary {
    fn empty() -> Self {
        Self {
            status:         "No data loaded".to_string(),
            shape:          None,
            columns:        Vec::new(),
            sample_names:   Vec::new(),
            data_types:     HashMap::new(),
            memory_usage:   None,
            metadata_keys:  Vec::new(),
            processing_log: Vec::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.shape.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceStatus {
    pub workspace_path:   PathBuf,
    pub data_loaded:      bool,
    pub plot_count:       usize,
    pub saved_files:      IndexMap<Category, usize>,
    pub tool_usage_count: usize,
    pub directories:      IndexMap<Category, PathBuf>,
    pub data_summary:     DataSummary,
}

/// Owns the current dataset and everything derived from it inside a
/// workspace directory.
pub struct DataManager {
    current_data:   Option<DataFrame>,
    metadata:       Metadata,
    matrix:         Option<ExpressionMatrix>,
    plots:          PlotStore,
    history:        ProcessingHistory,
    workspace_path: PathBuf,
    data_dir:       PathBuf,
    plots_dir:      PathBuf,
    exports_dir:    PathBuf,
}

impl DataManager {
    getter_fn!(workspace_path, PathBuf);

    getter_fn!(data_dir, PathBuf);

    getter_fn!(plots_dir, PathBuf);

    getter_fn!(exports_dir, PathBuf);

    getter_fn!(metadata, Metadata);

    getter_fn!(history, ProcessingHistory);

    /// Opens (and creates) a workspace. Without a path the workspace is
    /// `./.lobster_workspace`.
    pub fn new(workspace_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let workspace_path = match workspace_path {
            Some(path) => path,
            None => std::env::current_dir()?.join(DEFAULT_WORKSPACE_DIR),
        };
        let data_dir = workspace_path.join(Category::Data.dir_name());
        let plots_dir = workspace_path.join(Category::Plots.dir_name());
        let exports_dir = workspace_path.join(Category::Exports.dir_name());

        for dir in [&workspace_path, &data_dir, &plots_dir, &exports_dir] {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating workspace dir {}", dir.display()))?;
        }
        debug!("Workspace ready at {}", workspace_path.display());

        Ok(Self {
            current_data: None,
            metadata: Metadata::new(),
            matrix: None,
            plots: PlotStore::default(),
            history: ProcessingHistory::new(),
            workspace_path,
            data_dir,
            plots_dir,
            exports_dir,
        })
    }

    pub fn dir(
        &self,
        category: Category,
    ) -> &Path {
        match category {
            Category::Data => &self.data_dir,
            Category::Plots => &self.plots_dir,
            Category::Exports => &self.exports_dir,
        }
    }

    pub fn has_data(&self) -> bool {
        self.current_data.is_some()
    }

    pub fn current_data(&self) -> Option<&DataFrame> {
        self.current_data.as_ref()
    }

    pub fn matrix(&self) -> Option<&ExpressionMatrix> {
        self.matrix.as_ref()
    }

    /// Replaces the current dataset. Feature columns are coerced to numbers
    /// and missing values set to 0. On error every piece of data state is
    /// cleared.
    pub fn set_data(
        &mut self,
        data: DataFrame,
        metadata: Metadata,
    ) -> anyhow::Result<&DataFrame> {
        match Self::normalize(&data) {
            Ok((frame, mut matrix)) => {
                for (key, value) in metadata.iter() {
                    if is_scalar(value) {
                        matrix.uns_mut().insert(key.clone(), value.clone());
                    }
                }
                let (rows, cols) = matrix.shape();
                self.history
                    .push_log(format!("Data loaded: {} samples × {} features", rows, cols));
                info!("Data loaded: {} samples × {} features", rows, cols);

                self.metadata = metadata;
                self.matrix = Some(matrix);
                Ok(self.current_data.insert(frame))
            },
            Err(e) => {
                error!("Error setting data: {}", e);
                self.clear_data();
                Err(e)
            },
        }
    }

    fn normalize(data: &DataFrame) -> anyhow::Result<(DataFrame, ExpressionMatrix)> {
        let offset = index_offset(data);
        let n_features = data.width().saturating_sub(offset);
        ensure!(data.height() > 0 && n_features > 0, "DataFrame is empty.");

        let non_numeric = data.get_columns()[offset..]
            .iter()
            .filter(|c| c.dtype() == &DataType::String)
            .count();
        if non_numeric > 0 {
            info!("Converting {} non-numeric columns to numeric", non_numeric);
        }

        let matrix = ExpressionMatrix::from_dataframe(data)?;
        let frame = matrix.to_dataframe()?;
        Ok((frame, matrix))
    }

    fn clear_data(&mut self) {
        self.current_data = None;
        self.matrix = None;
        self.metadata = Metadata::new();
    }

    pub fn data_summary(&self) -> DataSummary {
        let (Some(df), Some(matrix)) = (&self.current_data, &self.matrix)
        else {
            return DataSummary::empty();
        };

        let mut data_types: HashMap<String, usize> = HashMap::new();
        for column in df.get_columns().iter().skip(1) {
            *data_types.entry(column.dtype().to_string()).or_insert(0) += 1;
        }

        DataSummary {
            status: "Data loaded".to_string(),
            shape: Some(matrix.shape()),
            columns: matrix.var_names().iter().take(10).cloned().collect(),
            sample_names: matrix.obs_names().iter().take(5).cloned().collect(),
            data_types,
            memory_usage: Some(format_megabytes(df.estimated_size(), 1)),
            metadata_keys: self.metadata.keys().cloned().collect(),
            processing_log: self.history.recent_log(5).to_vec(),
        }
    }

    /// Loads a dataset from disk and records the load.
    pub fn load_file<P: AsRef<Path>>(
        &mut self,
        path: P,
    ) -> anyhow::Result<()> {
        let path = path.as_ref();
        ensure!(path.exists(), "File not found: {}", path.display());
        let file_type = detect_dataset(path)
            .ok_or_else(|| anyhow!("Unsupported file type: {}", path.display()))?;

        let df = io::read_dataset(path, file_type)?;

        let mut metadata = Metadata::new();
        metadata.insert("source".into(), json!(path.display().to_string()));
        metadata.insert("file_type".into(), json!(file_type.as_str()));
        self.set_data(df, metadata)?;

        let mut params = Map::new();
        params.insert("path".into(), json!(path.display().to_string()));
        params.insert("file_type".into(), json!(file_type.as_str()));
        let (rows, cols) = self.matrix.as_ref().map(|m| m.shape()).unwrap_or_default();
        self.log_tool_usage(
            "load_file",
            params,
            Some(&format!(
                "Loaded {} ({} observations × {} variables)",
                path.display(),
                rows,
                cols
            )),
        );

        if let Some(matrix) = &self.matrix {
            let figure = Plot::histogram(
                &matrix.total_counts(),
                "Total counts per observation",
                "Total counts",
            );
            self.add_plot(figure, Some("Total counts per observation"), Some("load_file"))?;
        }
        Ok(())
    }

    /// Writes the current frame; the format follows the suffix of `path`.
    pub fn save_data<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> anyhow::Result<()> {
        let mut df = self
            .current_data
            .clone()
            .ok_or_else(|| anyhow!("No data to save"))?;
        io::write_dataframe(&mut df, path.as_ref())?;
        info!("Data saved to {}", path.as_ref().display());
        Ok(())
    }

    pub fn log_tool_usage(
        &mut self,
        tool: &str,
        parameters: Map<String, Value>,
        description: Option<&str>,
    ) {
        debug!("Tool usage: {}", tool);
        self.history.record(tool, parameters, description);
    }

    pub fn tool_usage(&self) -> &[ToolUsage] {
        self.history.tools()
    }

    pub fn technical_summary(&self) -> String {
        let info = self.current_data.as_ref().map(|df| {
            let (rows, cols) = self.matrix.as_ref().map(|m| m.shape()).unwrap_or_default();
            DataInfo {
                rows,
                cols,
                memory_bytes: df.estimated_size(),
                metadata_keys: self.metadata.keys().cloned().collect(),
            }
        });
        self.history.technical_summary(info.as_ref())
    }

    pub fn add_plot(
        &mut self,
        figure: Value,
        title: Option<&str>,
        source: Option<&str>,
    ) -> anyhow::Result<String> {
        let id = self.plots.add(figure, title, source)?;
        debug!("Stored plot {}", id);
        Ok(id)
    }

    pub fn plot_by_id(
        &self,
        id: &str,
    ) -> Option<&Plot> {
        self.plots.get(id)
    }

    pub fn latest_plots(
        &self,
        n: Option<usize>,
    ) -> Vec<&Plot> {
        self.plots.latest(n)
    }

    pub fn plot_history(&self) -> Vec<PlotInfo> {
        self.plots.history()
    }

    pub fn plots(&self) -> &PlotStore {
        &self.plots
    }

    pub fn clear_plots(&mut self) {
        self.plots.clear()
    }

    /// Writes every stored plot as HTML and JSON into `plots/`.
    pub fn save_plots_to_workspace(&self) -> anyhow::Result<Vec<PathBuf>> {
        let mut saved = Vec::with_capacity(self.plots.len() * 2);
        for plot in self.plots.iter() {
            let stem = plot.file_stem();
            let html_path = self.plots_dir.join(format!("{stem}.html"));
            fs::write(&html_path, plot.to_html()?)?;
            let json_path = self.plots_dir.join(format!("{stem}.json"));
            fs::write(&json_path, serde_json::to_string_pretty(&plot.figure)?)?;
            saved.push(html_path);
            saved.push(json_path);
        }
        if !saved.is_empty() {
            info!("Saved {} plots to {}", self.plots.len(), self.plots_dir.display());
        }
        Ok(saved)
    }

    /// Writes the current frame as CSV into `data/`, with its metadata next
    /// to it. Returns `None` when no data is loaded.
    pub fn save_data_to_workspace(
        &self,
        filename: Option<&str>,
    ) -> anyhow::Result<Option<PathBuf>> {
        if !self.has_data() {
            return Ok(None);
        }
        let filename = filename
            .map(str::to_string)
            .unwrap_or_else(|| format!("data_{}.csv", file_timestamp()));
        let path = self.data_dir.join(&filename);
        self.save_data(&path)?;

        if !self.metadata.is_empty() {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or(filename);
            let metadata_path = self.data_dir.join(format!("{stem}_metadata.json"));
            fs::write(&metadata_path, serde_json::to_string_pretty(&self.metadata)?)?;
        }
        Ok(Some(path))
    }

    fn list_dir(dir: &Path) -> anyhow::Result<Vec<FileRecord>> {
        let mut records = Vec::new();
        if !dir.exists() {
            return Ok(records);
        }
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if !meta.is_file() {
                continue;
            }
            records.push(FileRecord {
                name:     entry.file_name().to_string_lossy().to_string(),
                path:     entry.path(),
                size:     meta.len(),
                modified: meta.modified().map(DateTime::from).unwrap_or_else(|_| Local::now()),
            });
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    pub fn list_workspace_files(
        &self
    ) -> anyhow::Result<IndexMap<Category, Vec<FileRecord>>> {
        Category::ALL
            .iter()
            .map(|c| Ok((*c, Self::list_dir(self.dir(*c))?)))
            .collect()
    }

    pub fn workspace_status(&self) -> anyhow::Result<WorkspaceStatus> {
        let files = self.list_workspace_files()?;
        Ok(WorkspaceStatus {
            workspace_path:   self.workspace_path.clone(),
            data_loaded:      self.has_data(),
            plot_count:       self.plots.len(),
            saved_files:      files.iter().map(|(c, f)| (*c, f.len())).collect(),
            tool_usage_count: self.history.tools().len(),
            directories:      Category::ALL
                .iter()
                .map(|c| (*c, self.dir(*c).to_path_buf()))
                .collect(),
            data_summary:     self.data_summary(),
        })
    }

    /// Saves data, plots and the processing log. Returns a description of
    /// every saved item; failures are logged and reported in the list.
    pub fn auto_save_state(&self) -> Vec<String> {
        let mut saved = Vec::new();

        match self.save_data_to_workspace(None) {
            Ok(Some(path)) => saved.push(format!("Data: {}", file_name(&path))),
            Ok(None) => {},
            Err(e) => {
                warn!("Auto-save of data failed: {}", e);
                saved.push(format!("Error saving data: {}", e));
            },
        }

        match self.save_plots_to_workspace() {
            Ok(paths) if !paths.is_empty() => {
                saved.push(format!("Plots: {} files", paths.len()))
            },
            Ok(_) => {},
            Err(e) => {
                warn!("Auto-save of plots failed: {}", e);
                saved.push(format!("Error saving plots: {}", e));
            },
        }

        if !self.history.tools().is_empty() {
            let log_path = self.exports_dir.join("processing_log.json");
            let result = serde_json::to_string_pretty(&self.history)
                .map_err(anyhow::Error::from)
                .and_then(|s| fs::write(&log_path, s).map_err(anyhow::Error::from));
            match result {
                Ok(()) => saved.push("Processing log: processing_log.json".to_string()),
                Err(e) => {
                    warn!("Auto-save of processing log failed: {}", e);
                    saved.push(format!("Error saving processing log: {}", e));
                },
            }
        }
        saved
    }

    /// Files in `data/` this build can load.
    pub fn list_datasets(&self) -> anyhow::Result<Vec<FileRecord>> {
        Ok(Self::list_dir(&self.data_dir)?
            .into_iter()
            .filter(|r| FileType::detect(&r.path).is_some_and(|t| t.is_loadable()))
            .collect())
    }

    /// Loads a dataset from `data/` by file name, then by stem, then by
    /// case-insensitive name or stem.
    pub fn load_dataset(
        &mut self,
        name: &str,
    ) -> anyhow::Result<PathBuf> {
        let datasets = self.list_datasets()?;
        let found = datasets
            .iter()
            .find(|r| r.name == name)
            .or_else(|| datasets.iter().find(|r| dataset_stem(&r.name) == name))
            .or_else(|| {
                datasets
                    .iter()
                    .find(|r| {
                        r.name.eq_ignore_ascii_case(name)
                            || dataset_stem(&r.name).eq_ignore_ascii_case(name)
                    })
            })
            .map(|r| r.path.clone());

        let Some(path) = found
        else {
            bail!(
                "Dataset '{}' not found. Available: {}",
                name,
                datasets.iter().map(|r| r.name.as_str()).join(", ")
            );
        };
        self.load_file(&path)?;
        Ok(path)
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// File name without the (possibly compound) data suffix.
fn dataset_stem(name: &str) -> &str {
    let name = name.strip_suffix(".gz").unwrap_or(name);
    match name.rfind('.') {
        Some(pos) if pos > 0 => &name[..pos],
        _ => name,
    }
}
