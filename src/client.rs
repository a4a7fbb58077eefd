//! Conversation driver tying the data manager to a chat backend.

use std::fmt::Write as _;
use std::fs;
use std::path::{
    Path,
    PathBuf,
};
use std::time::Instant;

use anyhow::{
    anyhow,
    bail,
    Context,
};
use chrono::{
    DateTime,
    Local,
};
use indexmap::IndexMap;
use log::{
    debug,
    info,
    warn,
};
use serde::Serialize;
use serde_json::{
    json,
    Value,
};

use crate::config::{
    agent_description,
    AgentConfigurator,
    ModelConfig,
};
use crate::data::{
    Category,
    DataManager,
    DataSummary,
    FileRecord,
    PlotInfo,
};
use crate::llm::{
    ChatBackend,
    ChatRequest,
    Message,
    DEFAULT_MAX_TOKENS,
};
use crate::utils::{
    file_timestamp,
    iso_now,
};

/// Agent whose model answers queries.
pub const DEFAULT_AGENT: &str = "supervisor";

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub session_id:       Option<String>,
    pub workspace_path:   Option<PathBuf>,
    pub enable_reasoning: bool,
    pub agent:            String,
    pub max_tokens:       u32,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            session_id:       None,
            workspace_path:   None,
            enable_reasoning: true,
            agent:            DEFAULT_AGENT.to_string(),
            max_tokens:       DEFAULT_MAX_TOKENS,
        }
    }
}

/// Outcome of [`AgentClient::query`].
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub success:    bool,
    pub response:   String,
    pub error:      Option<String>,
    pub duration:   f64,
    pub session_id: String,
    pub has_data:   bool,
    pub plots:      Vec<PlotInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientStatus {
    pub session_id:        String,
    pub message_count:     usize,
    pub has_data:          bool,
    pub data_summary:      Option<DataSummary>,
    pub workspace:         PathBuf,
    pub reasoning_enabled: bool,
    pub backend:           String,
    pub model:             String,
}

pub struct AgentClient {
    session_id:       String,
    workspace_path:   PathBuf,
    enable_reasoning: bool,
    data_manager:     DataManager,
    backend:          Box<dyn ChatBackend>,
    model:            ModelConfig,
    roster:           Vec<(String, String)>,
    max_tokens:       u32,
    messages:         Vec<Message>,
    metadata:         IndexMap<String, Value>,
}

impl AgentClient {
    pub fn new(
        data_manager: DataManager,
        backend: Box<dyn ChatBackend>,
        configurator: &AgentConfigurator,
        options: ClientOptions,
    ) -> anyhow::Result<Self> {
        let session_id = options
            .session_id
            .unwrap_or_else(|| format!("session_{}", file_timestamp()));
        let workspace_path = options
            .workspace_path
            .unwrap_or_else(|| data_manager.workspace_path().clone());
        fs::create_dir_all(&workspace_path)?;

        let model = configurator.model_config(&options.agent)?.clone();
        let roster = configurator
            .agents()
            .filter(|agent| agent.enabled)
            .map(|agent| {
                (
                    agent.name.clone(),
                    format!(
                        "{} [{}]",
                        agent_description(&agent.name).unwrap_or("Specialist agent"),
                        agent.model_config.tier
                    ),
                )
            })
            .collect();

        let mut metadata = IndexMap::new();
        metadata.insert("created_at".to_string(), json!(iso_now()));
        metadata.insert("session_id".to_string(), json!(session_id));
        metadata.insert("workspace".to_string(), json!(workspace_path.display().to_string()));

        info!("Session {} started with {}", session_id, backend.name());
        Ok(Self {
            session_id,
            workspace_path,
            enable_reasoning: options.enable_reasoning,
            data_manager,
            backend,
            model,
            roster,
            max_tokens: options.max_tokens,
            messages: Vec::new(),
            metadata,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn workspace_path(&self) -> &Path {
        &self.workspace_path
    }

    pub fn data_manager(&self) -> &DataManager {
        &self.data_manager
    }

    pub fn data_manager_mut(&mut self) -> &mut DataManager {
        &mut self.data_manager
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn metadata(&self) -> &IndexMap<String, Value> {
        &self.metadata
    }

    /// System prompt: role, agent roster and the current data context.
    pub fn system_prompt(&self) -> String {
        let mut prompt = String::from(
            "You are Lobster, an assistant for bioinformatics data analysis. You \
             coordinate the following specialist agents and answer on their behalf:\n",
        );
        for (name, description) in &self.roster {
            let _ = writeln!(prompt, "- {}: {}", name, description);
        }

        prompt.push_str("\nCurrent data context:\n");
        let summary = self.data_manager.data_summary();
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => prompt.push_str(&json),
            Err(_) => prompt.push_str(&summary.status),
        }
        prompt.push('\n');

        if self.enable_reasoning {
            prompt.push_str(
                "\nExplain your reasoning step by step before giving the final answer.",
            );
        }
        else {
            prompt.push_str("\nAnswer directly without showing intermediate reasoning.");
        }
        prompt
    }

    /// Sends `input` with the conversation so far. Failures are reported in
    /// the result, never returned as errors.
    pub fn query(
        &mut self,
        input: &str,
    ) -> QueryResult {
        self.messages.push(Message::user(input));
        let start = Instant::now();

        let request = ChatRequest {
            model:      self.model.clone(),
            system:     self.system_prompt(),
            messages:   self.messages.clone(),
            max_tokens: self.max_tokens,
        };

        match self.backend.complete(&request) {
            Ok(reply) => {
                let text = reply.text.trim();
                let response = if text.is_empty() {
                    "No response generated.".to_string()
                }
                else {
                    text.to_string()
                };
                self.messages.push(Message::assistant(response.clone()));
                debug!(
                    "Query answered by {} ({} in / {} out tokens)",
                    self.backend.name(),
                    reply.usage.input_tokens,
                    reply.usage.output_tokens
                );

                let has_data = self.data_manager.has_data();
                let plots = if has_data {
                    self.data_manager
                        .latest_plots(Some(5))
                        .into_iter()
                        .map(|p| p.info())
                        .collect()
                }
                else {
                    Vec::new()
                };
                QueryResult {
                    success: true,
                    response,
                    error: None,
                    duration: start.elapsed().as_secs_f64(),
                    session_id: self.session_id.clone(),
                    has_data,
                    plots,
                }
            },
            Err(e) => {
                warn!("Query failed: {:#}", e);
                QueryResult {
                    success:    false,
                    response:   format!("I encountered an error: {}", e),
                    error:      Some(e.to_string()),
                    duration:   start.elapsed().as_secs_f64(),
                    session_id: self.session_id.clone(),
                    has_data:   self.data_manager.has_data(),
                    plots:      Vec::new(),
                }
            },
        }
    }

    /// Files directly under the workspace matching a glob `pattern`.
    pub fn list_workspace_files(
        &self,
        pattern: &str,
    ) -> anyhow::Result<Vec<FileRecord>> {
        let full = self.workspace_path.join(pattern);
        let mut records = Vec::new();
        for entry in glob::glob(&full.to_string_lossy())? {
            let path = entry?;
            let meta = fs::metadata(&path)?;
            if !meta.is_file() {
                continue;
            }
            records.push(FileRecord {
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
                size: meta.len(),
                modified: meta
                    .modified()
                    .map(DateTime::from)
                    .unwrap_or_else(|_| Local::now()),
                path,
            });
        }
        Ok(records)
    }

    /// Finds `filename`: absolute paths are used as is, otherwise the
    /// workspace root, then `data/`, `plots/` and `exports/`, then a case
    /// insensitive match in those directories.
    pub fn locate_file(
        &self,
        filename: &str,
    ) -> anyhow::Result<PathBuf> {
        let path = Path::new(filename);
        if path.is_absolute() {
            if path.is_file() {
                return Ok(path.to_path_buf());
            }
            bail!("File not found: {}", path.display());
        }

        let root_candidate = self.workspace_path.join(filename);
        if root_candidate.is_file() {
            return Ok(root_candidate);
        }

        let search_dirs = Category::ALL.map(|c| self.data_manager.dir(c).to_path_buf());
        for dir in &search_dirs {
            let candidate = dir.join(filename);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        for dir in &search_dirs {
            let Ok(entries) = fs::read_dir(dir)
            else {
                continue;
            };
            for entry in entries.flatten() {
                let candidate = entry.path();
                if candidate.is_file()
                    && entry
                        .file_name()
                        .to_string_lossy()
                        .eq_ignore_ascii_case(filename)
                {
                    return Ok(candidate);
                }
            }
        }

        bail!("File not found in workspace: {}", filename)
    }

    pub fn read_file(
        &self,
        filename: &str,
    ) -> anyhow::Result<String> {
        let path = self.locate_file(filename)?;
        fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
    }

    pub fn write_file(
        &self,
        filename: &str,
        content: &str,
    ) -> anyhow::Result<PathBuf> {
        let path = self.workspace_path.join(filename);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    pub fn conversation_history(&self) -> &[Message] {
        &self.messages
    }

    pub fn status(&self) -> ClientStatus {
        let has_data = self.data_manager.has_data();
        ClientStatus {
            session_id: self.session_id.clone(),
            message_count: self.messages.len(),
            has_data,
            data_summary: has_data.then(|| self.data_manager.data_summary()),
            workspace: self.workspace_path.clone(),
            reasoning_enabled: self.enable_reasoning,
            backend: self.backend.name().to_string(),
            model: self.model.model_id.clone(),
        }
    }

    pub fn reset(&mut self) {
        self.messages.clear();
        self.metadata.insert("reset_at".to_string(), json!(iso_now()));
        info!("Conversation of session {} reset", self.session_id);
    }

    fn write_session_json(
        &self,
        path: PathBuf,
    ) -> anyhow::Result<PathBuf> {
        let workspace_status = self.data_manager.workspace_status()?;
        let session = json!({
            "session_id": self.session_id,
            "metadata": self.metadata,
            "conversation": self.messages,
            "status": self.status(),
            "workspace_status": workspace_status,
            "exported_at": iso_now(),
        });
        fs::write(&path, serde_json::to_string_pretty(&session)?)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    /// Exports the session: a data package (into the `export_path`
    /// directory) when data is loaded, a session JSON (at `export_path`)
    /// otherwise. If that fails a reduced JSON carrying the error is written
    /// to the workspace instead.
    pub fn export_session(
        &self,
        export_path: Option<&Path>,
    ) -> anyhow::Result<PathBuf> {
        let attempt = if self.data_manager.has_data() {
            self.data_manager.create_data_package(export_path)
        }
        else {
            let path = export_path.map(Path::to_path_buf).unwrap_or_else(|| {
                self.workspace_path
                    .join(format!("{}.json", self.session_id))
            });
            self.write_session_json(path)
        };

        match attempt {
            Ok(path) => {
                info!("Session exported to {}", path.display());
                Ok(path)
            },
            Err(e) => {
                warn!("Session export failed, writing basic export: {:#}", e);
                let path = self
                    .workspace_path
                    .join(format!("{}_basic.json", self.session_id));
                let basic = json!({
                    "session_id": self.session_id,
                    "error": e.to_string(),
                    "conversation": self.messages,
                    "exported_at": iso_now(),
                });
                fs::write(&path, serde_json::to_string_pretty(&basic)?)
                    .map_err(|io| anyhow!("writing {}: {}", path.display(), io))?;
                Ok(path)
            },
        }
    }
}

#[cfg(test)]
mod tests;
