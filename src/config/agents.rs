use std::fmt::{
    self,
    Write as _,
};
use std::fs::File;
use std::io::{
    BufReader,
    BufWriter,
};
use std::path::{
    Path,
    PathBuf,
};

use anyhow::{
    anyhow,
    Context,
};
use indexmap::IndexMap;
use itertools::Itertools;
use log::{
    debug,
    info,
    warn,
};
use serde::{
    Deserialize,
    Serialize,
};

use super::presets::{
    DEFAULT_PROFILE,
    MODEL_PRESETS,
    PROFILES,
};
use super::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelProvider {
    BedrockAnthropic,
    Openai,
    BedrockMeta,
    BedrockAmazon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    Lightweight,
    Standard,
    Heavy,
    Ultra,
}

impl fmt::Display for ModelTier {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let s = match self {
            Self::Lightweight => "lightweight",
            Self::Standard => "standard",
            Self::Heavy => "heavy",
            Self::Ultra => "ultra",
        };
        f.write_str(s)
    }
}

fn default_temperature() -> f64 {
    0.7
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_enabled() -> bool {
    true
}

/// Configuration of a single model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider:    ModelProvider,
    pub model_id:    String,
    pub tier:        ModelTier,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_region")]
    pub region:      String,
    #[serde(default)]
    pub description: String,
}

impl ModelConfig {
    /// Model id for the direct Anthropic API, derived from a Bedrock
    /// inference profile id such as
    /// `us.anthropic.claude-3-5-haiku-20241022-v1:0`.
    pub fn anthropic_model_id(&self) -> String {
        let id = self.model_id.as_str();
        let id = match id.find("anthropic.") {
            Some(pos) => &id[pos + "anthropic.".len()..],
            None => id,
        };
        match id.rfind("-v") {
            Some(pos)
                if id[pos + 2..]
                    .chars()
                    .all(|c| c.is_ascii_digit() || c == ':') =>
            {
                id[..pos].to_string()
            },
            _ => id.to_string(),
        }
    }
}

/// Configuration of a single agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(skip)]
    pub name:           String,
    pub model_config:   ModelConfig,
    #[serde(default)]
    pub fallback_model: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled:        bool,
    #[serde(default)]
    pub custom_params:  serde_json::Map<String, serde_json::Value>,
}

impl AgentConfig {
    fn from_preset(
        name: &str,
        model_config: ModelConfig,
    ) -> Self {
        Self {
            name: name.to_string(),
            model_config,
            fallback_model: None,
            enabled: true,
            custom_params: Default::default(),
        }
    }
}

/// Parameters handed to an LLM client for one agent.
#[derive(Clone, PartialEq, Serialize)]
pub struct LlmParams {
    pub model_id:              String,
    pub temperature:           f64,
    pub region_name:           String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws_access_key_id:     Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aws_secret_access_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_api_key:        Option<String>,
}

impl fmt::Debug for LlmParams {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("LlmParams")
            .field("model_id", &self.model_id)
            .field("temperature", &self.temperature)
            .field("region_name", &self.region_name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    profile: Option<String>,
    #[serde(default)]
    agents:  IndexMap<String, AgentConfig>,
}

/// Per-agent model configuration built from a profile or a JSON file, with
/// environment overrides applied on top.
#[derive(Debug, Clone)]
pub struct AgentConfigurator {
    profile:     String,
    config_file: Option<PathBuf>,
    agents:      IndexMap<String, AgentConfig>,
}

impl AgentConfigurator {
    /// Builds the configuration from the process environment.
    pub fn new(
        profile: Option<&str>,
        config_file: Option<&Path>,
    ) -> anyhow::Result<Self> {
        Self::with_lookup(profile, config_file, |key| std::env::var(key).ok())
    }

    /// Same as [`AgentConfigurator::new`] with an injected variable lookup.
    pub fn with_lookup<F>(
        profile: Option<&str>,
        config_file: Option<&Path>,
        lookup: F,
    ) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>, {
        let profile = profile
            .map(str::to_string)
            .or_else(|| lookup(super::settings::keys::PROFILE))
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string());

        let mut configurator = Self {
            profile,
            config_file: config_file.map(Path::to_path_buf),
            agents: IndexMap::new(),
        };

        match &configurator.config_file {
            Some(path) if path.exists() => {
                configurator.agents = Self::load_file(path)?;
                info!("Loaded agent configuration from {}", path.display());
            },
            Some(path) => {
                warn!(
                    "Config file {} does not exist, using profile '{}'",
                    path.display(),
                    configurator.profile
                );
                configurator.agents = Self::load_profile(&configurator.profile)?;
            },
            None => {
                configurator.agents = Self::load_profile(&configurator.profile)?;
            },
        }

        configurator.apply_overrides(lookup);
        Ok(configurator)
    }

    fn load_profile(profile: &str) -> anyhow::Result<IndexMap<String, AgentConfig>> {
        let table = PROFILES.get(profile).ok_or_else(|| {
            anyhow!(
                "Unknown profile: {}. Available: {}",
                profile,
                PROFILES.keys().join(", ")
            )
        })?;

        table
            .iter()
            .map(|(agent, preset)| {
                let model = MODEL_PRESETS
                    .get(preset)
                    .ok_or_else(|| anyhow!("Unknown model preset: {}", preset))?;
                Ok((
                    agent.to_string(),
                    AgentConfig::from_preset(agent, model.clone()),
                ))
            })
            .collect()
    }

    fn load_file(path: &Path) -> anyhow::Result<IndexMap<String, AgentConfig>> {
        let reader = BufReader::new(
            File::open(path).with_context(|| format!("opening {}", path.display()))?,
        );
        let parsed: ConfigFile = serde_json::from_reader(reader)
            .with_context(|| format!("parsing {}", path.display()))?;

        Ok(parsed
            .agents
            .into_iter()
            .map(|(name, mut config)| {
                config.name = name.clone();
                (name, config)
            })
            .collect())
    }

    fn apply_overrides<F>(
        &mut self,
        lookup: F,
    ) where
        F: Fn(&str) -> Option<String>, {
        if let Some(preset_name) = lookup("LOBSTER_GLOBAL_MODEL") {
            match MODEL_PRESETS.get(preset_name.as_str()) {
                Some(model) => {
                    for config in self.agents.values_mut() {
                        config.model_config = model.clone();
                    }
                    debug!("Applied global model override '{}'", preset_name);
                },
                None => warn!("Ignoring unknown global model preset '{}'", preset_name),
            }
        }

        for (name, config) in self.agents.iter_mut() {
            let upper = name.to_uppercase();

            if let Some(preset_name) = lookup(&format!("LOBSTER_{upper}_MODEL")) {
                match MODEL_PRESETS.get(preset_name.as_str()) {
                    Some(model) => config.model_config = model.clone(),
                    None => {
                        warn!(
                            "Ignoring unknown model preset '{}' for {}",
                            preset_name, name
                        )
                    },
                }
            }

            if let Some(raw) = lookup(&format!("LOBSTER_{upper}_TEMPERATURE")) {
                match raw.trim().parse::<f64>() {
                    Ok(temperature) => config.model_config.temperature = temperature,
                    Err(_) => {
                        warn!("Ignoring invalid temperature '{}' for {}", raw, name)
                    },
                }
            }
        }
    }

    pub fn agent_config(
        &self,
        agent_name: &str,
    ) -> anyhow::Result<&AgentConfig> {
        self.agents
            .get(agent_name)
            .ok_or_else(|| anyhow!("No configuration found for agent: {}", agent_name))
    }

    pub fn model_config(
        &self,
        agent_name: &str,
    ) -> anyhow::Result<&ModelConfig> {
        self.agent_config(agent_name).map(|c| &c.model_config)
    }

    pub fn llm_params(
        &self,
        agent_name: &str,
        settings: &Settings,
    ) -> anyhow::Result<LlmParams> {
        let model = self.model_config(agent_name)?;
        let mut params = LlmParams {
            model_id:              model.model_id.clone(),
            temperature:           model.temperature,
            region_name:           model.region.clone(),
            aws_access_key_id:     None,
            aws_secret_access_key: None,
            openai_api_key:        None,
        };

        match model.provider {
            ModelProvider::BedrockAnthropic => {
                params.aws_access_key_id = settings.bedrock_access_key.clone();
                params.aws_secret_access_key = settings.bedrock_secret_key.clone();
            },
            ModelProvider::Openai => {
                params.openai_api_key = settings.openai_api_key.clone();
            },
            ModelProvider::BedrockMeta | ModelProvider::BedrockAmazon => {},
        }
        Ok(params)
    }

    pub fn available_models(&self) -> &IndexMap<&'static str, ModelConfig> {
        &MODEL_PRESETS
    }

    pub fn available_profiles(&self) -> impl Iterator<Item = &'static str> {
        PROFILES.keys().copied()
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn agents(&self) -> impl Iterator<Item = &AgentConfig> {
        self.agents.values()
    }

    /// Writes the active configuration in the format accepted by the file
    /// loader.
    pub fn export_config<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> anyhow::Result<()> {
        let path = path.as_ref();
        let payload = ConfigFile {
            profile: Some(self.profile.clone()),
            agents:  self.agents.clone(),
        };
        let writer = BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        );
        serde_json::to_writer_pretty(writer, &payload)?;
        info!("Exported agent configuration to {}", path.display());
        Ok(())
    }

    /// Human readable rendering of the active configuration.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut out = String::new();
        writeln!(out, "Lobster Agent Configuration")?;
        writeln!(out, "Profile: {}", self.profile)?;
        writeln!(out, "{}", "=".repeat(60))?;

        for config in self.agents.values() {
            let model = &config.model_config;
            writeln!(out)?;
            writeln!(out, "{}", title_case(&config.name))?;
            writeln!(out, "   Model: {}", model.model_id)?;
            writeln!(out, "   Tier: {}", model.tier)?;
            writeln!(out, "   Region: {}", model.region)?;
            writeln!(out, "   Temperature: {}", model.temperature)?;
            if !model.description.is_empty() {
                writeln!(out, "   Description: {}", model.description)?;
            }
            if !config.enabled {
                writeln!(out, "   Disabled")?;
            }
        }
        Ok(out)
    }
}

fn title_case(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .join(" ")
}
