use std::fmt;
use std::path::{
    Path,
    PathBuf,
};
use std::str::FromStr;

use anyhow::{
    anyhow,
    bail,
};
use log::debug;
use serde::{
    Deserialize,
    Serialize,
};

use crate::utils::forward_thread_count;

/// Names of the environment variables read by [`Settings`].
pub mod keys {
    pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
    pub const BEDROCK_ACCESS_KEY: &str = "AWS_BEDROCK_ACCESS_KEY";
    pub const BEDROCK_SECRET_KEY: &str = "AWS_BEDROCK_SECRET_ACCESS_KEY";
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    pub const NCBI_API_KEY: &str = "NCBI_API_KEY";
    pub const LLM_PROVIDER: &str = "LOBSTER_LLM_PROVIDER";
    pub const CLOUD_KEY: &str = "LOBSTER_CLOUD_KEY";
    pub const CLOUD_ENDPOINT: &str = "LOBSTER_CLOUD_ENDPOINT";
    pub const PROFILE: &str = "LOBSTER_PROFILE";
    pub const CONFIG_FILE: &str = "LOBSTER_CONFIG_FILE";
    pub const WORKSPACE: &str = "LOBSTER_WORKSPACE";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Anthropic,
    Bedrock,
}

impl FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "bedrock" => Ok(Self::Bedrock),
            other => {
                Err(anyhow!(
                    "Unknown LLM provider '{}'. Expected 'anthropic' or 'bedrock'",
                    other
                ))
            },
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Anthropic => write!(f, "anthropic"),
            Self::Bedrock => write!(f, "bedrock"),
        }
    }
}

/// Credentials of the provider selected for local execution.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Anthropic {
        api_key: String,
    },
    Bedrock {
        access_key: String,
        secret_key: String,
    },
}

impl Credentials {
    pub fn provider(&self) -> LlmProvider {
        match self {
            Self::Anthropic { .. } => LlmProvider::Anthropic,
            Self::Bedrock { .. } => LlmProvider::Bedrock,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "Credentials({})", self.provider())
    }
}

/// Process level configuration taken from the environment (and `.env`).
#[derive(Clone, Default)]
pub struct Settings {
    pub anthropic_api_key:  Option<String>,
    pub bedrock_access_key: Option<String>,
    pub bedrock_secret_key: Option<String>,
    pub openai_api_key:     Option<String>,
    pub ncbi_api_key:       Option<String>,
    pub provider:           Option<LlmProvider>,
    pub cloud_key:          Option<String>,
    pub cloud_endpoint:     Option<String>,
    pub profile:            Option<String>,
    pub config_file:        Option<PathBuf>,
    pub workspace:          Option<PathBuf>,
}

impl Settings {
    /// Loads `.env` from the working directory when present, then reads the
    /// process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_env_file(".env")
    }

    /// Loads variables from `path` without overriding ones already set,
    /// then reads the process environment. A missing file is not an error
    /// and parent directories are not searched.
    pub fn from_env_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        match dotenvy::from_path(path) {
            Ok(()) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => debug!("No {} file found", path.display()),
            Err(e) => return Err(e.into()),
        }
        // The load-time hook ran before the file was read.
        forward_thread_count();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings through an arbitrary variable lookup. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>, {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let provider = get(keys::LLM_PROVIDER)
            .map(|v| v.parse::<LlmProvider>())
            .transpose()?;

        Ok(Self {
            anthropic_api_key: get(keys::ANTHROPIC_API_KEY),
            bedrock_access_key: get(keys::BEDROCK_ACCESS_KEY),
            bedrock_secret_key: get(keys::BEDROCK_SECRET_KEY),
            openai_api_key: get(keys::OPENAI_API_KEY),
            ncbi_api_key: get(keys::NCBI_API_KEY),
            provider,
            cloud_key: get(keys::CLOUD_KEY),
            cloud_endpoint: get(keys::CLOUD_ENDPOINT),
            profile: get(keys::PROFILE),
            config_file: get(keys::CONFIG_FILE).map(PathBuf::from),
            workspace: get(keys::WORKSPACE).map(PathBuf::from),
        })
    }

    fn bedrock_credentials(&self) -> Option<Credentials> {
        match (&self.bedrock_access_key, &self.bedrock_secret_key) {
            (Some(access_key), Some(secret_key)) => {
                Some(Credentials::Bedrock {
                    access_key: access_key.clone(),
                    secret_key: secret_key.clone(),
                })
            },
            _ => None,
        }
    }

    fn anthropic_credentials(&self) -> Option<Credentials> {
        self.anthropic_api_key
            .as_ref()
            .map(|api_key| Credentials::Anthropic { api_key: api_key.clone() })
    }

    /// Picks the local provider. An explicit `LOBSTER_LLM_PROVIDER` wins and
    /// must come with its credentials; otherwise Anthropic is preferred over
    /// Bedrock.
    pub fn resolve_provider(&self) -> anyhow::Result<Credentials> {
        match self.provider {
            Some(LlmProvider::Anthropic) => {
                self.anthropic_credentials().ok_or_else(|| {
                    anyhow!(
                        "{} is set to 'anthropic' but {} is missing",
                        keys::LLM_PROVIDER,
                        keys::ANTHROPIC_API_KEY
                    )
                })
            },
            Some(LlmProvider::Bedrock) => {
                self.bedrock_credentials().ok_or_else(|| {
                    anyhow!(
                        "{} is set to 'bedrock' but {} and {} are required",
                        keys::LLM_PROVIDER,
                        keys::BEDROCK_ACCESS_KEY,
                        keys::BEDROCK_SECRET_KEY
                    )
                })
            },
            None => {
                if let Some(creds) = self.anthropic_credentials() {
                    return Ok(creds);
                }
                if let Some(creds) = self.bedrock_credentials() {
                    return Ok(creds);
                }
                bail!(
                    "No LLM credentials configured. Set {} or {} and {} (see \
                     .env.example)",
                    keys::ANTHROPIC_API_KEY,
                    keys::BEDROCK_ACCESS_KEY,
                    keys::BEDROCK_SECRET_KEY
                )
            },
        }
    }

    /// Cloud key and endpoint when cloud mode is configured.
    pub fn cloud(&self) -> Option<(&str, &str)> {
        match (&self.cloud_key, &self.cloud_endpoint) {
            (Some(key), Some(endpoint)) => Some((key.as_str(), endpoint.as_str())),
            _ => None,
        }
    }

    pub fn is_cloud_requested(&self) -> bool {
        self.cloud_key.is_some()
    }
}

impl fmt::Debug for Settings {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "***");
        f.debug_struct("Settings")
            .field("anthropic_api_key", &mask(&self.anthropic_api_key))
            .field("bedrock_access_key", &mask(&self.bedrock_access_key))
            .field("bedrock_secret_key", &mask(&self.bedrock_secret_key))
            .field("openai_api_key", &mask(&self.openai_api_key))
            .field("ncbi_api_key", &mask(&self.ncbi_api_key))
            .field("provider", &self.provider)
            .field("cloud_key", &mask(&self.cloud_key))
            .field("cloud_endpoint", &self.cloud_endpoint)
            .field("profile", &self.profile)
            .field("config_file", &self.config_file)
            .field("workspace", &self.workspace)
            .finish()
    }
}
