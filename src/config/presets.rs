//! Built-in model presets and agent profiles.

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use super::agents::{
    ModelConfig,
    ModelProvider,
    ModelTier,
};

/// Agents configured by every profile, in display order.
pub const DEFAULT_AGENTS: [&str; 6] = [
    "supervisor",
    "data_expert",
    "research_agent",
    "transcriptomics_expert",
    "proteomics_expert",
    "method_expert",
];

pub const DEFAULT_PROFILE: &str = "production";

/// One-line role description of a known agent.
pub fn agent_description(name: &str) -> Option<&'static str> {
    match name {
        "supervisor" => Some("Routes requests and answers general questions"),
        "data_expert" => {
            Some("Loads, inspects and downloads datasets (GEO, local files)")
        },
        "research_agent" => Some("Searches the literature and summarises findings"),
        "transcriptomics_expert" => {
            Some("Single-cell and bulk RNA-seq analysis")
        },
        "proteomics_expert" => Some("Mass-spectrometry and affinity proteomics"),
        "method_expert" => {
            Some("Extracts analysis parameters and methods from publications")
        },
        _ => None,
    }
}

fn preset(
    model_id: &str,
    tier: ModelTier,
    temperature: f64,
    region: &str,
    description: &str,
) -> ModelConfig {
    ModelConfig {
        provider: ModelProvider::BedrockAnthropic,
        model_id: model_id.to_string(),
        tier,
        temperature,
        region: region.to_string(),
        description: description.to_string(),
    }
}

const US: &str = "us-east-1";
const EU: &str = "eu-central-1";

pub static MODEL_PRESETS: Lazy<IndexMap<&'static str, ModelConfig>> =
    Lazy::new(|| {
        use ModelTier::*;
        IndexMap::from_iter([
            (
                "claude-3-haiku",
                preset(
                    "us.anthropic.claude-3-haiku-20240307-v1:0",
                    Lightweight,
                    0.7,
                    US,
                    "Fast, cost-effective Claude 3 Haiku for simple tasks",
                ),
            ),
            (
                "claude-3-5-haiku",
                preset(
                    "us.anthropic.claude-3-5-haiku-20241022-v1:0",
                    Lightweight,
                    0.7,
                    US,
                    "Fast, cost-effective Claude 3.5 Haiku for simple tasks",
                ),
            ),
            (
                "claude-3-5-sonnet",
                preset(
                    "us.anthropic.claude-3-5-sonnet-20240620-v1:0",
                    Standard,
                    0.7,
                    US,
                    "Enhanced Claude 3.5 Sonnet with improved performance",
                ),
            ),
            (
                "claude-3-5-sonnet-v2",
                preset(
                    "us.anthropic.claude-3-5-sonnet-20241022-v2:0",
                    Standard,
                    0.7,
                    US,
                    "Latest Claude 3.5 Sonnet v2 with enhanced capabilities",
                ),
            ),
            (
                "claude-4-sonnet",
                preset(
                    "us.anthropic.claude-sonnet-4-20250514-v1:0",
                    Standard,
                    0.7,
                    US,
                    "Next-generation Claude 4 Sonnet model",
                ),
            ),
            (
                "claude-3-opus",
                preset(
                    "us.anthropic.claude-3-opus-20240229-v1:0",
                    Heavy,
                    1.0,
                    US,
                    "Most capable Claude 3 Opus for complex analysis",
                ),
            ),
            (
                "claude-4-opus",
                preset(
                    "us.anthropic.claude-opus-4-20250514-v1:0",
                    Heavy,
                    1.0,
                    US,
                    "Advanced Claude 4 Opus for complex reasoning",
                ),
            ),
            (
                "claude-4-1-opus",
                preset(
                    "us.anthropic.claude-opus-4-1-20250805-v1:0",
                    Heavy,
                    1.0,
                    US,
                    "Latest Claude 4.1 Opus with cutting-edge capabilities",
                ),
            ),
            (
                "claude-3-7-sonnet",
                preset(
                    "us.anthropic.claude-3-7-sonnet-20250219-v1:0",
                    Ultra,
                    1.0,
                    US,
                    "Highest-performance Claude 3.7 Sonnet model",
                ),
            ),
            (
                "claude-3-5-haiku-eu",
                preset(
                    "eu.anthropic.claude-3-5-haiku-20241022-v1:0",
                    Lightweight,
                    0.7,
                    EU,
                    "EU region Claude 3.5 Haiku model",
                ),
            ),
            (
                "claude-3-5-sonnet-eu",
                preset(
                    "eu.anthropic.claude-3-5-sonnet-20240620-v1:0",
                    Standard,
                    0.7,
                    EU,
                    "EU region Claude 3.5 Sonnet model",
                ),
            ),
            (
                "claude-3-5-sonnet-v2-eu",
                preset(
                    "eu.anthropic.claude-3-5-sonnet-20241022-v2:0",
                    Standard,
                    0.7,
                    EU,
                    "EU region Claude 3.5 Sonnet v2 model",
                ),
            ),
            (
                "claude-4-opus-eu",
                preset(
                    "eu.anthropic.claude-opus-4-20250514-v1:0",
                    Heavy,
                    1.0,
                    EU,
                    "EU region Claude 4 Opus model",
                ),
            ),
            (
                "claude-4-1-opus-eu",
                preset(
                    "eu.anthropic.claude-opus-4-1-20250805-v1:0",
                    Heavy,
                    1.0,
                    EU,
                    "EU region Claude 4.1 Opus model",
                ),
            ),
            (
                "claude-3-7-sonnet-eu",
                preset(
                    "eu.anthropic.claude-3-7-sonnet-20250219-v1:0",
                    Ultra,
                    1.0,
                    EU,
                    "EU region Claude 3.7 Sonnet model",
                ),
            ),
        ])
    });

/// Profile name -> agent name -> model preset name.
pub type ProfileTable = IndexMap<&'static str, IndexMap<&'static str, &'static str>>;

fn profile(models: [&'static str; 6]) -> IndexMap<&'static str, &'static str> {
    DEFAULT_AGENTS.iter().copied().zip(models).collect()
}

// Order of each row follows `DEFAULT_AGENTS`.
pub static PROFILES: Lazy<ProfileTable> = Lazy::new(|| {
    IndexMap::from_iter([
        (
            "development",
            profile([
                "claude-3-5-haiku",
                "claude-3-5-haiku",
                "claude-3-5-haiku",
                "claude-3-5-haiku",
                "claude-3-5-haiku",
                "claude-3-5-haiku",
            ]),
        ),
        (
            "production",
            profile([
                "claude-3-5-sonnet-v2",
                "claude-3-5-sonnet",
                "claude-3-5-sonnet",
                "claude-4-opus",
                "claude-4-opus",
                "claude-3-5-sonnet",
            ]),
        ),
        (
            "high-performance",
            profile([
                "claude-4-opus",
                "claude-4-sonnet",
                "claude-4-sonnet",
                "claude-3-7-sonnet",
                "claude-3-7-sonnet",
                "claude-4-sonnet",
            ]),
        ),
        (
            "ultra-performance",
            profile([
                "claude-3-7-sonnet",
                "claude-4-sonnet",
                "claude-4-sonnet",
                "claude-3-7-sonnet",
                "claude-3-7-sonnet",
                "claude-4-1-opus",
            ]),
        ),
        (
            "cost-optimized",
            profile([
                "claude-3-haiku",
                "claude-3-haiku",
                "claude-3-haiku",
                "claude-3-5-sonnet",
                "claude-3-5-sonnet",
                "claude-3-haiku",
            ]),
        ),
        (
            "heavyweight",
            profile([
                "claude-4-1-opus",
                "claude-4-opus",
                "claude-4-opus",
                "claude-4-1-opus",
                "claude-4-1-opus",
                "claude-4-opus",
            ]),
        ),
        (
            "eu-compliant",
            profile([
                "claude-3-5-sonnet-v2-eu",
                "claude-3-5-sonnet-eu",
                "claude-3-5-sonnet-eu",
                "claude-4-1-opus-eu",
                "claude-4-1-opus-eu",
                "claude-3-5-sonnet-eu",
            ]),
        ),
        (
            "eu-high-performance",
            profile([
                "claude-3-7-sonnet-eu",
                "claude-3-5-sonnet-v2-eu",
                "claude-3-5-sonnet-v2-eu",
                "claude-3-7-sonnet-eu",
                "claude-3-7-sonnet-eu",
                "claude-4-opus-eu",
            ]),
        ),
    ])
});
