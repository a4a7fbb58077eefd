//! Configuration: environment settings ([`Settings`]) and per-agent model
//! selection ([`AgentConfigurator`]).
//!
//! Profiles assign a model preset to each agent. A JSON file can replace the
//! profile entirely, and the following variables override either source:
//!
//! * `LOBSTER_GLOBAL_MODEL`: preset applied to every agent.
//! * `LOBSTER_<AGENT>_MODEL`: preset for one agent.
//! * `LOBSTER_<AGENT>_TEMPERATURE`: sampling temperature for one agent.

mod agents;
mod presets;
mod settings;

#[cfg(test)]
mod tests;

pub use agents::{
    AgentConfig,
    AgentConfigurator,
    LlmParams,
    ModelConfig,
    ModelProvider,
    ModelTier,
};
pub use presets::{
    agent_description,
    DEFAULT_AGENTS,
    DEFAULT_PROFILE,
    MODEL_PRESETS,
    PROFILES,
};
pub use settings::{
    keys,
    Credentials,
    LlmProvider,
    Settings,
};
