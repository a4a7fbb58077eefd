use std::collections::HashMap;

use rstest::{
    fixture,
    rstest,
};

use super::*;

type Lookup = Box<dyn Fn(&str) -> Option<String>>;

fn lookup_from(pairs: &[(&str, &str)]) -> Lookup {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Box::new(move |key: &str| map.get(key).cloned())
}

#[fixture]
fn empty_env() -> Lookup {
    lookup_from(&[])
}

#[test]
fn test_provider_parsing() {
    assert_eq!("anthropic".parse::<LlmProvider>().unwrap(), LlmProvider::Anthropic);
    assert_eq!(" Bedrock ".parse::<LlmProvider>().unwrap(), LlmProvider::Bedrock);
    assert!("openai".parse::<LlmProvider>().is_err());
}

#[test]
fn test_settings_empty_values_are_unset() {
    let settings = Settings::from_lookup(lookup_from(&[
        (keys::ANTHROPIC_API_KEY, "  "),
        (keys::NCBI_API_KEY, "ncbi"),
    ]))
    .unwrap();
    assert!(settings.anthropic_api_key.is_none());
    assert_eq!(settings.ncbi_api_key.as_deref(), Some("ncbi"));
}

#[test]
fn test_settings_rejects_unknown_provider() {
    let res = Settings::from_lookup(lookup_from(&[(keys::LLM_PROVIDER, "gemini")]));
    assert!(res.is_err());
}

#[test]
fn test_resolve_prefers_anthropic() {
    let settings = Settings::from_lookup(lookup_from(&[
        (keys::ANTHROPIC_API_KEY, "sk-test"),
        (keys::BEDROCK_ACCESS_KEY, "AKIA"),
        (keys::BEDROCK_SECRET_KEY, "secret"),
    ]))
    .unwrap();
    assert_eq!(
        settings.resolve_provider().unwrap().provider(),
        LlmProvider::Anthropic
    );
}

#[test]
fn test_resolve_explicit_bedrock() {
    let settings = Settings::from_lookup(lookup_from(&[
        (keys::ANTHROPIC_API_KEY, "sk-test"),
        (keys::BEDROCK_ACCESS_KEY, "AKIA"),
        (keys::BEDROCK_SECRET_KEY, "secret"),
        (keys::LLM_PROVIDER, "bedrock"),
    ]))
    .unwrap();
    assert_eq!(
        settings.resolve_provider().unwrap(),
        Credentials::Bedrock {
            access_key: "AKIA".into(),
            secret_key: "secret".into(),
        }
    );
}

#[test]
fn test_resolve_explicit_provider_without_key() {
    let settings = Settings::from_lookup(lookup_from(&[
        (keys::LLM_PROVIDER, "bedrock"),
        (keys::BEDROCK_ACCESS_KEY, "AKIA"),
    ]))
    .unwrap();
    assert!(settings.resolve_provider().is_err());
}

#[rstest]
fn test_resolve_without_credentials(empty_env: Lookup) {
    let settings = Settings::from_lookup(empty_env).unwrap();
    let err = settings.resolve_provider().unwrap_err();
    assert!(err.to_string().contains("No LLM credentials configured"));
}

#[test]
fn test_cloud_requires_endpoint() {
    let settings =
        Settings::from_lookup(lookup_from(&[(keys::CLOUD_KEY, "cloud")])).unwrap();
    assert!(settings.is_cloud_requested());
    assert!(settings.cloud().is_none());
}

#[test]
fn test_settings_debug_masks_secrets() {
    let settings =
        Settings::from_lookup(lookup_from(&[(keys::ANTHROPIC_API_KEY, "sk-secret")]))
            .unwrap();
    let rendered = format!("{:?}", settings);
    assert!(!rendered.contains("sk-secret"));
    assert!(rendered.contains("***"));
}

#[test]
fn test_every_profile_covers_default_agents() {
    for (name, table) in PROFILES.iter() {
        for agent in DEFAULT_AGENTS {
            let preset = table
                .get(agent)
                .unwrap_or_else(|| panic!("{name} misses {agent}"));
            assert!(MODEL_PRESETS.contains_key(preset), "{preset} is not a preset");
        }
    }
}

#[rstest]
fn test_default_profile_is_production(empty_env: Lookup) {
    let configurator = AgentConfigurator::with_lookup(None, None, empty_env).unwrap();
    assert_eq!(configurator.profile(), "production");
    assert_eq!(
        configurator.model_config("supervisor").unwrap().model_id,
        "us.anthropic.claude-3-5-sonnet-20241022-v2:0"
    );
    assert_eq!(configurator.agents().count(), DEFAULT_AGENTS.len());
}

#[rstest]
fn test_unknown_profile(empty_env: Lookup) {
    let err = AgentConfigurator::with_lookup(Some("turbo"), None, empty_env)
        .unwrap_err()
        .to_string();
    assert!(err.contains("Unknown profile: turbo"));
    assert!(err.contains("development"));
}

#[test]
fn test_profile_from_environment() {
    let configurator = AgentConfigurator::with_lookup(
        None,
        None,
        lookup_from(&[(keys::PROFILE, "eu-compliant")]),
    )
    .unwrap();
    assert_eq!(configurator.profile(), "eu-compliant");
    assert_eq!(
        configurator.model_config("supervisor").unwrap().region,
        "eu-central-1"
    );
}

#[test]
fn test_env_overrides_order() {
    let configurator = AgentConfigurator::with_lookup(
        Some("development"),
        None,
        lookup_from(&[
            ("LOBSTER_GLOBAL_MODEL", "claude-4-opus"),
            ("LOBSTER_SUPERVISOR_MODEL", "claude-3-haiku"),
            ("LOBSTER_SUPERVISOR_TEMPERATURE", "0.2"),
            ("LOBSTER_DATA_EXPERT_TEMPERATURE", "warm"),
            ("LOBSTER_METHOD_EXPERT_MODEL", "no-such-model"),
        ]),
    )
    .unwrap();

    let supervisor = configurator.model_config("supervisor").unwrap();
    assert_eq!(supervisor.model_id, "us.anthropic.claude-3-haiku-20240307-v1:0");
    assert_eq!(supervisor.temperature, 0.2);

    // Invalid values are ignored and the global override stays.
    let data_expert = configurator.model_config("data_expert").unwrap();
    assert_eq!(data_expert.model_id, "us.anthropic.claude-opus-4-20250514-v1:0");
    assert_eq!(data_expert.temperature, 1.0);
    let method = configurator.model_config("method_expert").unwrap();
    assert_eq!(method.model_id, "us.anthropic.claude-opus-4-20250514-v1:0");
}

#[rstest]
fn test_missing_agent(empty_env: Lookup) {
    let configurator = AgentConfigurator::with_lookup(None, None, empty_env).unwrap();
    assert!(configurator.agent_config("genomics_wizard").is_err());
}

#[rstest]
fn test_export_and_reload(empty_env: Lookup) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agents.json");

    let configurator = AgentConfigurator::with_lookup(
        Some("cost-optimized"),
        None,
        lookup_from(&[("LOBSTER_SUPERVISOR_TEMPERATURE", "0.1")]),
    )
    .unwrap();
    configurator.export_config(&path).unwrap();

    let reloaded =
        AgentConfigurator::with_lookup(None, Some(path.as_path()), empty_env).unwrap();
    let original = configurator.agents().cloned().collect::<Vec<_>>();
    let restored = reloaded.agents().cloned().collect::<Vec<_>>();
    assert_eq!(original, restored);
    assert_eq!(reloaded.model_config("supervisor").unwrap().temperature, 0.1);
}

#[rstest]
fn test_config_file_defaults(empty_env: Lookup) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agents.json");
    std::fs::write(
        &path,
        r#"{
            "agents": {
                "supervisor": {
                    "model_config": {
                        "provider": "openai",
                        "model_id": "gpt-4o",
                        "tier": "standard"
                    }
                }
            }
        }"#,
    )
    .unwrap();

    let configurator =
        AgentConfigurator::with_lookup(None, Some(path.as_path()), empty_env).unwrap();
    let agent = configurator.agent_config("supervisor").unwrap();
    assert_eq!(agent.name, "supervisor");
    assert!(agent.enabled);
    assert_eq!(agent.model_config.temperature, 0.7);
    assert_eq!(agent.model_config.region, "us-east-1");
    assert_eq!(agent.model_config.provider, ModelProvider::Openai);
    assert!(configurator.agent_config("data_expert").is_err());
}

#[test]
fn test_llm_params_by_provider() {
    let settings = Settings::from_lookup(lookup_from(&[
        (keys::BEDROCK_ACCESS_KEY, "AKIA"),
        (keys::BEDROCK_SECRET_KEY, "secret"),
        (keys::OPENAI_API_KEY, "sk-openai"),
    ]))
    .unwrap();
    let configurator =
        AgentConfigurator::with_lookup(None, None, lookup_from(&[])).unwrap();
    let params = configurator.llm_params("supervisor", &settings).unwrap();
    assert_eq!(params.region_name, "us-east-1");
    assert_eq!(params.aws_access_key_id.as_deref(), Some("AKIA"));
    assert!(params.openai_api_key.is_none());
}

#[rstest]
#[case("us.anthropic.claude-3-5-haiku-20241022-v1:0", "claude-3-5-haiku-20241022")]
#[case("eu.anthropic.claude-3-5-sonnet-20241022-v2:0", "claude-3-5-sonnet-20241022")]
#[case("us.anthropic.claude-opus-4-1-20250805-v1:0", "claude-opus-4-1-20250805")]
#[case("claude-3-5-haiku-latest", "claude-3-5-haiku-latest")]
fn test_anthropic_model_id(
    #[case] bedrock_id: &str,
    #[case] expected: &str,
) {
    let mut model = MODEL_PRESETS.get("claude-3-haiku").unwrap().clone();
    model.model_id = bedrock_id.to_string();
    assert_eq!(model.anthropic_model_id(), expected);
}

#[rstest]
fn test_render_lists_agents(empty_env: Lookup) {
    let configurator =
        AgentConfigurator::with_lookup(Some("development"), None, empty_env).unwrap();
    let rendered = configurator.render().unwrap();
    assert!(rendered.contains("Profile: development"));
    assert!(rendered.contains("Transcriptomics Expert"));
    assert!(rendered.contains("Tier: lightweight"));
}

#[test]
fn test_env_file_forwards_thread_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".env");
    std::fs::write(&path, "LOBSTER_NUM_THREADS=3\n").unwrap();

    Settings::from_env_file(&path).unwrap();
    // Variables already in the environment win over the file.
    let expected = std::env::var("LOBSTER_NUM_THREADS").unwrap();
    assert_eq!(std::env::var("POLARS_MAX_THREADS").unwrap(), expected);
}

#[test]
fn test_env_file_is_not_searched_upwards() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".env"), "LOBSTER_TEST_PARENT_ONLY=1\n").unwrap();
    let child = dir.path().join("project");
    std::fs::create_dir(&child).unwrap();

    assert!(Settings::from_env_file(child.join(".env")).is_ok());
    assert!(std::env::var("LOBSTER_TEST_PARENT_ONLY").is_err());
}
