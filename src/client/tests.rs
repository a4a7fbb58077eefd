use std::sync::{
    Arc,
    Mutex,
};

use anyhow::anyhow;
use polars::prelude::{
    DataFrame,
    NamedFrom,
    Series,
};
use rstest::{
    fixture,
    rstest,
};
use tempfile::TempDir;

use super::*;
use crate::data::{
    Metadata,
    Plot,
};
use crate::llm::{
    ChatResponse,
    Role,
    Usage,
};

type Seen = Arc<Mutex<Vec<ChatRequest>>>;

/// Echoes the last user message, or fails when `fail` is set.
struct EchoBackend {
    fail: bool,
    seen: Seen,
}

impl ChatBackend for EchoBackend {
    fn name(&self) -> &str {
        "echo"
    }

    fn complete(
        &mut self,
        request: &ChatRequest,
    ) -> anyhow::Result<ChatResponse> {
        self.seen.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(anyhow!("backend offline"));
        }
        let last = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
        Ok(ChatResponse {
            text:        format!("  echo: {}\n", last),
            stop_reason: Some("end_turn".to_string()),
            usage:       Usage {
                input_tokens:  10,
                output_tokens: 3,
            },
        })
    }
}

struct Fixture {
    dir:    TempDir,
    client: AgentClient,
    seen:   Seen,
}

fn make_client(fail: bool) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let dm = DataManager::new(Some(dir.path().to_path_buf())).unwrap();
    let configurator = AgentConfigurator::with_lookup(None, None, |_| None).unwrap();
    let seen = Seen::default();
    let backend = EchoBackend {
        fail,
        seen: seen.clone(),
    };
    let client = AgentClient::new(
        dm,
        Box::new(backend),
        &configurator,
        ClientOptions {
            session_id: Some("session_test".to_string()),
            ..Default::default()
        },
    )
    .unwrap();
    Fixture { dir, client, seen }
}

#[fixture]
fn fixture() -> Fixture {
    make_client(false)
}

fn small_frame() -> DataFrame {
    DataFrame::new(vec![
        Series::new("cell".into(), vec!["c1", "c2"]).into(),
        Series::new("GeneA".into(), vec![1.0, 2.0]).into(),
        Series::new("GeneB".into(), vec![0.0, 5.0]).into(),
    ])
    .unwrap()
}

#[rstest]
fn test_default_session_id() {
    let dir = tempfile::tempdir().unwrap();
    let dm = DataManager::new(Some(dir.path().to_path_buf())).unwrap();
    let configurator = AgentConfigurator::with_lookup(None, None, |_| None).unwrap();
    let client = AgentClient::new(
        dm,
        Box::new(EchoBackend {
            fail: false,
            seen: Seen::default(),
        }),
        &configurator,
        ClientOptions::default(),
    )
    .unwrap();
    assert!(client.session_id().starts_with("session_"));
    assert_eq!(client.session_id().len(), "session_20240101_120000".len());
    assert_eq!(client.workspace_path(), dir.path());
    assert!(client.metadata().contains_key("created_at"));
}

#[rstest]
fn test_query_records_history(mut fixture: Fixture) {
    let result = fixture.client.query("hello");
    assert!(result.success);
    assert_eq!(result.response, "echo: hello");
    assert_eq!(result.session_id, "session_test");
    assert!(!result.has_data);
    assert!(result.plots.is_empty());

    fixture.client.query("again");
    let history = fixture.client.conversation_history();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[3].content, "echo: again");

    let seen = fixture.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].messages.len(), 3);
    assert!(seen[0].system.contains("supervisor"));
    assert!(seen[0].system.contains("No data loaded"));
}

#[rstest]
fn test_query_attaches_plots(mut fixture: Fixture) {
    fixture
        .client
        .data_manager_mut()
        .set_data(small_frame(), Metadata::new())
        .unwrap();
    fixture
        .client
        .data_manager_mut()
        .add_plot(
            Plot::histogram(&[1.0, 2.0], "Counts", "count"),
            None,
            Some("test"),
        )
        .unwrap();

    let result = fixture.client.query("what is loaded?");
    assert!(result.has_data);
    assert_eq!(result.plots.len(), 1);
    let seen = fixture.seen.lock().unwrap();
    assert!(seen[0].system.contains("GeneA"));
}

#[test]
fn test_query_failure() {
    let mut fixture = make_client(true);
    let result = fixture.client.query("hello");
    assert!(!result.success);
    assert_eq!(result.response, "I encountered an error: backend offline");
    assert_eq!(result.error.as_deref(), Some("backend offline"));
    // The question stays in the history, no reply is recorded.
    assert_eq!(fixture.client.conversation_history().len(), 1);
}

#[rstest]
fn test_reasoning_flag_changes_prompt(fixture: Fixture) {
    assert!(fixture.client.system_prompt().contains("step by step"));

    let dir = tempfile::tempdir().unwrap();
    let dm = DataManager::new(Some(dir.path().to_path_buf())).unwrap();
    let configurator = AgentConfigurator::with_lookup(None, None, |_| None).unwrap();
    let terse = AgentClient::new(
        dm,
        Box::new(EchoBackend {
            fail: false,
            seen: Seen::default(),
        }),
        &configurator,
        ClientOptions {
            enable_reasoning: false,
            ..Default::default()
        },
    )
    .unwrap();
    assert!(!terse.system_prompt().contains("step by step"));
}

#[rstest]
fn test_read_write_files(fixture: Fixture) {
    let client = &fixture.client;
    let written = client.write_file("notes/todo.txt", "cluster the cells").unwrap();
    assert!(written.starts_with(fixture.dir.path()));
    assert_eq!(client.read_file("notes/todo.txt").unwrap(), "cluster the cells");

    fs::write(client.data_manager().data_dir().join("Counts.CSV"), "a,b\n1,2\n").unwrap();
    assert_eq!(client.read_file("Counts.CSV").unwrap(), "a,b\n1,2\n");
    // Case-insensitive fallback.
    assert_eq!(client.read_file("counts.csv").unwrap(), "a,b\n1,2\n");

    let absolute = written.to_string_lossy().to_string();
    assert_eq!(client.read_file(&absolute).unwrap(), "cluster the cells");

    assert!(client.read_file("missing.txt").is_err());
}

#[rstest]
fn test_list_workspace_files(fixture: Fixture) {
    let client = &fixture.client;
    client.write_file("a.txt", "1").unwrap();
    client.write_file("b.txt", "22").unwrap();
    client.write_file("c.json", "{}").unwrap();

    let mut names = client
        .list_workspace_files("*.txt")
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect::<Vec<_>>();
    names.sort();
    assert_eq!(names, vec!["a.txt", "b.txt"]);

    // Directories are not listed.
    let all = client.list_workspace_files("*").unwrap();
    assert!(all.iter().all(|r| r.path.is_file()));
    assert_eq!(all.len(), 3);
}

#[rstest]
fn test_status_and_reset(mut fixture: Fixture) {
    fixture.client.query("hello");
    let status = fixture.client.status();
    assert_eq!(status.message_count, 2);
    assert_eq!(status.backend, "echo");
    assert!(status.reasoning_enabled);
    assert!(status.data_summary.is_none());

    fixture
        .client
        .data_manager_mut()
        .set_data(small_frame(), Metadata::new())
        .unwrap();
    let logged = fixture.client.data_manager().history().recent_log(10).len();
    assert!(logged > 0);

    fixture.client.reset();
    assert!(fixture.client.conversation_history().is_empty());
    assert!(fixture.client.metadata().contains_key("reset_at"));
    // Only the conversation is cleared; the processing log belongs to the
    // workspace data.
    assert_eq!(fixture.client.data_manager().history().recent_log(10).len(), logged);
    assert!(fixture.client.status().has_data);
}

#[rstest]
fn test_export_session_without_data(mut fixture: Fixture) {
    fixture.client.query("hello");
    let path = fixture.client.export_session(None).unwrap();
    assert_eq!(path.file_name().unwrap(), "session_test.json");

    let exported: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(exported["session_id"], "session_test");
    assert_eq!(exported["conversation"][0]["role"], "user");
    assert_eq!(exported["conversation"][1]["content"], "echo: hello");
}

#[rstest]
fn test_export_session_with_data(mut fixture: Fixture) {
    fixture
        .client
        .data_manager_mut()
        .set_data(small_frame(), Metadata::new())
        .unwrap();
    let path = fixture.client.export_session(None).unwrap();
    assert_eq!(path.extension().unwrap(), "zip");
    assert!(path.starts_with(fixture.client.data_manager().exports_dir()));
}

#[rstest]
fn test_export_session_falls_back(fixture: Fixture) {
    let target = fixture.dir.path().join("no_such_dir").join("out.json");
    let path = fixture.client.export_session(Some(&target)).unwrap();
    assert_eq!(path.file_name().unwrap(), "session_test_basic.json");
    let exported: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert!(exported["error"].as_str().unwrap().contains("writing"));
}
