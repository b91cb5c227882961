use super::*;
use crate::permissions::PolicyConfig;
use serde_json::json;

struct Fixture {
    provider: Provider,
    permissions: PermissionManager,
    agents: AgentRegistry,
    config: Config,
    root: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        Self {
            provider: Provider::scripted(vec![]),
            permissions: PermissionManager::new(PolicyConfig::default()),
            agents: AgentRegistry::with_builtins(),
            config: Config::default(),
            root: PathBuf::from("."),
        }
    }

    fn ctx<'a>(&'a self, tools: &'a ToolRegistry) -> ToolContext<'a> {
        ToolContext {
            provider: &self.provider,
            permissions: &self.permissions,
            agents: &self.agents,
            tools,
            config: &self.config,
            workspace_root: &self.root,
        }
    }
}

#[tokio::test]
async fn registry_advertises_function_schemas() {
    let registry = ToolRegistry::with_builtins(PathBuf::from("."));
    assert!(!registry.is_empty());
    let schemas = registry.list_schemas();
    assert_eq!(schemas.len(), registry.len());
    for schema in &schemas {
        assert_eq!(schema["type"], json!("function"));
        assert!(schema["function"]["name"].is_string());
        assert!(schema["function"]["parameters"].is_object());
    }
}

#[tokio::test]
async fn schemas_for_filters_by_allowed_names() {
    let registry = ToolRegistry::with_builtins(PathBuf::from("."));
    let filtered = registry.schemas_for(&["read_file".to_string(), "grep".to_string()]);
    assert_eq!(filtered.len(), 2);
    let empty = registry.schemas_for(&[]);
    assert!(empty.is_empty());
}

#[tokio::test]
async fn read_file_returns_structured_data() {
    let fixture = Fixture::new();
    let registry = ToolRegistry::with_builtins(PathBuf::from("."));
    let result = registry
        .execute("read_file", r#"{"path":"Cargo.toml"}"#, &fixture.ctx(&registry))
        .await;
    assert!(result.success);
    let data = result.data.unwrap();
    assert!(data["content"].as_str().unwrap().contains("[package]"));
    assert!(result.metadata.data_size_bytes > 0);
    assert!(!result.metadata.timestamp.is_empty());
}

#[tokio::test]
async fn unknown_tool_is_not_found() {
    let fixture = Fixture::new();
    let registry = ToolRegistry::with_builtins(PathBuf::from("."));
    let result = registry
        .execute("nonexistent_tool", "{}", &fixture.ctx(&registry))
        .await;
    assert!(!result.success);
    assert_eq!(result.error_type, ErrorKind::NotFound);
}

#[tokio::test]
async fn missing_required_argument_fails_validation() {
    let fixture = Fixture::new();
    let registry = ToolRegistry::with_builtins(PathBuf::from("."));
    let result = registry
        .execute("read_file", "{}", &fixture.ctx(&registry))
        .await;
    assert!(!result.success);
    assert_eq!(result.error_type, ErrorKind::ValidationFailed);
}

#[tokio::test]
async fn wrong_argument_type_fails_validation() {
    let registry = ToolRegistry::with_builtins(PathBuf::from("."));
    let err = registry
        .validate_args("read_file", r#"{"path":42}"#)
        .unwrap_err();
    assert!(err.contains("must be of type string"));
}

#[tokio::test]
async fn non_json_arguments_are_a_parse_error() {
    let fixture = Fixture::new();
    let registry = ToolRegistry::with_builtins(PathBuf::from("."));
    let result = registry
        .execute("read_file", "not json", &fixture.ctx(&registry))
        .await;
    assert_eq!(result.error_type, ErrorKind::ParseError);
}

#[tokio::test]
async fn glob_matches_source_files() {
    let fixture = Fixture::new();
    let registry = ToolRegistry::with_builtins(PathBuf::from("."));
    let result = registry
        .execute("glob", r#"{"pattern":"src/**/*.rs"}"#, &fixture.ctx(&registry))
        .await;
    assert!(result.success);
    let matches = result.data.unwrap()["matches"].as_array().unwrap().clone();
    assert!(matches.iter().any(|m| m.as_str().unwrap().contains("main.rs")));
}

#[tokio::test]
async fn grep_reports_invalid_regex() {
    let fixture = Fixture::new();
    let registry = ToolRegistry::with_builtins(PathBuf::from("."));
    let result = registry
        .execute("grep", r#"{"pattern":"[invalid"}"#, &fixture.ctx(&registry))
        .await;
    assert!(!result.success);
    assert_eq!(result.error_type, ErrorKind::ValidationFailed);
    assert!(result.error_message.unwrap().contains("Invalid regex"));
}

#[tokio::test]
async fn read_file_rejects_path_escape() {
    let fixture = Fixture::new();
    let registry = ToolRegistry::with_builtins(PathBuf::from("."));
    let result = registry
        .execute(
            "read_file",
            r#"{"path":"../../../etc/passwd"}"#,
            &fixture.ctx(&registry),
        )
        .await;
    assert!(!result.success);
}

#[tokio::test]
async fn todo_tool_assigns_ids_and_returns_the_list() {
    let fixture = Fixture::new();
    let registry = ToolRegistry::with_builtins(PathBuf::from("."));
    let result = registry
        .execute(
            "update_todos",
            r#"{"todos":[{"content":"first","status":"pending"},{"content":"second","status":"in_progress"}]}"#,
            &fixture.ctx(&registry),
        )
        .await;
    assert!(result.success);
    let todos = result.data.unwrap()["todos"].as_array().unwrap().clone();
    assert_eq!(todos.len(), 2);
    assert_eq!(todos[0]["id"], json!(1));
    assert_eq!(todos[1]["id"], json!(2));
}

#[tokio::test]
async fn run_agent_reports_unknown_agents() {
    let fixture = Fixture::new();
    let registry = ToolRegistry::with_builtins(PathBuf::from("."));
    let result = registry
        .execute(
            "run_agent",
            r#"{"agent":"nope","task":"do things"}"#,
            &fixture.ctx(&registry),
        )
        .await;
    assert!(!result.success);
    assert_eq!(result.error_type, ErrorKind::NotFound);
}

#[test]
fn wire_form_escapes_control_characters() {
    let result = ToolResult::failure(ErrorKind::IoError, "line one\nline \"two\"\tdone");
    let wire = result.to_wire();
    assert!(wire.contains(r#"\n"#));
    assert!(wire.contains(r#"\""#));
    assert!(wire.contains(r#"\t"#));
    // The wire form parses back losslessly.
    let parsed: ToolResult = serde_json::from_str(&wire).unwrap();
    assert_eq!(parsed.error_message.as_deref(), Some("line one\nline \"two\"\tdone"));
}

#[test]
fn wire_form_has_the_stable_field_set() {
    let result = ToolResult::ok(json!({"k":"v"}));
    let wire = result.to_wire();
    let parsed: serde_json::Value = serde_json::from_str(&wire).unwrap();
    assert_eq!(parsed["success"], json!(true));
    assert_eq!(parsed["error_type"], json!("none"));
    assert!(parsed["metadata"].get("execution_time_ms").is_some());
    assert!(parsed["metadata"].get("data_size_bytes").is_some());
    assert!(parsed["metadata"].get("timestamp").is_some());
}
