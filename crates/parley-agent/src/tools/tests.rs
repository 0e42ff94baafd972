//! Tests for the tool registry, agents file and command client.

use super::*;
use serde_json::json;

struct Echo;

#[async_trait]
impl ToolClient for Echo {
    async fn exec_tool(&self, name: &str, args: &Map<String, Value>) -> Result<String> {
        Ok(format!("{}:{}", name, Value::Object(args.clone())))
    }
}

fn def(name: &str) -> ToolDefinition {
    ToolDefinition::function(name, "test tool", json!({"type": "object"}))
}

#[tokio::test]
async fn test_static_registry_resolves_registered_tools() {
    let registry = StaticToolRegistry::new()
        .with(def("b_tool"), Arc::new(Echo))
        .with(def("a_tool"), Arc::new(Echo));

    assert_eq!(registry.len(), 2);
    let names: Vec<String> = registry
        .definitions()
        .iter()
        .map(|d| d.name().to_string())
        .collect();
    assert_eq!(names, vec!["a_tool", "b_tool"]);

    let client = registry.resolve_tool_client("a_tool").unwrap();
    let mut args = Map::new();
    args.insert("x".into(), json!(1));
    assert_eq!(client.exec_tool("a_tool", &args).await.unwrap(), r#"a_tool:{"x":1}"#);

    let err = registry.resolve_tool_client("missing").err().unwrap();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_catalog_describe_is_sorted() {
    let catalog = AgentCatalog::new()
        .with(AgentInfo {
            name: "weather".into(),
            description: "forecasts".into(),
            tools: vec![def("get_weather")],
        })
        .with(AgentInfo {
            name: "files".into(),
            description: "file access".into(),
            tools: vec![],
        });
    assert_eq!(catalog.describe(), "- files: file access\n- weather: forecasts");
    assert_eq!(catalog.get("weather").unwrap().tool_names(), vec!["get_weather"]);
    assert!(catalog.get("nope").is_none());
}

const AGENTS_YAML: &str = r#"
prompts:
  route: "pick one of {{AGENTS}} for {{USER_TASK}}"
agents:
  - name: weather
    description: Looks up current weather
    tools:
      - name: get_weather
        description: Current weather for a city
        parameters:
          type: object
          properties:
            city: { type: string }
          required: [city]
        command: ["sh", "-c", "cat"]
        workdir: scripts
  - name: clock
    description: Tells the time
    tools:
      - name: get_time
        command: ["date"]
"#;

#[test]
fn test_agents_file_parse_and_build() {
    let file = AgentsFile::parse(AGENTS_YAML).unwrap();
    assert_eq!(file.agents.len(), 2);
    assert_eq!(
        file.prompts.route.as_deref(),
        Some("pick one of {{AGENTS}} for {{USER_TASK}}")
    );
    assert!(file.prompts.plan.is_none());

    let weather = &file.agents[0].tools[0];
    assert_eq!(weather.parameters["required"], json!(["city"]));
    let clock = &file.agents[1].tools[0];
    assert_eq!(clock.parameters["type"], "object");

    let (registry, catalog) = file.build().unwrap();
    assert!(registry.contains("get_weather"));
    assert!(registry.contains("get_time"));
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.get("clock").unwrap().tool_names(), vec!["get_time"]);
}

#[test]
fn test_agents_file_rejects_tool_without_command() {
    let yaml = r#"
agents:
  - name: broken
    tools:
      - name: t
        command: []
"#;
    let err = AgentsFile::parse(yaml).unwrap_err();
    assert!(err.to_string().contains("has no command"));
}

#[test]
fn test_agents_file_load_resolves_relative_workdir() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("agents.yaml");
    std::fs::write(&path, AGENTS_YAML).unwrap();

    let file = AgentsFile::load(&path).unwrap();
    let workdir = file.agents[0].tools[0].workdir.clone().unwrap();
    assert_eq!(
        std::path::PathBuf::from(workdir),
        dir.path().join("scripts")
    );

    assert!(AgentsFile::load(&dir.path().join("missing.yaml")).is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_client_pipes_arguments() {
    let client = CommandToolClient::new("sh").with_args(["-c".to_string(), "cat".to_string()]);
    let mut args = Map::new();
    args.insert("city".into(), json!("Paris"));
    let out = client.exec_tool("get_weather", &args).await.unwrap();
    assert_eq!(out, r#"{"city":"Paris"}"#);
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_client_exports_tool_name() {
    let client = CommandToolClient::from_argv(&[
        "sh".to_string(),
        "-c".to_string(),
        "echo $PARLEY_TOOL_NAME".to_string(),
    ])
    .unwrap();
    let out = client.exec_tool("get_time", &Map::new()).await.unwrap();
    assert_eq!(out, "get_time");
}

#[cfg(unix)]
#[tokio::test]
async fn test_command_client_non_zero_exit_fails() {
    let client = CommandToolClient::new("sh")
        .with_args(["-c".to_string(), "echo nope >&2; exit 3".to_string()]);
    let err = client.exec_tool("t", &Map::new()).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("exit 3"), "{}", msg);
    assert!(msg.contains("nope"), "{}", msg);
}

#[test]
fn test_from_argv_rejects_empty_command() {
    assert!(CommandToolClient::from_argv(&[]).is_err());
}
