mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{math_backend, one_string, tool, FakeBackend, UnreachableBackend};
use serde_json::json;
use toolrelay::{RelayError, ToolBackend, ToolRegistry};

const TIMEOUT: Duration = Duration::from_secs(2);

fn weather_backend(name: &str) -> Arc<FakeBackend> {
    Arc::new(FakeBackend::new(
        name,
        vec![tool("get_weather", one_string("location"))],
        |_, _| Ok(json!("sunny")),
    ))
}

#[tokio::test]
async fn test_discovery_merges_backends() {
    let backends: Vec<Arc<dyn ToolBackend>> = vec![math_backend(), weather_backend("weather")];
    let registry = ToolRegistry::discover(&backends, TIMEOUT).await.unwrap();

    assert_eq!(registry.len(), 3);
    let names: Vec<String> = registry.names().into_iter().collect();
    assert_eq!(names, vec!["add", "get_weather", "multiple"]);

    let weather = registry.lookup("get_weather").unwrap();
    assert_eq!(weather.backend.name(), "weather");
    assert!(weather.param("location").unwrap().required);
}

#[tokio::test]
async fn test_name_collision_names_both_backends() {
    let backends: Vec<Arc<dyn ToolBackend>> =
        vec![weather_backend("primary"), weather_backend("secondary")];
    let err = ToolRegistry::discover(&backends, TIMEOUT).await.unwrap_err();

    let message = err.to_string();
    assert!(matches!(err, RelayError::Discovery(_)));
    assert!(message.contains("get_weather"), "{}", message);
    assert!(message.contains("primary"), "{}", message);
    assert!(message.contains("secondary"), "{}", message);
}

#[tokio::test]
async fn test_unreachable_backend_fails_discovery() {
    let backends: Vec<Arc<dyn ToolBackend>> =
        vec![math_backend(), Arc::new(UnreachableBackend("remote".into()))];
    let err = ToolRegistry::discover(&backends, TIMEOUT).await.unwrap_err();
    assert!(err.to_string().contains("remote"));
}

#[tokio::test]
async fn test_malformed_schema_fails_discovery() {
    let broken = Arc::new(FakeBackend::new(
        "broken",
        vec![tool("lookup", json!({"type": "object", "properties": {"id": {"type": "uuid"}}}))],
        |_, _| Ok(json!(null)),
    ));
    let backends: Vec<Arc<dyn ToolBackend>> = vec![broken];
    let err = ToolRegistry::discover(&backends, TIMEOUT).await.unwrap_err();
    assert!(err.to_string().contains("malformed schema"));
}

#[tokio::test]
async fn test_missing_schema_means_no_parameters() {
    let ping = Arc::new(FakeBackend::new(
        "ping",
        vec![tool("ping", serde_json::Value::Null)],
        |_, _| Ok(json!("pong")),
    ));
    let backends: Vec<Arc<dyn ToolBackend>> = vec![ping];
    let registry = ToolRegistry::discover(&backends, TIMEOUT).await.unwrap();

    let spec = &registry.specs()[0];
    assert_eq!(spec.parameters["type"], "object");
    assert!(registry.lookup("ping").unwrap().params.is_empty());
}

#[tokio::test]
async fn test_lookup_unknown_tool() {
    let backends: Vec<Arc<dyn ToolBackend>> = vec![math_backend()];
    let registry = ToolRegistry::discover(&backends, TIMEOUT).await.unwrap();

    assert!(!registry.contains("brave_search"));
    assert!(matches!(
        registry.lookup("brave_search"),
        Err(RelayError::NotFound(name)) if name == "brave_search"
    ));
}
