mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{math_backend, one_string, tool, two_ints, FakeBackend};
use serde_json::json;
use toolrelay::{
    BackendError, ErrorKind, ToolBackend, ToolCallRequest, ToolCallResult, ToolInvoker,
    ToolPayload, ToolRegistry,
};

const TIMEOUT: Duration = Duration::from_secs(2);

async fn invoker_for(backends: Vec<Arc<dyn ToolBackend>>) -> ToolInvoker {
    let registry = ToolRegistry::discover(&backends, TIMEOUT).await.unwrap();
    ToolInvoker::new(Arc::new(registry))
}

#[tokio::test]
async fn test_success_payload_is_verbatim() {
    let weather = Arc::new(FakeBackend::new(
        "weather",
        vec![tool("get_weather", one_string("location"))],
        |_, args| Ok(json!(format!("Weather in {}: 18°C, clear", args["location"].as_str().unwrap()))),
    ));
    let invoker = invoker_for(vec![weather.clone()]).await;

    let result = invoker
        .invoke(
            &ToolCallRequest::new("get_weather", json!({"location": "Paris"})),
            TIMEOUT,
        )
        .await;

    assert_eq!(
        result,
        ToolCallResult::Success(ToolPayload::Text("Weather in Paris: 18°C, clear".into()))
    );
    assert_eq!(weather.calls(), 1);
}

#[tokio::test]
async fn test_arguments_as_json_text_are_coerced() {
    let math = math_backend();
    let invoker = invoker_for(vec![math.clone()]).await;

    let result = invoker
        .invoke(
            &ToolCallRequest::new("add", json!(r#"{"a": "3", "b": 5}"#)),
            TIMEOUT,
        )
        .await;

    assert_eq!(result, ToolCallResult::Success(ToolPayload::Structured(json!(8))));
    assert_eq!(math.seen(), vec![("add".to_string(), json!({"a": 3, "b": 5}))]);
}

#[tokio::test]
async fn test_missing_argument_never_reaches_backend() {
    let math = math_backend();
    let invoker = invoker_for(vec![math.clone()]).await;

    let result = invoker
        .invoke(&ToolCallRequest::new("add", json!({"a": 3})), TIMEOUT)
        .await;

    match result {
        ToolCallResult::Failure { kind, message } => {
            assert_eq!(kind, ErrorKind::Validation);
            assert!(message.contains("'b'"), "{}", message);
        }
        other => panic!("expected validation failure, got {:?}", other),
    }
    assert_eq!(math.calls(), 0);
}

#[tokio::test]
async fn test_unknown_tool_is_not_found() {
    let invoker = invoker_for(vec![math_backend()]).await;
    let result = invoker
        .invoke(&ToolCallRequest::new("brave_search", json!({})), TIMEOUT)
        .await;
    assert!(matches!(
        result,
        ToolCallResult::Failure {
            kind: ErrorKind::NotFound,
            ..
        }
    ));
}

#[tokio::test]
async fn test_domain_error_is_not_retried() {
    let divide = Arc::new(FakeBackend::new(
        "math",
        vec![tool("divide", two_ints())],
        |_, _| Err(BackendError::Domain("Division by zero is not allowed.".into())),
    ));
    let invoker = invoker_for(vec![divide.clone()]).await;

    let result = invoker
        .invoke(&ToolCallRequest::new("divide", json!({"a": 1, "b": 0})), TIMEOUT)
        .await;

    assert_eq!(
        result,
        ToolCallResult::failure(ErrorKind::Domain, "Division by zero is not allowed.")
    );
    assert_eq!(divide.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_retries_once_then_unavailable() {
    let slow = Arc::new(
        FakeBackend::new(
            "search",
            vec![tool("web_search", one_string("query"))],
            |_, _| Ok(json!("too late")),
        )
        .with_delay(Duration::from_secs(60)),
    );
    let invoker = invoker_for(vec![slow.clone()]).await;

    let result = invoker
        .invoke(
            &ToolCallRequest::new("web_search", json!({"query": "rust"})),
            Duration::from_millis(50),
        )
        .await;

    assert!(matches!(
        result,
        ToolCallResult::Failure {
            kind: ErrorKind::BackendUnavailable,
            ..
        }
    ));
    assert_eq!(slow.calls(), 2);
}

#[tokio::test]
async fn test_transport_error_recovers_on_retry() {
    let attempts = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let flaky = Arc::new(FakeBackend::new(
        "math",
        vec![tool("add", two_ints())],
        move |_, _| {
            if counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst) == 0 {
                Err(BackendError::Transport("connection reset".into()))
            } else {
                Ok(json!(8))
            }
        },
    ));
    let invoker = invoker_for(vec![flaky.clone()]).await;

    let result = invoker
        .invoke(&ToolCallRequest::new("add", json!({"a": 3, "b": 5})), TIMEOUT)
        .await;

    assert!(result.is_success());
    assert_eq!(flaky.calls(), 2);
}
