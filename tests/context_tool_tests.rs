use voxbridge::error::BridgeError;
use voxbridge::tools::{ContextRetrievalTool, Tool};

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn retrieves_context_scoped_to_the_meeting() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/context"))
        .and(query_param("query", "action items"))
        .and(query_param("meetingId", "meeting-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "context": "Previously agreed: ship the Q3 report by Friday."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tool = ContextRetrievalTool::new(server.uri(), "meeting-42");
    let result = tool
        .execute(&json!({ "query": "action items" }))
        .await
        .expect("retrieval should succeed");
    assert_eq!(result, "Previously agreed: ship the Q3 report by Friday.");
}

#[tokio::test]
async fn project_scope_adds_the_project_parameter() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/context"))
        .and(query_param("query", "budget"))
        .and(query_param("meetingId", "meeting-42"))
        .and(query_param("projectId", "project-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "context": "Budget was approved in the kickoff meeting."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tool =
        ContextRetrievalTool::new(server.uri(), "meeting-42").with_project_scope("project-7");
    let result = tool
        .execute(&json!({ "query": "budget" }))
        .await
        .expect("retrieval should succeed");
    assert_eq!(result, "Budget was approved in the kickoff meeting.");
}

#[tokio::test]
async fn missing_query_argument_is_an_execution_error() {
    let tool = ContextRetrievalTool::new("http://127.0.0.1:9", "meeting-42");
    let error = tool
        .execute(&json!({}))
        .await
        .expect_err("missing query should fail before any request");
    assert!(matches!(error, BridgeError::ToolExecution { .. }));
}

#[tokio::test]
async fn service_error_is_an_execution_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/context"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let tool = ContextRetrievalTool::new(server.uri(), "meeting-42");
    let error = tool
        .execute(&json!({ "query": "anything" }))
        .await
        .expect_err("bad gateway should fail the call");
    assert!(matches!(
        error,
        BridgeError::ToolExecution { ref name, .. } if name == "retrieve_context"
    ));
}
