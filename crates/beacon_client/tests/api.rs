use std::time::Duration;

use pretty_assertions::assert_eq;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use beacon_client::{ApiClient, ApiSettings, ErrorKind, JobStatusKindDto, RoleDto};

fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(ApiSettings::new(server.uri())).expect("client")
}

#[tokio::test]
async fn send_message_returns_job_handle_and_echoed_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/conversations/conv-1/messages"))
        .and(body_json(serde_json::json!({
            "id": "local-1",
            "text": "what changed this week?",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "jobId": "j1",
            "message": {
                "id": "local-1",
                "role": "USER",
                "content": "what changed this week?",
                "createdAt": "2026-08-01T12:00:00Z",
            },
        })))
        .mount(&server)
        .await;

    let response = client(&server)
        .send_message("conv-1", "local-1", "what changed this week?")
        .await
        .expect("send ok");

    assert_eq!(response.job_id, "j1");
    assert_eq!(response.message.id, "local-1");
    assert_eq!(response.message.role, RoleDto::User);
}

#[tokio::test]
async fn job_status_decodes_each_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/j1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "running" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/j2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "failed",
            "error": "model overloaded",
        })))
        .mount(&server)
        .await;

    let api = client(&server);
    let running = api.job_status("j1").await.expect("status ok");
    assert_eq!(running.status, JobStatusKindDto::Running);
    assert_eq!(running.error, None);

    let failed = api.job_status("j2").await.expect("status ok");
    assert_eq!(failed.status, JobStatusKindDto::Failed);
    assert_eq!(failed.error.as_deref(), Some("model overloaded"));
}

#[tokio::test]
async fn list_messages_decodes_the_full_history() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/conversations/conv-1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "id": "u1",
                "role": "USER",
                "content": "hello",
                "createdAt": "2026-08-01T12:00:00Z",
            },
            {
                "id": "a1",
                "role": "ASSISTANT",
                "content": "hi there",
                "sources": ["https://docs.example/a"],
                "createdAt": "2026-08-01T12:00:05Z",
            },
        ])))
        .mount(&server)
        .await;

    let messages = client(&server)
        .list_messages("conv-1")
        .await
        .expect("list ok");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].role, RoleDto::Assistant);
    assert_eq!(messages[1].sources, vec!["https://docs.example/a"]);
}

#[tokio::test]
async fn connect_returns_the_authorize_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/orgs/org-1/integrations/git-forge/connect"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "authorizeUrl": "https://provider.example/authorize?state=xyz",
        })))
        .mount(&server)
        .await;

    let url = client(&server)
        .initiate_first_phase("org-1", "git-forge")
        .await
        .expect("connect ok");
    assert_eq!(url, "https://provider.example/authorize?state=xyz");
}

#[tokio::test]
async fn install_forwards_force_new() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/orgs/org-1/integrations/git-forge/install"))
        .and(body_json(serde_json::json!({ "forceNew": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "installUrl": "https://provider.example/install",
        })))
        .mount(&server)
        .await;

    let url = client(&server)
        .initiate_second_phase("org-1", "git-forge", true)
        .await
        .expect("install ok");
    assert_eq!(url, "https://provider.example/install");
}

#[tokio::test]
async fn retry_job_accepts_an_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/jobs/j1/retry"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    client(&server).retry_job("j1").await.expect("retry ok");
}

#[tokio::test]
async fn http_failure_maps_to_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client(&server).job_status("missing").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Http(404));
}

#[tokio::test]
async fn slow_response_maps_to_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_json(serde_json::json!({ "status": "pending" })),
        )
        .mount(&server)
        .await;

    let mut settings = ApiSettings::new(server.uri());
    settings.request_timeout = Duration::from_millis(50);
    let api = ApiClient::new(settings).expect("client");

    let err = api.job_status("slow").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
}

#[tokio::test]
async fn malformed_body_maps_to_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/weird"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("not json", "application/json"),
        )
        .mount(&server)
        .await;

    let err = client(&server).job_status("weird").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Decode);
}
