//! HTTP behaviour of the Nexus client against a mock server.

use httpmock::prelude::*;
use qnexus::{
    CreateAnnotations, Filter, JobStatusEnum, NexusClient, NexusConfig, NexusError, QuotaName,
    RemoteRetryStrategy, TokenKind, TokenStore,
};
use serde_json::{Value, json};
use uuid::Uuid;

// ============================================================================
// Test helpers
// ============================================================================

fn client_for(server: &MockServer) -> NexusClient {
    let config = NexusConfig::default().with_urls(server.base_url(), "ws://127.0.0.1:1");
    NexusClient::with_config_and_tokens(config, TokenStore::in_memory()).expect("client")
}

fn logged_in_client(server: &MockServer) -> NexusClient {
    let client = client_for(server);
    client.tokens().write(TokenKind::Access, "fresh").unwrap();
    client.tokens().write(TokenKind::Refresh, "refresh-tok").unwrap();
    client
}

fn project_json(id: Uuid, name: &str) -> Value {
    json!({
        "id": id.to_string(),
        "type": "project",
        "attributes": {
            "name": name,
            "description": null,
            "properties": {},
            "archived": false,
            "contents_modified": "2024-05-01T12:00:00Z",
            "timestamps": {"created": "2024-05-01T12:00:00Z", "modified": "2024-05-01T12:00:00Z"}
        }
    })
}

fn job_json(id: Uuid, project: Uuid, status: &str) -> Value {
    json!({
        "id": id.to_string(),
        "type": "job",
        "attributes": {
            "name": format!("job-{status}"),
            "job_type": "execute",
            "status": {"status": status, "message": "m"},
            "timestamps": {"created": "2024-05-01T12:00:00Z", "modified": "2024-05-01T12:00:00Z"}
        },
        "relationships": {"project": {"data": {"id": project.to_string(), "type": "project"}}}
    })
}

// ============================================================================
// Session handling
// ============================================================================

#[tokio::test]
async fn test_expired_access_token_is_refreshed_once() {
    let server = MockServer::start_async().await;
    let id = Uuid::new_v4();
    let path = format!("/api/projects/v1beta/{id}");

    let rejected = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(path.as_str())
                .header("cookie", "myqos_id=stale; myqos_oat=refresh-tok");
            then.status(401);
        })
        .await;
    let refresh = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/tokens/refresh")
                .header("cookie", "myqos_oat=refresh-tok");
            then.status(200)
                .header("set-cookie", "myqos_id=fresh; Path=/; HttpOnly; Secure");
        })
        .await;
    let accepted = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(path.as_str())
                .header("cookie", "myqos_id=fresh; myqos_oat=refresh-tok");
            then.status(200).json_body(json!({"data": project_json(id, "alpha")}));
        })
        .await;

    let client = client_for(&server);
    client.tokens().write(TokenKind::Access, "stale").unwrap();
    client.tokens().write(TokenKind::Refresh, "refresh-tok").unwrap();

    let project = client.projects().get_by_id(id).await.unwrap();
    assert_eq!(project.annotations.name.as_deref(), Some("alpha"));
    assert_eq!(client.tokens().read(TokenKind::Access).as_deref(), Some("fresh"));

    rejected.assert_hits_async(1).await;
    refresh.assert_hits_async(1).await;
    accepted.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_rejected_refresh_is_authentication_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/users/v1beta2/me");
            then.status(401);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/auth/tokens/refresh");
            then.status(401);
        })
        .await;

    let err = logged_in_client(&server).users().get_self().await.unwrap_err();
    assert!(err.is_authentication());
    assert!(err.to_string().contains("qnx login"));
}

#[tokio::test]
async fn test_missing_refresh_token_is_authentication_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/users/v1beta2/me");
            then.status(401);
        })
        .await;

    let err = client_for(&server).users().get_self().await.unwrap_err();
    assert!(err.is_authentication());
}

#[tokio::test]
async fn test_sunset_header_does_not_fail_request() {
    let server = MockServer::start_async().await;
    let id = Uuid::new_v4();
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/users/v1beta2/me");
            then.status(200)
                .header("sunset", "Sat, 01 Nov 2025 00:00:00 GMT")
                .json_body(json!({"data": {"id": id.to_string(), "attributes": {"display_name": "Ada"}}}));
        })
        .await;

    let user = logged_in_client(&server).users().get_self().await.unwrap();
    assert_eq!(user.id, id);
    assert_eq!(user.display_name.as_deref(), Some("Ada"));
}

// ============================================================================
// Pagination and counts
// ============================================================================

#[tokio::test]
async fn test_project_pages_are_walked_in_order() {
    let server = MockServer::start_async().await;
    let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();

    let first = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/projects/v1beta")
                .query_param("page[number]", "0")
                .query_param("filter[archived]", "false");
            then.status(200).json_body(json!({
                "data": [project_json(ids[0], "p0"), project_json(ids[1], "p1")],
                "meta": {"total_pages": 2}
            }));
        })
        .await;
    let second = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/projects/v1beta")
                .query_param("page[number]", "1");
            then.status(200).json_body(json!({
                "data": [project_json(ids[2], "p2")],
                "meta": {"total_pages": 2}
            }));
        })
        .await;

    let projects = logged_in_client(&server)
        .projects()
        .get_all(Filter::new())
        .into_list()
        .await
        .unwrap();
    let got: Vec<Uuid> = projects.iter().map(|p| p.id).collect();
    assert_eq!(got, ids);

    first.assert_hits_async(1).await;
    second.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_count_uses_meta_endpoint() {
    let server = MockServer::start_async().await;
    let count = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/jobs/v1beta/meta/count")
                .query_param("filter[name]", "vqe");
            then.status(200).json_body(json!({"count": 7}));
        })
        .await;

    let iter = logged_in_client(&server)
        .jobs()
        .get_all(Filter::new().name_like("vqe").page_number(3));
    assert_eq!(iter.count().await.unwrap(), 7);
    count.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_get_requires_unique_match() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/projects/v1beta/meta/count");
            then.status(200).json_body(json!({"count": 2}));
        })
        .await;

    let err = logged_in_client(&server)
        .projects()
        .get(Filter::new().name_like("dup"))
        .await
        .unwrap_err();
    assert!(matches!(err, NexusError::NoUniqueMatch { count: 2, .. }));
}

#[tokio::test]
async fn test_get_or_create_creates_when_absent() {
    let server = MockServer::start_async().await;
    let id = Uuid::new_v4();
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/projects/v1beta/meta/count");
            then.status(200).json_body(json!({"count": 0}));
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/projects/v1beta")
                .json_body_partial(r#"{"data": {"type": "project", "attributes": {"name": "fresh"}}}"#);
            then.status(201).json_body(json!({"data": project_json(id, "fresh")}));
        })
        .await;

    let project = logged_in_client(&server)
        .projects()
        .get_or_create(CreateAnnotations::new("fresh"))
        .await
        .unwrap();
    assert_eq!(project.id, id);
    create.assert_hits_async(1).await;
}

// ============================================================================
// Status mapping
// ============================================================================

#[tokio::test]
async fn test_fetch_by_id_not_found_is_zero_matches() {
    let server = MockServer::start_async().await;
    let id = Uuid::new_v4();
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/jobs/v1beta/{id}"));
            then.status(404);
        })
        .await;

    let err = logged_in_client(&server).jobs().get_by_id(id).await.unwrap_err();
    assert!(matches!(err, NexusError::ZeroMatches(r) if r == "job"));
}

#[tokio::test]
async fn test_create_failure_keeps_status_and_message() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/projects/v1beta");
            then.status(409).body("project name already in use");
        })
        .await;

    let err = logged_in_client(&server)
        .projects()
        .create(CreateAnnotations::new("taken"))
        .await
        .unwrap_err();
    match err {
        NexusError::ResourceCreateFailed { status, message } => {
            assert_eq!(status, 409);
            assert!(message.contains("already in use"));
        }
        other => panic!("expected ResourceCreateFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_job_status_and_cancel() {
    let server = MockServer::start_async().await;
    let id = Uuid::new_v4();
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/jobs/v1beta/{id}/attributes/status"));
            then.status(200).json_body(json!({
                "status": "QUEUED",
                "message": "waiting",
                "queue_position": 4,
                "cost": 1.23456
            }));
        })
        .await;
    let cancel = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/api/jobs/v1beta/{id}/rpc/cancel"))
                .json_body(json!({}));
            then.status(202);
        })
        .await;

    let client = logged_in_client(&server);
    let status = client.jobs().status(id).await.unwrap();
    assert_eq!(status.status, JobStatusEnum::Queued);
    assert_eq!(status.queue_position, Some(4));
    assert_eq!(status.cost, Some(1.23));

    client.jobs().cancel(id).await.unwrap();
    cancel.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_retry_submission_body() {
    let server = MockServer::start_async().await;
    let id = Uuid::new_v4();
    let retry = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/api/jobs/v1beta/{id}/rpc/retry"))
                .json_body(json!({
                    "remote_retry_strategy": "FORCE_RESUBMIT",
                    "retry_status": ["ERROR", "CANCELLED"]
                }));
            then.status(202);
        })
        .await;

    logged_in_client(&server)
        .jobs()
        .retry_submission(
            id,
            Some(&[JobStatusEnum::Error, JobStatusEnum::Cancelled]),
            RemoteRetryStrategy::ForceResubmit,
            None,
        )
        .await
        .unwrap();
    retry.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_project_summary_counts_by_status() {
    let server = MockServer::start_async().await;
    let project = Uuid::new_v4();
    let statuses = ["COMPLETED", "COMPLETED", "ERROR", "QUEUED", "RUNNING", "CANCELLED"];
    let data: Vec<Value> = statuses
        .iter()
        .map(|s| job_json(Uuid::new_v4(), project, s))
        .collect();
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/jobs/v1beta")
                .query_param("filter[project][id]", project.to_string());
            then.status(200).json_body(json!({
                "data": data,
                "included": [project_json(project, "summary")],
                "meta": {"total_pages": 1}
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path(format!("/api/projects/v1beta/{project}"));
            then.status(200).json_body(json!({"data": project_json(project, "summary")}));
        })
        .await;

    let client = logged_in_client(&server);
    let project_ref = client.projects().get_by_id(project).await.unwrap();
    let summary = client.projects().summarize(&project_ref).await.unwrap();
    assert_eq!(summary.project, "summary");
    assert_eq!(summary.total_jobs, 6);
    assert_eq!(summary.completed_jobs, 2);
    assert_eq!(summary.errored_jobs, 1);
    assert_eq!(summary.pending_jobs, 2);
    assert_eq!(summary.cancelled_jobs, 1);
}

#[tokio::test]
async fn test_quota_guard() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/quotas/v1beta/guard")
                .query_param("name", "simulation");
            then.status(200);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/quotas/v1beta/guard")
                .query_param("name", "compilation");
            then.status(403);
        })
        .await;

    let quotas = logged_in_client(&server).quotas();
    assert!(quotas.check_quota(QuotaName::Simulation).await.unwrap());
    assert!(!quotas.check_quota(QuotaName::Compilation).await.unwrap());
}

#[tokio::test]
async fn test_team_lookup() {
    let server = MockServer::start_async().await;
    let id = Uuid::new_v4();
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v5/user/teams")
                .query_param("name", "qa");
            then.status(200).json_body(json!([
                {"id": id.to_string(), "team_name": "qa", "description": "Quality"}
            ]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/v5/user/teams")
                .query_param("name", "ghost");
            then.status(404);
        })
        .await;

    let teams = logged_in_client(&server).teams();
    let team = teams.get("qa").await.unwrap();
    assert_eq!(team.id, id);
    assert_eq!(team.description.as_deref(), Some("Quality"));
    assert!(matches!(
        teams.get("ghost").await,
        Err(NexusError::ZeroMatches(_))
    ));
}

// ============================================================================
// Login flows
// ============================================================================

#[tokio::test]
async fn test_credential_login_with_mfa() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/login")
                .json_body(json!({"email": "ada@example.com", "password": "pw"}));
            then.status(200)
                .json_body(json!({"redirect_uri": "/auth/mfa_challenge/abc"}));
        })
        .await;
    let mfa = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/mfa_challenge")
                .json_body(json!({"email": "ada@example.com", "code": "123456"}));
            then.status(200)
                .header("set-cookie", "myqos_oat=refresh-1; Path=/; HttpOnly")
                .header("set-cookie", "myqos_id=access-1; Path=/; HttpOnly");
        })
        .await;

    let client = client_for(&server);
    client
        .login_with_credentials("ada@example.com", "pw", || Ok("123456".into()))
        .await
        .unwrap();
    mfa.assert_hits_async(1).await;
    assert_eq!(client.tokens().read(TokenKind::Refresh).as_deref(), Some("refresh-1"));
    assert_eq!(client.tokens().read(TokenKind::Access).as_deref(), Some("access-1"));

    client.logout().unwrap();
    assert!(!client.tokens().is_logged_in());
}

#[tokio::test]
async fn test_credential_login_blocked_on_terms() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/auth/login");
            then.status(200)
                .json_body(json!({"redirect_uri": "/auth/terms_challenge"}));
        })
        .await;

    let err = client_for(&server)
        .login_with_credentials("ada@example.com", "pw", || panic!("no MFA expected"))
        .await
        .unwrap_err();
    assert!(err.is_authentication());
    assert!(err.to_string().contains("Terms and conditions"));
}

#[tokio::test]
async fn test_credential_login_without_cookies_fails() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/auth/login");
            then.status(200).json_body(json!({}));
        })
        .await;

    let err = client_for(&server)
        .login_with_credentials("ada@example.com", "pw", || Ok(String::new()))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("cookies missing"));
}

#[tokio::test]
async fn test_device_login_stores_tokens() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/device/device_authorization")
                .body_contains("client_id=scales");
            then.status(200).json_body(json!({
                "user_code": "ABCD-EFGH",
                "device_code": "dev-123",
                "verification_uri_complete": "https://nexus.example/device?code=ABCD-EFGH",
                "expires_in": 60,
                "interval": 1
            }));
        })
        .await;
    let token = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/device/token")
                .body_contains("device_code=dev-123");
            then.status(200).json_body(json!({
                "access_token": "device-access",
                "refresh_token": "device-refresh",
                "email": "ada@example.com"
            }));
        })
        .await;

    let client = client_for(&server);
    let auth = client.request_device_authorization().await.unwrap();
    assert_eq!(auth.user_code, "ABCD-EFGH");

    let email = client.complete_device_login(&auth).await.unwrap();
    assert_eq!(email.as_deref(), Some("ada@example.com"));
    assert_eq!(
        client.tokens().read(TokenKind::Access).as_deref(),
        Some("device-access")
    );
    token.assert_hits_async(1).await;
}
