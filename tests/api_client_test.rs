use std::sync::Arc;

use chrono::{TimeZone, Utc};
use futures::StreamExt;
use nudgebet::domain::models::{
    Credential, NudgeStatus, PlaceBetRequest, PushMessage, ResolveOutcome, WagerConfig,
};
use nudgebet::domain::ports::{BetBackend, NudgeBackend};
use nudgebet::infrastructure::api::{ApiClient, ApiClientConfig};
use nudgebet::infrastructure::{InMemoryTaskDirectory, SessionCredentials};
use nudgebet::services::WagerCoordinator;
use nudgebet::{ApiError, DomainError};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(ApiClientConfig {
        base_url: server.uri(),
        timeout_secs: 5,
        stream_path: "/NudgeEngine/subscribe".to_string(),
    })
    .unwrap()
}

fn token() -> Credential {
    Credential::new("secret-token")
}

fn nudge_json(id: &str, task: &str) -> serde_json::Value {
    json!({
        "_id": id,
        "task": task,
        "deliveryTime": "2024-01-01T10:00:00Z",
        "triggeredAt": "2024-01-01T10:00:05Z",
        "message": "Time to get going",
        "canceled": false
    })
}

#[tokio::test]
async fn test_ready_nudges_sends_token_and_parses_listing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/NudgeEngine/getReadyNudges"))
        .and(body_partial_json(json!({ "accessToken": "secret-token" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "nudges": [nudge_json("n1", "t1"), nudge_json("n2", "t2")] })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let nudges = client(&mock_server).ready_nudges(&token()).await.unwrap();

    assert_eq!(nudges.len(), 2);
    assert_eq!(nudges[0].id, "n1");
    assert!(nudges.iter().all(|n| n.is_presentable()));
}

#[tokio::test]
async fn test_bare_listing_is_accepted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/MicroBet/getExpiredBets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "_id": "b1",
            "task": "t1",
            "wager": 10,
            "deadline": "2024-01-01T00:00:00Z"
        }])))
        .mount(&mock_server)
        .await;

    let bets = client(&mock_server).expired_bets(&token()).await.unwrap();
    assert_eq!(bets.len(), 1);
    assert_eq!(bets[0].task, "t1");
    assert!(!bets[0].is_resolved());
}

#[tokio::test]
async fn test_resolve_bet_statuses() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/MicroBet/resolveBet"))
        .and(body_partial_json(json!({ "task": "t1", "accessToken": "secret-token" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status": "success", "reward": 20 })),
        )
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/MicroBet/resolveBet"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status": "already_resolved" })),
        )
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);
    let first = client.resolve_bet(&token(), "t1", Utc::now()).await.unwrap();
    let second = client.resolve_bet(&token(), "t1", Utc::now()).await.unwrap();

    assert_eq!(
        ResolveOutcome::from(first),
        ResolveOutcome::Resolved { reward: Some(20) }
    );
    assert_eq!(ResolveOutcome::from(second), ResolveOutcome::AlreadyResolved);
}

#[tokio::test]
async fn test_resolve_expired_empty_body_is_resolution() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/MicroBet/resolveExpiredBet"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock_server)
        .await;

    let response = client(&mock_server)
        .resolve_expired_bet(&token(), "t1")
        .await
        .unwrap();
    assert_eq!(
        ResolveOutcome::from(response),
        ResolveOutcome::Resolved { reward: None }
    );
}

#[tokio::test]
async fn test_error_field_on_success_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/MicroBet/resolveBet"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "error": "No bet found for task" })),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/MicroBet/placeBet"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "error": "Insufficient points for wager" })),
        )
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);

    let err = client.resolve_bet(&token(), "t1", Utc::now()).await.unwrap_err();
    assert!(err.is_not_found());

    let request = PlaceBetRequest {
        task: "t1".into(),
        wager: 1000,
        deadline: Utc::now(),
        task_due_date: None,
    };
    let err = client.place_bet(&token(), &request).await.unwrap_err();
    assert!(matches!(err, ApiError::Backend(ref m) if m.contains("Insufficient")));
}

#[tokio::test]
async fn test_http_status_mapping() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/MicroBet/cancelBet"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "Bet not found" })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/MicroBet/getUserProfile"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/MicroBet/getActiveBets"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);

    let err = client.cancel_bet(&token(), "t1").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Not found: Bet not found");

    let err = client.profile(&token()).await.unwrap_err();
    assert!(err.is_auth());

    let err = client.active_bets(&token()).await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_place_bet_returns_bet_id() {
    let mock_server = MockServer::start().await;
    let deadline = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

    Mock::given(method("POST"))
        .and(path("/MicroBet/placeBet"))
        .and(body_partial_json(json!({
            "task": "t1",
            "wager": 25,
            "deadline": "2024-06-01T12:00:00Z",
            "accessToken": "secret-token"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "bet": "b42" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let request = PlaceBetRequest {
        task: "t1".into(),
        wager: 25,
        deadline,
        task_due_date: None,
    };
    let bet_id = client(&mock_server)
        .place_bet(&token(), &request)
        .await
        .unwrap();
    assert_eq!(bet_id, "b42");
}

#[tokio::test]
async fn test_fetch_tasks() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/TaskManager/getTasks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tasks": [
                { "_id": "t1", "title": "Write report", "dueDate": "2024-06-02T09:00:00Z" },
                { "_id": "t2", "title": "Review" }
            ],
            "total": 2,
            "page": 1,
            "totalPages": 1
        })))
        .mount(&mock_server)
        .await;

    let tasks = client(&mock_server).fetch_tasks(&token()).await.unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].title, "Write report");
    assert!(tasks[0].due_date.is_some());
    assert!(tasks[1].due_date.is_none());
}

#[tokio::test]
async fn test_open_stream_parses_events() {
    let mock_server = MockServer::start().await;

    let body = format!(
        "data: {}\n\n: keepalive\n\ndata: {}\n\ndata: {}\n\ndata: {}\n\n",
        json!({ "type": "connected" }),
        json!({ "type": "nudge", "nudge": nudge_json("n1", "t1") }),
        json!({ "type": "mystery" }),
        json!({ "type": "heartbeat" }),
    );

    Mock::given(method("GET"))
        .and(path("/NudgeEngine/subscribe"))
        .and(query_param("accessToken", "secret-token"))
        .and(header("accept", "text/event-stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(&mock_server)
        .await;

    let stream = client(&mock_server).open_stream(&token()).await.unwrap();
    let messages: Vec<_> = stream.collect().await;

    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].as_ref().unwrap(), &PushMessage::Connected);
    assert!(matches!(
        messages[1].as_ref().unwrap(),
        PushMessage::Nudge { nudge } if nudge.id == "n1"
    ));
    assert_eq!(messages[2].as_ref().unwrap(), &PushMessage::Heartbeat);
}

#[tokio::test]
async fn test_open_stream_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/NudgeEngine/subscribe"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "Invalid token" })))
        .mount(&mock_server)
        .await;

    let err = match client(&mock_server).open_stream(&token()).await {
        Ok(_) => panic!("expected subscription to be rejected"),
        Err(e) => e,
    };
    assert!(err.is_auth());
}

#[tokio::test]
async fn test_missing_route_is_a_failure_not_a_missing_bet() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(404).set_body_string("Cannot POST /api/MicroBet/resolveBet"),
        )
        .mount(&mock_server)
        .await;

    let client = Arc::new(client(&mock_server));
    let err = client
        .resolve_bet(&token(), "t1", Utc::now())
        .await
        .unwrap_err();
    assert!(!err.is_not_found());
    assert_eq!(err.status(), Some(404));

    let coordinator = WagerCoordinator::new(
        client,
        Arc::new(SessionCredentials::with_credential(token())),
        Arc::new(InMemoryTaskDirectory::new()),
        &WagerConfig::default(),
    );
    let err = coordinator.on_task_started("t1", Utc::now()).await.unwrap_err();
    assert!(matches!(err, DomainError::Api(ApiError::Http { status: 404, .. })));
}

#[tokio::test]
async fn test_bettor_endpoints() {
    let mock_server = MockServer::start().await;
    let bet = json!({
        "_id": "b1",
        "task": "t1",
        "wager": 10,
        "deadline": "2024-01-01T00:00:00Z",
        "success": true
    });

    Mock::given(method("POST"))
        .and(path("/MicroBet/initializeBettor"))
        .and(body_partial_json(json!({ "accessToken": "secret-token" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "user": "u1" })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/MicroBet/getBet"))
        .and(body_partial_json(json!({ "task": "t1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "bet": bet.clone() })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/MicroBet/getBet"))
        .and(body_partial_json(json!({ "task": "t2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "Bet not found" })))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/MicroBet/getRecentActivity"))
        .and(body_partial_json(json!({ "limit": 5, "accessToken": "secret-token" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([bet])))
        .mount(&mock_server)
        .await;

    let client = client(&mock_server);

    client.initialize_bettor(&token()).await.unwrap();

    let found = client.bet(&token(), "t1").await.unwrap().unwrap();
    assert_eq!(found.id, "b1");
    assert_eq!(found.success, Some(true));
    assert!(client.bet(&token(), "t2").await.unwrap().is_none());

    let recent = client.recent_activity(&token(), 5).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].task, "t1");
}

#[tokio::test]
async fn test_user_nudges_sends_filters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/NudgeEngine/getUserNudges"))
        .and(body_partial_json(json!({
            "status": "triggered",
            "limit": 5,
            "accessToken": "secret-token"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([nudge_json("n1", "t1")])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let nudges = client(&mock_server)
        .user_nudges(&token(), Some(NudgeStatus::Triggered), Some(5))
        .await
        .unwrap();
    assert_eq!(nudges.len(), 1);
    assert_eq!(nudges[0].task, "t1");
}
