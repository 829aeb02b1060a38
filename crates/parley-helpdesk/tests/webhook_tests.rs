// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire-level tests of the ticket backend client against a mock server.

use std::time::Duration;

use chrono::Utc;
use parley_core::{
    HealthStatus, IncomingSubmission, MessageKind, ParleyError, PluginAdapter, SenderMetadata,
    TicketBackend, TicketQuery, TicketStatus,
};
use parley_helpdesk::{HelpdeskBackend, HelpdeskClient};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer) -> HelpdeskBackend {
    let client =
        HelpdeskClient::new(&server.uri(), Some("secret-token"), Duration::from_secs(10)).unwrap();
    HelpdeskBackend::with_client(client, "xmpp".into())
}

fn submission() -> IncomingSubmission {
    IncomingSubmission {
        from: "alice@example.com/phone".into(),
        to: "support@example.com".into(),
        body: "my order is late".into(),
        message_type: MessageKind::Chat,
        timestamp: Utc::now(),
        sender: Some(SenderMetadata {
            name: Some("Alice".into()),
            resource: Some("phone".into()),
        }),
    }
}

#[tokio::test]
async fn submit_incoming_posts_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhooks/chat/incoming"))
        .and(header("authorization", "Bearer secret-token"))
        .and(body_partial_json(json!({
            "from": "alice@example.com/phone",
            "to": "support@example.com",
            "body": "my order is late",
            "message_type": "chat",
            "sender": {"name": "Alice", "resource": "phone"}
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"ticket_id": "T-1", "created": true})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ack = backend(&server).submit_incoming(&submission()).await.unwrap();
    assert_eq!(ack.ticket_id, "T-1");
}

#[tokio::test]
async fn non_success_status_becomes_backend_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/webhooks/chat/incoming"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&server)
        .await;

    let err = backend(&server)
        .submit_incoming(&submission())
        .await
        .unwrap_err();
    match err {
        ParleyError::Backend { status, body, .. } => {
            assert_eq!(status, Some(503));
            assert_eq!(body, "maintenance");
        }
        other => panic!("expected Backend error, got {other:?}"),
    }
}

#[tokio::test]
async fn ticket_messages_sends_limit_and_parses_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/webhooks/chat/tickets/T-1/messages"))
        .and(query_param("limit", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"content": "hello", "message_type": "customer", "is_customer": true},
            {"content": "we're on it", "message_type": "agent", "sender": {"name": "Bob"},
             "is_customer": false, "ticket_status": "IN_PROGRESS"}
        ])))
        .mount(&server)
        .await;

    let messages = backend(&server).ticket_messages("T-1", 50).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].is_customer);
    assert_eq!(messages[1].relayable_content(), Some("we're on it"));
    assert_eq!(messages[1].ticket_status, Some(TicketStatus::InProgress));
}

#[tokio::test]
async fn ticket_messages_404_is_ticket_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/webhooks/chat/tickets/gone/messages"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = backend(&server).ticket_messages("gone", 10).await.unwrap_err();
    assert!(
        matches!(err, ParleyError::TicketNotFound { ref ticket_id } if ticket_id == "gone"),
        "got {err:?}"
    );
}

#[tokio::test]
async fn active_ticket_maps_404_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/webhooks/chat/user/alice@example.com/active-ticket"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ticket_id": "T-7", "status": "OPEN", "subject": "Late order"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/webhooks/chat/user/bob@example.com/active-ticket"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let backend = backend(&server);
    let ticket = backend
        .active_ticket("alice@example.com")
        .await
        .unwrap()
        .expect("alice has a ticket");
    assert_eq!(ticket.id, "T-7");
    assert_eq!(ticket.status, TicketStatus::Open);
    assert!(backend.active_ticket("bob@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn list_tickets_sends_filters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/webhooks/chat/tickets"))
        .and(query_param("status", "OPEN"))
        .and(query_param("channel_source", "xmpp"))
        .and(query_param("skip", "20"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "T-3", "status": "OPEN", "priority": "HIGH"}],
            "count": 21
        })))
        .mount(&server)
        .await;

    let page = backend(&server)
        .list_tickets(&TicketQuery {
            status: Some(TicketStatus::Open),
            channel_source: Some("xmpp".into()),
            skip: 20,
            limit: 10,
        })
        .await
        .unwrap();
    assert_eq!(page.count, 21);
    assert_eq!(page.data[0].id, "T-3");
    assert_eq!(page.data[0].priority.as_deref(), Some("HIGH"));
}

#[tokio::test]
async fn slow_backend_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/webhooks/chat/tickets/T-1/messages"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let client = HelpdeskClient::new(&server.uri(), None, Duration::from_millis(200)).unwrap();
    let err = client.ticket_messages("T-1", 5).await.unwrap_err();
    assert!(matches!(err, ParleyError::Timeout { .. }), "got {err:?}");
}

#[tokio::test]
async fn health_check_reflects_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/webhooks/chat/tickets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [], "count": 0})))
        .mount(&server)
        .await;
    assert_eq!(backend(&server).health_check().await.unwrap(), HealthStatus::Healthy);

    let down = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&down)
        .await;
    assert!(matches!(
        backend(&down).health_check().await.unwrap(),
        HealthStatus::Unhealthy(_)
    ));
}
