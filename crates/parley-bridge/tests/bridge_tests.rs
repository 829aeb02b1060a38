// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message bridge and ticket monitor scenarios against mock adapters.

use std::sync::Arc;
use std::time::Duration;

use parley_bridge::{ForwardOutcome, MessageBridge, MonitorSettings};
use parley_core::{ChatEvent, ContactId, MessageKind, TicketStatus};
use parley_test_utils::{
    MockBackend, MockTransport, PollReply, agent_message, customer_message, inbound, wait_until,
};
use parley_transcript::ConversationLogStore;
use tempfile::TempDir;

const ALICE: &str = "alice@example.com/phone";
const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    _tmp: TempDir,
    transport: Arc<MockTransport>,
    backend: Arc<MockBackend>,
    transcript: Arc<ConversationLogStore>,
    bridge: Arc<MessageBridge>,
}

fn fast_monitor() -> MonitorSettings {
    MonitorSettings {
        poll_interval: Duration::from_millis(10),
        max_consecutive_errors: 5,
        page_size: 50,
    }
}

async fn harness() -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let transport = Arc::new(MockTransport::new());
    let backend = Arc::new(MockBackend::new().with_default_ticket("T-1").await);
    let transcript = Arc::new(ConversationLogStore::new(tmp.path()));
    let bridge = MessageBridge::builder("bot", transport.clone(), transcript.clone())
        .backend(backend.clone())
        .monitor_settings(fast_monitor())
        .build();
    Harness {
        _tmp: tmp,
        transport,
        backend,
        transcript,
        bridge,
    }
}

fn alice() -> ContactId {
    ContactId::from_full(ALICE)
}

async fn log_lines(h: &Harness) -> Vec<(String, String)> {
    let mut lines = Vec::new();
    let mut segments = h.transcript.list_segments("bot", "alice@example.com").await.unwrap();
    segments.reverse();
    for segment in segments {
        for line in h.transcript.read_lines(&segment).await.unwrap() {
            lines.push((line.speaker, line.body));
        }
    }
    lines
}

#[tokio::test]
async fn forward_submits_message_with_sender_metadata() {
    let h = harness().await;
    let mut message = inbound(ALICE, "my printer is on fire");
    message.sender_name = Some("Alice".into());

    let outcome = h.bridge.forward_to_backend(message.clone()).await;
    assert_eq!(
        outcome,
        ForwardOutcome::MonitorStarted {
            ticket_id: "T-1".into()
        }
    );

    let submissions = h.backend.submissions().await;
    assert_eq!(submissions.len(), 1);
    let submitted = &submissions[0];
    assert_eq!(submitted.from, ALICE);
    assert_eq!(submitted.to, "bot@example.com/parley");
    assert_eq!(submitted.body, "my printer is on fire");
    assert_eq!(submitted.message_type, MessageKind::Chat);
    let sender = submitted.sender.as_ref().expect("sender metadata");
    assert_eq!(sender.name.as_deref(), Some("Alice"));
    assert_eq!(sender.resource.as_deref(), Some("phone"));

    let ticket = h.bridge.registry().get_active_ticket(&alice()).unwrap();
    assert_eq!(ticket.ticket_id, "T-1");
    assert_eq!(ticket.status, TicketStatus::Open);
    assert_eq!(ticket.full_address, ALICE);
    h.bridge.shutdown(WAIT).await;
}

#[tokio::test]
async fn on_inbound_message_logs_before_forwarding() {
    let h = harness().await;
    h.bridge.on_inbound_message(inbound(ALICE, "hello")).await;

    assert_eq!(h.bridge.registry().discovered(), vec![alice()]);
    assert_eq!(
        log_lines(&h).await,
        vec![("alice@example.com".to_string(), "hello".to_string())]
    );
    let events = h.bridge.events().drain();
    assert!(matches!(
        events.as_slice(),
        [ChatEvent::Message { from, body, .. }] if from == ALICE && body == "hello"
    ));

    let registry = h.bridge.registry();
    let bare = &alice();
    assert!(wait_until(WAIT, move || async move { registry.get_active_ticket(bare).is_some() }).await);
    h.bridge.shutdown(WAIT).await;
}

#[tokio::test]
async fn blank_messages_are_ignored() {
    let h = harness().await;
    h.bridge.on_inbound_message(inbound(ALICE, "  \n\t ")).await;
    assert!(h.bridge.registry().discovered().is_empty());
    assert!(h.bridge.events().is_empty());
    assert!(log_lines(&h).await.is_empty());
    assert_eq!(h.bridge.tasks_in_flight(), 0);
    assert!(h.backend.submissions().await.is_empty());
}

#[tokio::test]
async fn agent_reply_is_relayed_exactly_once() {
    let h = harness().await;
    h.backend
        .set_messages("T-1", vec![customer_message("hello")])
        .await;
    h.bridge.forward_to_backend(inbound(ALICE, "hello")).await;

    let registry = h.bridge.registry();
    let bare = &alice();
    assert!(
        wait_until(WAIT, move || async move {
            registry
                .get_active_ticket(bare)
                .is_some_and(|t| t.last_seen_message_count == 1)
        })
        .await
    );
    assert_eq!(h.transport.sent_count().await, 0);

    h.backend
        .add_message("T-1", agent_message("We're on it"))
        .await;
    let transport = &h.transport;
    assert!(wait_until(WAIT, move || async move { transport.sent_count().await == 1 }).await);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let sent = h.transport.sent_messages().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, ALICE);
    assert_eq!(sent[0].body, "We're on it");
    assert_eq!(
        registry.get_active_ticket(bare).unwrap().last_seen_message_count,
        2
    );
    assert!(log_lines(&h)
        .await
        .contains(&("AI Bot".to_string(), "We're on it".to_string())));
    h.bridge.shutdown(WAIT).await;
}

#[tokio::test]
async fn resolved_ticket_stops_monitor_and_rotates_log() {
    let h = harness().await;
    let mut closing = agent_message("Glad I could help, closing ticket now");
    closing.ticket_status = Some(TicketStatus::Resolved);
    h.backend
        .set_messages("T-1", vec![customer_message("help"), closing])
        .await;
    h.bridge.forward_to_backend(inbound(ALICE, "help")).await;

    let transport = &h.transport;
    assert!(wait_until(WAIT, move || async move { transport.sent_count().await == 1 }).await);
    let registry = h.bridge.registry();
    let bare = &alice();
    assert!(wait_until(WAIT, move || async move { registry.get_active_ticket(bare).is_none() }).await);

    let polls = h.backend.poll_count("T-1").await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.backend.poll_count("T-1").await, polls, "monitor kept polling");
    assert_eq!(h.transport.sent_count().await, 1);

    // The relayed closing line ended segment 1; the next line opens segment 2.
    h.bridge
        .send_to_contact(ALICE, "anything else?", false)
        .await
        .unwrap();
    let segments = h.transcript.list_segments("bot", "alice@example.com").await.unwrap();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].sequence, 2);
    assert_eq!(
        h.transcript.read_lines(&segments[0]).await.unwrap()[0].body,
        "anything else?"
    );
    h.bridge.shutdown(WAIT).await;
}

#[tokio::test]
async fn five_failed_polls_exhaust_the_monitor() {
    let h = harness().await;
    for _ in 0..5 {
        h.backend.push_poll("T-1", PollReply::Error(503)).await;
    }
    h.bridge.forward_to_backend(inbound(ALICE, "hi")).await;

    let registry = h.bridge.registry();
    let bare = &alice();
    assert!(wait_until(WAIT, move || async move { registry.get_active_ticket(bare).is_none() }).await);
    assert_eq!(h.backend.poll_count("T-1").await, 5);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.backend.poll_count("T-1").await, 5);
    assert_eq!(h.transport.sent_count().await, 0);
}

#[tokio::test]
async fn a_success_between_failures_resets_the_budget() {
    let h = harness().await;
    for reply in [
        PollReply::Error(500),
        PollReply::Error(500),
        PollReply::Error(500),
        PollReply::Error(500),
        PollReply::Messages(vec![]),
        PollReply::Error(500),
        PollReply::Error(500),
    ] {
        h.backend.push_poll("T-1", reply).await;
    }
    h.bridge.forward_to_backend(inbound(ALICE, "hi")).await;

    let backend = &h.backend;
    assert!(wait_until(WAIT, move || async move { backend.poll_count("T-1").await >= 9 }).await);
    assert!(h.bridge.registry().get_active_ticket(&alice()).is_some());
    h.bridge.shutdown(WAIT).await;
}

#[tokio::test]
async fn missing_ticket_terminates_without_retry() {
    let h = harness().await;
    h.backend.push_poll("T-1", PollReply::NotFound).await;
    h.bridge.forward_to_backend(inbound(ALICE, "hi")).await;

    let registry = h.bridge.registry();
    let bare = &alice();
    assert!(wait_until(WAIT, move || async move { registry.get_active_ticket(bare).is_none() }).await);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.backend.poll_count("T-1").await, 1);
}

#[tokio::test]
async fn repeated_messages_share_one_monitor() {
    let h = harness().await;
    let first = h.bridge.forward_to_backend(inbound(ALICE, "one")).await;
    let second = h
        .bridge
        .forward_to_backend(inbound("alice@example.com/laptop", "two"))
        .await;
    assert!(matches!(first, ForwardOutcome::MonitorStarted { .. }));
    assert_eq!(
        second,
        ForwardOutcome::AlreadyMonitored {
            ticket_id: "T-1".into()
        }
    );
    // The existing ticket is left exactly as its monitor last wrote it.
    let ticket = h.bridge.registry().get_active_ticket(&alice()).unwrap();
    assert_eq!(ticket.full_address, ALICE);
    assert_eq!(ticket.ticket_id, "T-1");
    h.bridge.shutdown(WAIT).await;
}

#[tokio::test]
async fn concurrent_forwards_start_one_monitor() {
    let h = harness().await;
    let forwards: Vec<_> = (0..10)
        .map(|n| {
            let bridge = h.bridge.clone();
            tokio::spawn(async move {
                bridge
                    .forward_to_backend(inbound(ALICE, &format!("message {n}")))
                    .await
            })
        })
        .collect();

    let mut started = 0;
    for forward in forwards {
        if matches!(forward.await.unwrap(), ForwardOutcome::MonitorStarted { .. }) {
            started += 1;
        }
    }
    assert_eq!(started, 1);
    assert_eq!(h.bridge.registry().active_ticket_count(), 1);
    h.bridge.shutdown(WAIT).await;
}

#[tokio::test]
async fn failed_submission_starts_nothing() {
    let h = harness().await;
    h.backend.push_submit_error(503).await;
    let outcome = h.bridge.forward_to_backend(inbound(ALICE, "hi")).await;
    assert_eq!(outcome, ForwardOutcome::Failed);
    assert!(h.bridge.registry().get_active_ticket(&alice()).is_none());
    assert_eq!(h.bridge.tasks_in_flight(), 0);
}

#[tokio::test]
async fn bridge_without_backend_still_logs() {
    let tmp = tempfile::tempdir().unwrap();
    let transport = Arc::new(MockTransport::new());
    let transcript = Arc::new(ConversationLogStore::new(tmp.path()));
    let bridge = MessageBridge::builder("bot", transport, transcript.clone()).build();

    bridge.on_inbound_message(inbound(ALICE, "anyone there?")).await;
    assert_eq!(
        bridge.forward_to_backend(inbound(ALICE, "hello?")).await,
        ForwardOutcome::NoBackend
    );
    assert_eq!(bridge.tasks_in_flight(), 0);
    let segments = transcript.list_segments("bot", "alice@example.com").await.unwrap();
    assert_eq!(segments.len(), 1);
}

#[tokio::test]
async fn operator_messages_flatten_links_and_log_as_me() {
    let h = harness().await;
    h.bridge
        .send_to_contact(ALICE, "Try [the reset guide](https://help.example.com/reset)", false)
        .await
        .unwrap();

    let sent = h.transport.sent_messages().await;
    assert_eq!(sent[0].body, "Try the reset guide: https://help.example.com/reset");
    assert_eq!(sent[0].kind, MessageKind::Chat);
    assert_eq!(
        log_lines(&h).await,
        vec![(
            "Me".to_string(),
            "Try the reset guide: https://help.example.com/reset".to_string()
        )]
    );
    assert!(matches!(
        h.bridge.events().drain().as_slice(),
        [ChatEvent::Sent { as_ai: false, .. }]
    ));
}

#[tokio::test]
async fn refused_send_is_not_logged() {
    let h = harness().await;
    h.transport.fail_sends(true);
    assert!(h.bridge.send_to_contact(ALICE, "hello", false).await.is_err());
    assert!(log_lines(&h).await.is_empty());
    assert!(h.bridge.events().is_empty());
}

#[tokio::test]
async fn cleared_ticket_stops_its_monitor() {
    let h = harness().await;
    h.bridge.forward_to_backend(inbound(ALICE, "hi")).await;
    let backend = &h.backend;
    assert!(wait_until(WAIT, move || async move { backend.poll_count("T-1").await >= 1 }).await);

    h.bridge.registry().clear_active_ticket(&alice());
    let bridge = &h.bridge;
    assert!(wait_until(WAIT, move || async move { bridge.tasks_in_flight() == 0 }).await);
    let polls = h.backend.poll_count("T-1").await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.backend.poll_count("T-1").await, polls);
}

#[tokio::test]
async fn shutdown_drains_monitors_and_keeps_tickets() {
    let h = harness().await;
    h.bridge.forward_to_backend(inbound(ALICE, "hi")).await;
    assert_eq!(h.bridge.tasks_in_flight(), 1);

    assert!(h.bridge.shutdown(WAIT).await);
    assert_eq!(h.bridge.tasks_in_flight(), 0);
    let registry = h.bridge.registry();
    assert!(registry.get_active_ticket(&alice()).is_some());
    assert!(!registry.is_monitor_alive(&alice()));

    // No new forwards after shutdown.
    h.bridge.on_inbound_message(inbound(ALICE, "still there?")).await;
    assert_eq!(h.bridge.tasks_in_flight(), 0);
}

#[tokio::test]
async fn shutdown_lets_an_in_flight_fetch_finish() {
    let h = harness().await;
    h.backend.set_poll_delay(Duration::from_millis(300)).await;
    h.bridge.forward_to_backend(inbound(ALICE, "hi")).await;
    let backend = &h.backend;
    assert!(
        wait_until(WAIT, move || async move { backend.poll_count("T-1").await == 1 }).await,
        "monitor never polled"
    );
    assert_eq!(h.backend.answered_polls("T-1").await, 0);

    assert!(h.bridge.shutdown(WAIT).await);
    assert_eq!(h.backend.answered_polls("T-1").await, 1);
    assert_eq!(h.backend.poll_count("T-1").await, 1);
    assert!(h.bridge.registry().get_active_ticket(&alice()).is_some());
}
