//! End-to-end delivery scenarios against an in-process collector and a
//! wiremock-backed HTTP collector.

use chrono::{TimeZone, Utc};
use collector_client::testing::ScriptedCollector;
use event_outbox::{ManualClock, SweepReport, TokioScheduler};
use event_protocol_types::{Event, EventKind};
use futures_util::future::join_all;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use viewtrack_client::{ClientOptions, ClientError, InstrumentationClient, PageViewOutcome};
use viewtrack_config_and_utils::{Config, Paths};
use viewtrack_storage::{KeyValueStore, MemoryStore, StorageKeys, Stores};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    local: Arc<MemoryStore>,
    collector: Arc<ScriptedCollector>,
    clock: Arc<ManualClock>,
    client: InstrumentationClient,
}

fn harness() -> Harness {
    let local = Arc::new(MemoryStore::new());
    let session = Arc::new(MemoryStore::new());
    let stores = Stores::namespaced("viewtrack", local.clone(), session);
    let collector = Arc::new(ScriptedCollector::new());
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    ));
    let client = InstrumentationClient::new(
        stores,
        collector.clone(),
        clock.clone(),
        ClientOptions::default(),
    );
    Harness {
        local,
        collector,
        clock,
        client,
    }
}

#[tokio::test]
async fn offline_event_is_delivered_after_reconnect() {
    let h = harness();
    h.client.set_auth("P1").unwrap();
    h.client.ensure_session().await.unwrap();
    h.collector.set_online(false);

    let event = Event::page_view();
    let local_uuid = event.local_uuid.clone();
    assert!(!h.client.post_event(event, true).await.unwrap());

    let status = h.client.queue_status();
    assert_eq!(status.pending_events, 1);

    h.collector.set_online(true);
    let report = h.client.flush().await;

    assert_eq!(report.delivered, 1);
    assert_eq!(h.client.queue_status().pending_events, 0);
    assert_eq!(h.collector.stored_count(&local_uuid), 1);
}

#[tokio::test]
async fn offline_without_session_drops_event() {
    let h = harness();
    h.client.set_auth("P1").unwrap();
    h.collector.set_online(false);

    assert_eq!(h.client.send_page_view().await, PageViewOutcome::NotSent);
    assert_eq!(h.client.queue_status().pending_events, 0);
    assert_eq!(h.client.get_session(), None);

    let err = h.client.post_event(Event::page_view(), true).await.unwrap_err();
    assert!(matches!(err, ClientError::Outbox(_)));
    assert_eq!(h.client.queue_status().pending_events, 0);
    assert_eq!(h.collector.submission_count(), 0);

    h.collector.set_online(true);
    assert_eq!(h.client.send_page_view().await, PageViewOutcome::Delivered);
    assert_eq!(h.client.queue_status().pending_events, 0);
}

#[tokio::test]
async fn logout_empties_queue_and_silences_sweeps() {
    let h = harness();
    h.client.set_auth("P1").unwrap();
    h.client.ensure_session().await.unwrap();
    h.collector.set_online(false);
    h.client.post_event(Event::page_view(), true).await.unwrap();
    h.client
        .post_event(
            Event::new(EventKind::WatchTime {
                video_id: "abc".to_string(),
                watched_seconds: 12.5,
            }),
            true,
        )
        .await
        .unwrap();
    assert_eq!(h.client.queue_status().pending_events, 2);

    let notified = Arc::new(AtomicUsize::new(0));
    {
        let notified = notified.clone();
        let local = h.local.clone();
        h.client.add_on_logout_listener(move || {
            assert!(!local.has("viewtrack.events").unwrap());
            notified.fetch_add(1, Ordering::SeqCst);
        });
    }

    h.client.logout();
    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert_eq!(h.client.queue_status().pending_events, 0);
    assert_eq!(h.client.get_auth(), None);

    h.collector.set_online(true);
    let submissions = h.collector.submission_count();
    h.clock.advance(chrono::Duration::seconds(120));
    assert_eq!(h.client.flush().await, SweepReport::default());
    assert_eq!(h.collector.submission_count(), submissions);
}

#[tokio::test]
async fn already_stored_event_resolves_delivered() {
    let h = harness();
    h.client.set_auth("P1").unwrap();

    let event = Event::page_view();
    h.collector.preload_event(event.clone());

    assert!(h.client.post_event(event.clone(), true).await.unwrap());
    assert_eq!(h.client.queue_status().pending_events, 0);
    assert_eq!(h.collector.stored_count(&event.local_uuid), 1);
}

#[tokio::test]
async fn malformed_queue_blob_reads_as_empty() {
    let h = harness();
    h.client.set_auth("P1").unwrap();
    h.local.set("viewtrack.events", "definitely not a queue").unwrap();
    h.local.set("viewtrack.lz-string", "true").unwrap();

    assert_eq!(h.client.queue_status().pending_events, 0);
    assert_eq!(h.client.flush().await, SweepReport::default());
    assert!(!h.local.has("viewtrack.events").unwrap());
}

#[tokio::test]
async fn legacy_queue_key_is_migrated() {
    let h = harness();
    h.client.set_auth("P1").unwrap();
    h.client.ensure_session().await.unwrap();
    h.collector.set_online(false);
    h.client.post_event(Event::page_view(), true).await.unwrap();

    let blob = h.local.get("viewtrack.events").unwrap().unwrap();
    let flag = h.local.get("viewtrack.lz-string").unwrap().unwrap();
    h.local.delete("viewtrack.events").unwrap();
    h.local.delete("viewtrack.lz-string").unwrap();
    h.local.set(StorageKeys::EVENTS, &blob).unwrap();
    h.local.set(StorageKeys::EVENTS_COMPRESSED, &flag).unwrap();

    assert_eq!(h.client.queue_status().pending_events, 1);
    assert!(!h.local.has(StorageKeys::EVENTS).unwrap());
    assert!(h.local.has("viewtrack.events").unwrap());
}

#[tokio::test(start_paused = true)]
async fn burst_of_first_events_creates_one_session() {
    let h = harness();
    h.client.set_auth("P1").unwrap();
    h.collector.set_session_delay(Duration::from_millis(300));

    let results = join_all((0..4).map(|_| h.client.post_event(Event::page_view(), true))).await;

    assert!(results.into_iter().all(|r| r.unwrap()));
    assert_eq!(h.collector.session_calls(), 1);
    let sessions: Vec<_> = h
        .collector
        .stored_events()
        .into_iter()
        .map(|e| e.session_uuid)
        .collect();
    assert_eq!(sessions.len(), 4);
    assert!(sessions.iter().all(|s| s.as_deref() == Some("session-1")));
}

#[tokio::test(start_paused = true)]
async fn started_client_flushes_previous_queue() {
    let h = harness();
    h.client.set_auth("P1").unwrap();
    h.client.ensure_session().await.unwrap();
    h.collector.set_online(false);
    let event = Event::page_view();
    let local_uuid = event.local_uuid.clone();
    h.client.post_event(event, true).await.unwrap();
    h.collector.set_online(true);

    h.client.start(&TokioScheduler);
    assert!(h.client.queue_status().retry_running);
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(h.collector.stored_count(&local_uuid), 1);
    assert_eq!(h.client.queue_status().pending_events, 0);

    h.client.stop();
    assert!(!h.client.queue_status().retry_running);
}

#[tokio::test]
async fn page_view_survives_restart_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sessions"))
        .and(header("X-Participant-Code", "P1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "success",
            "data": {"sessionUuid": "s-http"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .and(header("X-Participant-Code", "P1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"type": "success"})))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let paths = Paths::with_base_dir(dir.path().to_path_buf());
    let config = Config {
        collector_url: server.uri(),
        request_timeout_secs: 5,
        ..Config::default()
    };

    {
        let client = InstrumentationClient::from_config(&config, &paths).unwrap();
        client.set_auth("P1").unwrap();
        client.set_page(Some("https://www.youtube.com/".to_string()), None);
        assert_eq!(client.send_page_view().await, PageViewOutcome::Queued);
        assert_eq!(client.queue_status().pending_events, 1);
    }

    let restarted = InstrumentationClient::from_config(&config, &paths).unwrap();
    let status = restarted.queue_status();
    assert_eq!(status.participant_code.as_deref(), Some("P1"));
    assert_eq!(status.session_uuid, None);
    assert_eq!(status.pending_events, 1);

    let report = restarted.flush().await;
    assert_eq!(report.delivered, 1);
    assert_eq!(restarted.queue_status().pending_events, 0);

    let requests = server.received_requests().await.unwrap();
    let events: Vec<serde_json::Value> = requests
        .iter()
        .filter(|r| r.url.path() == "/events")
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["localUuid"], events[1]["localUuid"]);
    assert_eq!(events[1]["sessionUuid"], "s-http");
    assert_eq!(events[1]["type"], "PAGE_VIEW");
}
