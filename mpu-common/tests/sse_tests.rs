//! Tests for the event bus SSE stream

use axum::{body::Body, extract::State, http::Request, routing::get, Router};
use chrono::Utc;
use http_body_util::BodyExt;
use mpu_common::events::{EventBus, RunStatus, UpdaterEvent};
use mpu_common::sse::create_event_bus_sse_stream;
use tower::util::ServiceExt;
use uuid::Uuid;

fn app(bus: EventBus) -> Router {
    Router::new()
        .route(
            "/events",
            get(|State(bus): State<EventBus>| async move {
                create_event_bus_sse_stream("test", &bus)
            }),
        )
        .with_state(bus)
}

async fn next_frame_text(body: &mut Body) -> String {
    let frame = body.frame().await.unwrap().unwrap();
    String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap()
}

#[tokio::test]
async fn test_stream_sends_connection_status_then_events() {
    let bus = EventBus::new(16);
    let response = app(bus.clone())
        .oneshot(Request::builder().uri("/events").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );

    let mut body = response.into_body();
    let first = next_frame_text(&mut body).await;
    assert!(first.contains("event: ConnectionStatus"));
    assert!(first.contains("data: connected"));

    let job_id = Uuid::new_v4();
    bus.emit_lossy(UpdaterEvent::JobStatusChanged {
        job_id,
        status: RunStatus::Processing,
        timestamp: Utc::now(),
    });

    let second = next_frame_text(&mut body).await;
    assert!(second.contains("event: JobStatusChanged"));
    assert!(second.contains(&job_id.to_string()));
    assert!(second.contains("\"status\":\"processing\""));
}
