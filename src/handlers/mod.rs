pub mod admin;
pub mod appointments;
pub mod chat;
pub mod health;

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use axum::routing::{delete, get, post};
use axum::Router;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::{Stream, StreamExt};

use crate::errors::AppError;
use crate::services::events::ChangeNotifier;
use crate::state::AppState;

const KEEPALIVE_SECS: u64 = 30;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/chat/start", post(chat::start))
        .route("/api/chat/message", post(chat::message))
        .route("/api/chat/:session_id", get(chat::get_session))
        .route("/api/chat/:session_id/events", get(chat::events_stream))
        .route("/api/bookings", post(appointments::create_booking))
        .route("/api/availability", post(appointments::check_availability))
        .route("/api/appointments/:id", get(appointments::get_appointment))
        .route("/api/admin/appointments", get(admin::list_appointments))
        .route(
            "/api/admin/appointments/:id/status",
            post(admin::update_status),
        )
        .route(
            "/api/admin/appointments/:id",
            delete(admin::delete_appointment),
        )
        .route(
            "/api/admin/appointments/clear",
            post(admin::clear_appointments),
        )
        .route("/api/admin/events", get(admin::events_stream))
        .with_state(state)
}

pub(crate) fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

/// Change events for `key` as SSE, with a periodic keepalive comment.
pub(crate) fn change_stream(
    notifier: &ChangeNotifier,
    key: &str,
    event_name: &'static str,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let live = notifier.subscribe(key).filter_map(move |change| {
        let data = serde_json::to_string(&change).ok()?;
        Some(Ok::<_, Infallible>(
            Event::default().data(data).event(event_name),
        ))
    });

    let keepalive = IntervalStream::new(tokio::time::interval(Duration::from_secs(KEEPALIVE_SECS)))
        .map(|_| Ok(Event::default().comment("keepalive")));

    Sse::new(StreamExt::merge(live, keepalive))
}
