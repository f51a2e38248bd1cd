use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_stream::Stream;

use super::check_auth;
use crate::errors::AppError;
use crate::models::{Appointment, AppointmentStatus};
use crate::services::events::APPOINTMENTS_KEY;
use crate::state::AppState;

// GET /api/admin/appointments
#[derive(Deserialize)]
pub struct AppointmentsQuery {
    pub status: Option<String>,
}

pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AppointmentsQuery>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let status = query.status.as_deref().map(parse_status).transpose()?;
    let appointments = state
        .appointments
        .list_all()?
        .into_iter()
        .filter(|a| status.map_or(true, |s| a.status == s))
        .collect();

    Ok(Json(appointments))
}

// POST /api/admin/appointments/:id/status
#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub id: String,
    pub status: AppointmentStatus,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<StatusRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let status = parse_status(&req.status)?;
    if !state
        .appointments
        .update_field(&id, "status", status.as_str())?
    {
        return Err(AppError::NotFound("appointment not found".to_string()));
    }

    tracing::info!(id = %id, status = status.as_str(), "appointment status updated");
    Ok(Json(StatusResponse { id, status }))
}

// DELETE /api/admin/appointments/:id
pub async fn delete_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    if !state.appointments.delete_by_id(&id)? {
        return Err(AppError::NotFound("appointment not found".to_string()));
    }

    tracing::info!(id = %id, "appointment deleted");
    Ok(Json(serde_json::json!({ "deleted": id })))
}

// POST /api/admin/appointments/clear
pub async fn clear_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let cleared = state.appointments.clear_all()?;
    tracing::warn!(cleared, "all appointments cleared");
    Ok(Json(serde_json::json!({ "cleared": cleared })))
}

// GET /api/admin/events
#[derive(Deserialize)]
pub struct SseQuery {
    pub token: Option<String>,
}

pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    // EventSource cannot set headers, so the token comes in the query string
    let token = query.token.unwrap_or_default();
    if token.is_empty() || token != state.config.admin_token {
        return Err(AppError::Unauthorized);
    }

    Ok(super::change_stream(
        &state.notifier,
        APPOINTMENTS_KEY,
        "appointments",
    ))
}

fn parse_status(s: &str) -> Result<AppointmentStatus, AppError> {
    AppointmentStatus::parse(s).ok_or_else(|| {
        AppError::Validation(format!(
            "status must be one of \"pending\", \"appointed\" or \"on hold\", got {s:?}"
        ))
    })
}
