use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::time_slots::format_date;
use crate::models::{Appointment, BookingConfirmation, BookingRequest};
use crate::services::availability::{AvailabilityResolver, SlotLookup};
use crate::services::booking;
use crate::state::AppState;

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BookingRequest>,
) -> Result<Json<BookingConfirmation>, AppError> {
    let confirmation = booking::finalize(
        state.appointments.as_ref(),
        &state.config.time_slots,
        &req,
    )?;
    Ok(Json(confirmation))
}

// POST /api/availability
#[derive(Deserialize)]
pub struct AvailabilityRequest {
    pub date: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub available_slots: Vec<String>,
    pub already_scheduled: bool,
}

pub async fn check_availability(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AvailabilityRequest>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let resolver = AvailabilityResolver::new(state.appointments.as_ref(), &state.config.time_slots);

    let response = match resolver.lookup(&req.date)? {
        SlotLookup::AlreadyScheduled => AvailabilityResponse {
            date: None,
            available_slots: vec![],
            already_scheduled: true,
        },
        SlotLookup::Open { date, slots } => AvailabilityResponse {
            date: Some(format_date(date)),
            available_slots: slots,
            already_scheduled: false,
        },
    };
    Ok(Json(response))
}

// GET /api/appointments/:id
pub async fn get_appointment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    state
        .appointments
        .get_by_id(&id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("appointment not found".to_string()))
}
