use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::draft::BookingDraft;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: String,
    pub appointment_id: String,
    pub patient_name: String,
    pub phone_number: String,
    pub problem: String,
    pub preferred_time_slot: String,
    pub confirmation_message: String,
    pub booked_via: BookedVia,
    pub created_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub is_emergency: bool,
}

/// An appointment before the store has assigned its key.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub appointment_id: String,
    pub patient_name: String,
    pub phone_number: String,
    pub problem: String,
    pub preferred_time_slot: String,
    pub confirmation_message: String,
    pub booked_via: BookedVia,
    pub created_at: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub is_emergency: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AppointmentStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "appointed")]
    Appointed,
    #[serde(rename = "on hold")]
    OnHold,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Appointed => "appointed",
            AppointmentStatus::OnHold => "on hold",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(AppointmentStatus::Pending),
            "appointed" => Some(AppointmentStatus::Appointed),
            "on hold" | "on_hold" => Some(AppointmentStatus::OnHold),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookedVia {
    Chatbot,
    Voice,
}

impl BookedVia {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookedVia::Chatbot => "chatbot",
            BookedVia::Voice => "voice",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "voice" => BookedVia::Voice,
            _ => BookedVia::Chatbot,
        }
    }
}

/// Confirmed details handed to the booking finalizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    #[serde(default)]
    pub patient_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub problem: String,
    #[serde(default)]
    pub preferred_time_slot: String,
    #[serde(default)]
    pub is_emergency: Option<bool>,
}

impl From<&BookingDraft> for BookingRequest {
    fn from(draft: &BookingDraft) -> Self {
        Self {
            patient_name: draft.patient_name.clone().unwrap_or_default(),
            phone_number: draft.phone_number.clone().unwrap_or_default(),
            problem: draft.problem.clone().unwrap_or_default(),
            preferred_time_slot: draft.preferred_time_slot.clone().unwrap_or_default(),
            is_emergency: draft.is_emergency,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmation {
    pub id: String,
    pub appointment_id: String,
    pub confirmation_message: String,
}
