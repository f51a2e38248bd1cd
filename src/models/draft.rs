use serde::{Deserialize, Serialize};

/// Sentinel stored in `preferred_time_slot` for emergency bookings.
pub const EMERGENCY_SLOT: &str = "Immediate Emergency";

pub const PHONE_DIGITS: usize = 10;

/// The fields a booking needs, in the order they are collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    PatientName,
    PhoneNumber,
    Problem,
    PreferredDate,
    PreferredTime,
}

impl Field {
    pub const ORDER: [Field; 5] = [
        Field::PatientName,
        Field::PhoneNumber,
        Field::Problem,
        Field::PreferredDate,
        Field::PreferredTime,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Field::PatientName => "name",
            Field::PhoneNumber => "phone number",
            Field::Problem => "reason for visit",
            Field::PreferredDate => "preferred date",
            Field::PreferredTime => "preferred time",
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldError {
    #[error("{} must not be empty", .0.label())]
    Empty(Field),

    #[error("phone number must be exactly 10 digits")]
    PhoneDigits,
}

/// A booking in progress. Any subset of fields may be present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_time_slot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_emergency: Option<bool>,
}

impl BookingDraft {
    pub fn is_empty(&self) -> bool {
        *self == BookingDraft::default()
    }

    /// Applies every field set in `updates`.
    pub fn merge(&mut self, updates: &BookingDraft) {
        if let Some(v) = &updates.patient_name {
            self.patient_name = Some(v.clone());
        }
        if let Some(v) = &updates.phone_number {
            self.phone_number = Some(v.clone());
        }
        if let Some(v) = &updates.problem {
            self.problem = Some(v.clone());
        }
        if let Some(v) = &updates.preferred_time_slot {
            self.preferred_time_slot = Some(v.clone());
        }
        if let Some(v) = updates.is_emergency {
            self.is_emergency = Some(v);
        }
    }

    pub fn is_emergency(&self) -> bool {
        self.is_emergency == Some(true)
            && self.preferred_time_slot.as_deref() == Some(EMERGENCY_SLOT)
    }

    pub fn has_valid_phone(&self) -> bool {
        self.phone_number
            .as_deref()
            .map(|p| normalize_phone(p).is_ok())
            .unwrap_or(false)
    }

    /// Whether `field` is present. A slot carries a time once it reads
    /// `"<label> on <date>"`; the emergency sentinel stands in for both.
    pub fn has(&self, field: Field) -> bool {
        let slot = self.preferred_time_slot.as_deref().map(str::trim);
        match field {
            Field::PatientName => is_filled(&self.patient_name),
            Field::PhoneNumber => self.has_valid_phone(),
            Field::Problem => is_filled(&self.problem),
            Field::PreferredDate => slot.map(|s| !s.is_empty()).unwrap_or(false),
            Field::PreferredTime => {
                slot.map(|s| s == EMERGENCY_SLOT || s.contains(" on ")).unwrap_or(false)
            }
        }
    }

    /// Required fields still absent, in collection order.
    pub fn missing_fields(&self) -> Vec<Field> {
        Field::ORDER
            .into_iter()
            .filter(|field| !self.has(*field))
            .collect()
    }
}

fn is_filled(v: &Option<String>) -> bool {
    v.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
}

pub fn validate_name(input: &str) -> Result<String, FieldError> {
    non_empty(input, Field::PatientName)
}

pub fn validate_problem(input: &str) -> Result<String, FieldError> {
    non_empty(input, Field::Problem)
}

fn non_empty(input: &str, field: Field) -> Result<String, FieldError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        Err(FieldError::Empty(field))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Strips common separators and requires exactly ten digits.
pub fn normalize_phone(input: &str) -> Result<String, FieldError> {
    let stripped: String = input
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    if stripped.len() == PHONE_DIGITS && stripped.chars().all(|c| c.is_ascii_digit()) {
        Ok(stripped)
    } else {
        Err(FieldError::PhoneDigits)
    }
}
