use crate::errors::AppError;
use crate::models::draft::{normalize_phone, validate_name, validate_problem};
use crate::models::time_slots::{combine, format_date, parse_calendar_date};
use crate::models::{
    AppointmentStatus, BookedVia, BookingConfirmation, BookingRequest, NewAppointment,
    TimeSlotCatalog, EMERGENCY_SLOT,
};
use crate::services::availability::AvailabilityResolver;
use crate::services::storage::AppointmentStore;

/// Stored in place of a name or phone an emergency caller never gave.
pub const NOT_PROVIDED: &str = "Not provided";

const APPOINTMENT_ID_LEN: usize = 7;
const APPOINTMENT_ID_ALPHABET: &[u8; 36] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Turns confirmed details into a stored appointment.
///
/// Regular bookings need every field and a `"<label> on <date>"` slot whose
/// label is still free that day. Emergency bookings need only the sentinel slot.
pub fn finalize(
    store: &dyn AppointmentStore,
    catalog: &TimeSlotCatalog,
    request: &BookingRequest,
) -> Result<BookingConfirmation, AppError> {
    let appointment = if is_emergency_request(request) {
        prepare_emergency(request)?
    } else {
        let appointment = prepare_regular(catalog, request)?;
        ensure_still_open(store, catalog, &appointment.preferred_time_slot)?;
        appointment
    };

    let id = store.append(&appointment).map_err(|e| {
        tracing::error!(error = %e, appointment_id = %appointment.appointment_id, "failed to persist appointment");
        AppError::BookingFailed(e.to_string())
    })?;

    tracing::info!(
        id = %id,
        appointment_id = %appointment.appointment_id,
        emergency = appointment.is_emergency,
        "appointment booked"
    );

    Ok(BookingConfirmation {
        id,
        appointment_id: appointment.appointment_id,
        confirmation_message: appointment.confirmation_message,
    })
}

fn is_emergency_request(request: &BookingRequest) -> bool {
    request.is_emergency == Some(true) && request.preferred_time_slot.trim() == EMERGENCY_SLOT
}

fn prepare_regular(
    catalog: &TimeSlotCatalog,
    request: &BookingRequest,
) -> Result<NewAppointment, AppError> {
    let patient_name = validate_name(&request.patient_name).map_err(invalid)?;
    let phone_number = normalize_phone(&request.phone_number).map_err(invalid)?;
    let problem = validate_problem(&request.problem).map_err(invalid)?;

    let slot = catalog
        .split_scheduled(&request.preferred_time_slot)
        .and_then(|(label, day)| Some(combine(label, &format_date(parse_calendar_date(day)?))))
        .ok_or_else(|| {
            AppError::Validation(format!(
                "preferred time slot must be one of {:?} followed by \" on <date>\"",
                catalog.labels()
            ))
        })?;

    let appointment_id = new_appointment_id();
    let confirmation_message = format!(
        "Your appointment for {problem} is confirmed for {slot}. We will contact you at {phone_number} if there are any changes. Your Appointment ID is {appointment_id}."
    );

    Ok(NewAppointment {
        appointment_id,
        patient_name,
        phone_number,
        problem,
        preferred_time_slot: slot,
        confirmation_message,
        booked_via: BookedVia::Chatbot,
        created_at: chrono::Utc::now(),
        status: AppointmentStatus::Pending,
        is_emergency: false,
    })
}

fn prepare_emergency(request: &BookingRequest) -> Result<NewAppointment, AppError> {
    let patient_name = validate_name(&request.patient_name).unwrap_or_else(|_| NOT_PROVIDED.to_string());
    let phone_number = if request.phone_number.trim().is_empty() {
        NOT_PROVIDED.to_string()
    } else {
        normalize_phone(&request.phone_number).map_err(invalid)?
    };
    let problem = validate_problem(&request.problem).ok();

    let appointment_id = new_appointment_id();
    let confirmation_message = match &problem {
        Some(problem) => format!(
            "Your emergency appointment for {problem} has been registered. Please proceed to the clinic immediately. We will be expecting you. Your Appointment ID is {appointment_id}."
        ),
        None => format!(
            "Your emergency appointment has been registered. Please proceed to the clinic immediately. We will be expecting you. Your Appointment ID is {appointment_id}."
        ),
    };

    Ok(NewAppointment {
        appointment_id,
        patient_name,
        phone_number,
        problem: problem.unwrap_or_else(|| NOT_PROVIDED.to_string()),
        preferred_time_slot: EMERGENCY_SLOT.to_string(),
        confirmation_message,
        booked_via: BookedVia::Chatbot,
        created_at: chrono::Utc::now(),
        status: AppointmentStatus::Pending,
        is_emergency: true,
    })
}

fn ensure_still_open(
    store: &dyn AppointmentStore,
    catalog: &TimeSlotCatalog,
    slot: &str,
) -> Result<(), AppError> {
    let Some((label, day)) = catalog.split_scheduled(slot) else {
        return Ok(());
    };
    let Some(date) = parse_calendar_date(day) else {
        return Ok(());
    };

    let open = AvailabilityResolver::new(store, catalog).open_slots(date)?;
    if open.iter().any(|l| l == label) {
        Ok(())
    } else {
        tracing::info!(slot = %slot, "slot was taken before booking completed");
        Err(AppError::Conflict(slot.to_string()))
    }
}

fn invalid(e: impl std::fmt::Display) -> AppError {
    AppError::Validation(e.to_string())
}

/// `appt-` followed by seven characters drawn from `[a-z0-9]`.
fn new_appointment_id() -> String {
    let bytes = uuid::Uuid::new_v4().into_bytes();
    let suffix: String = bytes[..APPOINTMENT_ID_LEN]
        .iter()
        .map(|b| APPOINTMENT_ID_ALPHABET[usize::from(*b) % APPOINTMENT_ID_ALPHABET.len()] as char)
        .collect();
    format!("appt-{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{booked, memory_store, FailingStore, ReadOnlyStore};

    fn request(slot: &str) -> BookingRequest {
        BookingRequest {
            patient_name: "John Doe".to_string(),
            phone_number: "555-123-4567".to_string(),
            problem: "sore throat".to_string(),
            preferred_time_slot: slot.to_string(),
            is_emergency: None,
        }
    }

    fn assert_appointment_id(id: &str) {
        let suffix = id.strip_prefix("appt-").unwrap();
        assert_eq!(suffix.len(), 7);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_regular_booking_is_stored_pending() {
        let store = memory_store();
        let catalog = TimeSlotCatalog::default();

        let confirmation =
            finalize(&store, &catalog, &request("2:00 PM on Wed Jul 10 2024")).unwrap();

        assert_appointment_id(&confirmation.appointment_id);
        assert_ne!(confirmation.id, confirmation.appointment_id);
        assert_eq!(
            confirmation.confirmation_message,
            format!(
                "Your appointment for sore throat is confirmed for 2:00 PM on Wed Jul 10 2024. We will contact you at 5551234567 if there are any changes. Your Appointment ID is {}.",
                confirmation.appointment_id
            )
        );

        let stored = store.get_by_id(&confirmation.id).unwrap().unwrap();
        assert_eq!(stored.status, AppointmentStatus::Pending);
        assert_eq!(stored.booked_via, BookedVia::Chatbot);
        assert_eq!(stored.phone_number, "5551234567");
        assert_eq!(stored.preferred_time_slot, "2:00 PM on Wed Jul 10 2024");
        assert!(!stored.is_emergency);
    }

    #[test]
    fn test_appointment_ids_use_full_alphabet() {
        let ids: std::collections::HashSet<String> =
            (0..500).map(|_| new_appointment_id()).collect();
        assert_eq!(ids.len(), 500);
        ids.iter().for_each(|id| assert_appointment_id(id));

        // hex alone never produces letters past 'f'
        assert!(ids
            .iter()
            .any(|id| id[5..].chars().any(|c| ('g'..='z').contains(&c))));
    }

    #[test]
    fn test_slot_date_is_canonicalised() {
        let store = memory_store();
        let catalog = TimeSlotCatalog::default();
        let confirmation = finalize(&store, &catalog, &request("9:00 AM on 2024-07-10")).unwrap();
        let stored = store.get_by_id(&confirmation.id).unwrap().unwrap();
        assert_eq!(stored.preferred_time_slot, "9:00 AM on Wed Jul 10 2024");
    }

    #[test]
    fn test_emergency_booking_fills_missing_fields() {
        let store = memory_store();
        let catalog = TimeSlotCatalog::default();
        let req = BookingRequest {
            patient_name: String::new(),
            phone_number: String::new(),
            problem: "severe chest pain".to_string(),
            preferred_time_slot: EMERGENCY_SLOT.to_string(),
            is_emergency: Some(true),
        };

        let confirmation = finalize(&store, &catalog, &req).unwrap();
        assert!(confirmation
            .confirmation_message
            .starts_with("Your emergency appointment for severe chest pain has been registered."));

        let stored = store.get_by_id(&confirmation.id).unwrap().unwrap();
        assert!(stored.is_emergency);
        assert_eq!(stored.patient_name, NOT_PROVIDED);
        assert_eq!(stored.phone_number, NOT_PROVIDED);
        assert_eq!(stored.preferred_time_slot, EMERGENCY_SLOT);
    }

    #[test]
    fn test_incomplete_request_is_rejected() {
        let store = memory_store();
        let catalog = TimeSlotCatalog::default();

        let mut bad_phone = request("2:00 PM on Wed Jul 10 2024");
        bad_phone.phone_number = "555-1234".to_string();
        assert!(matches!(
            finalize(&store, &catalog, &bad_phone),
            Err(AppError::Validation(_))
        ));

        // date without a time
        assert!(matches!(
            finalize(&store, &catalog, &request("Wed Jul 10 2024")),
            Err(AppError::Validation(_))
        ));

        // sentinel without the emergency flag
        assert!(matches!(
            finalize(&store, &catalog, &request(EMERGENCY_SLOT)),
            Err(AppError::Validation(_))
        ));
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_taken_slot_is_a_conflict() {
        let store = memory_store();
        store.append(&booked("2:00 PM on Wed Jul 10 2024")).unwrap();
        let catalog = TimeSlotCatalog::default();

        let result = finalize(&store, &catalog, &request("2:00 PM on Wed Jul 10 2024"));
        assert!(matches!(result, Err(AppError::Conflict(_))));
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_write_failure_is_booking_failed() {
        let store = ReadOnlyStore(memory_store());
        let catalog = TimeSlotCatalog::default();
        let result = finalize(&store, &catalog, &request("2:00 PM on Wed Jul 10 2024"));
        assert!(matches!(result, Err(AppError::BookingFailed(_))));
    }

    #[test]
    fn test_unreadable_store_blocks_regular_booking() {
        let catalog = TimeSlotCatalog::default();
        let result = finalize(&FailingStore, &catalog, &request("2:00 PM on Wed Jul 10 2024"));
        assert!(matches!(result, Err(AppError::AvailabilityUnknown(_))));
    }
}
