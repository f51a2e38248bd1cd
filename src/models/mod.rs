pub mod appointment;
pub mod conversation;
pub mod draft;
pub mod time_slots;

pub use appointment::{
    Appointment, AppointmentStatus, BookedVia, BookingConfirmation, BookingRequest, NewAppointment,
};
pub use conversation::{ConversationTurn, DialogueResult, Role, Session, SessionState};
pub use draft::{BookingDraft, Field, FieldError, EMERGENCY_SLOT};
pub use time_slots::TimeSlotCatalog;
