pub mod sqlite;

use crate::models::{Appointment, NewAppointment, Session};

/// Where finalized appointments live. Reads have no side effects.
pub trait AppointmentStore: Send + Sync {
    /// Stores a new appointment and returns its storage key.
    fn append(&self, appointment: &NewAppointment) -> anyhow::Result<String>;

    /// All appointments, newest first by creation time.
    fn list_all(&self) -> anyhow::Result<Vec<Appointment>>;

    fn get_by_id(&self, id: &str) -> anyhow::Result<Option<Appointment>>;

    /// Returns `false` when no appointment has this id.
    fn update_field(&self, id: &str, field: &str, value: &str) -> anyhow::Result<bool>;

    fn delete_by_id(&self, id: &str) -> anyhow::Result<bool>;

    fn clear_all(&self) -> anyhow::Result<usize>;
}

/// Chat sessions keyed by session id. Expired sessions are never returned.
pub trait SessionStore: Send + Sync {
    fn load(&self, id: &str) -> anyhow::Result<Option<Session>>;

    fn save(&self, session: &Session) -> anyhow::Result<()>;

    fn remove(&self, id: &str) -> anyhow::Result<bool>;

    fn expire_old(&self) -> anyhow::Result<usize>;
}
