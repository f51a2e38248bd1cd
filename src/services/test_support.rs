use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::db;
use crate::models::{
    Appointment, AppointmentStatus, BookedVia, NewAppointment, Session,
};
use crate::services::ai::{LlmProvider, Message};
use crate::services::events::ChangeNotifier;
use crate::services::storage::sqlite::SqliteAppointmentStore;
use crate::services::storage::{AppointmentStore, SessionStore};

/// Replies with queued responses in order; an empty queue is an error.
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<anyhow::Result<String>>>,
}

impl ScriptedLlm {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
        }
    }

    pub fn failing() -> Self {
        Self {
            replies: Mutex::new(VecDeque::from([Err(anyhow::anyhow!("model offline"))])),
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn chat(&self, _system_prompt: &str, _messages: &[Message]) -> anyhow::Result<String> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("no scripted reply left")))
    }
}

/// Every call fails, as if the database were unreachable.
pub struct FailingStore;

impl AppointmentStore for FailingStore {
    fn append(&self, _appointment: &NewAppointment) -> anyhow::Result<String> {
        anyhow::bail!("database unavailable")
    }
    fn list_all(&self) -> anyhow::Result<Vec<Appointment>> {
        anyhow::bail!("database unavailable")
    }
    fn get_by_id(&self, _id: &str) -> anyhow::Result<Option<Appointment>> {
        anyhow::bail!("database unavailable")
    }
    fn update_field(&self, _id: &str, _field: &str, _value: &str) -> anyhow::Result<bool> {
        anyhow::bail!("database unavailable")
    }
    fn delete_by_id(&self, _id: &str) -> anyhow::Result<bool> {
        anyhow::bail!("database unavailable")
    }
    fn clear_all(&self) -> anyhow::Result<usize> {
        anyhow::bail!("database unavailable")
    }
}

/// Reads work, writes fail.
pub struct ReadOnlyStore(pub SqliteAppointmentStore);

impl AppointmentStore for ReadOnlyStore {
    fn append(&self, _appointment: &NewAppointment) -> anyhow::Result<String> {
        anyhow::bail!("database is read-only")
    }
    fn list_all(&self) -> anyhow::Result<Vec<Appointment>> {
        self.0.list_all()
    }
    fn get_by_id(&self, id: &str) -> anyhow::Result<Option<Appointment>> {
        self.0.get_by_id(id)
    }
    fn update_field(&self, _id: &str, _field: &str, _value: &str) -> anyhow::Result<bool> {
        anyhow::bail!("database is read-only")
    }
    fn delete_by_id(&self, _id: &str) -> anyhow::Result<bool> {
        anyhow::bail!("database is read-only")
    }
    fn clear_all(&self) -> anyhow::Result<usize> {
        anyhow::bail!("database is read-only")
    }
}

pub struct NoSessions;

impl SessionStore for NoSessions {
    fn load(&self, _id: &str) -> anyhow::Result<Option<Session>> {
        Ok(None)
    }
    fn save(&self, _session: &Session) -> anyhow::Result<()> {
        Ok(())
    }
    fn remove(&self, _id: &str) -> anyhow::Result<bool> {
        Ok(false)
    }
    fn expire_old(&self) -> anyhow::Result<usize> {
        Ok(0)
    }
}

pub fn memory_store() -> SqliteAppointmentStore {
    let conn = db::init_db(":memory:").unwrap();
    SqliteAppointmentStore::new(Arc::new(Mutex::new(conn)), ChangeNotifier::default())
}

/// A stored appointment on `slot` under a fresh appointment id.
pub fn booked(slot: &str) -> NewAppointment {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    NewAppointment {
        appointment_id: format!("appt-{}", &suffix[..7]),
        patient_name: "Someone Else".to_string(),
        phone_number: "5550000000".to_string(),
        problem: "checkup".to_string(),
        preferred_time_slot: slot.to_string(),
        confirmation_message: "Confirmed".to_string(),
        booked_via: BookedVia::Chatbot,
        created_at: chrono::Utc::now(),
        status: AppointmentStatus::Pending,
        is_emergency: false,
    }
}
