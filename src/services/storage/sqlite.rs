use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use super::{AppointmentStore, SessionStore};
use crate::db::queries;
use crate::models::{Appointment, AppointmentStatus, NewAppointment, Session};
use crate::services::events::{session_key, ChangeKind, ChangeNotifier, APPOINTMENTS_KEY};

fn lock(db: &Mutex<Connection>) -> anyhow::Result<MutexGuard<'_, Connection>> {
    db.lock()
        .map_err(|_| anyhow::anyhow!("database connection lock poisoned"))
}

pub struct SqliteAppointmentStore {
    db: Arc<Mutex<Connection>>,
    notifier: ChangeNotifier,
}

impl SqliteAppointmentStore {
    pub fn new(db: Arc<Mutex<Connection>>, notifier: ChangeNotifier) -> Self {
        Self { db, notifier }
    }
}

impl AppointmentStore for SqliteAppointmentStore {
    fn append(&self, appointment: &NewAppointment) -> anyhow::Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        {
            let conn = lock(&self.db)?;
            queries::insert_appointment(&conn, &id, appointment)?;
        }
        self.notifier
            .publish(APPOINTMENTS_KEY, ChangeKind::Created, Some(&id));
        Ok(id)
    }

    fn list_all(&self) -> anyhow::Result<Vec<Appointment>> {
        let conn = lock(&self.db)?;
        queries::list_appointments(&conn)
    }

    fn get_by_id(&self, id: &str) -> anyhow::Result<Option<Appointment>> {
        let conn = lock(&self.db)?;
        queries::get_appointment_by_id(&conn, id)
    }

    fn update_field(&self, id: &str, field: &str, value: &str) -> anyhow::Result<bool> {
        let updated = match field {
            "status" => {
                let status = AppointmentStatus::parse(value)
                    .ok_or_else(|| anyhow::anyhow!("invalid appointment status: {value:?}"))?;
                let conn = lock(&self.db)?;
                queries::update_appointment_status(&conn, id, status)?
            }
            other => anyhow::bail!("appointment field {other:?} cannot be updated"),
        };

        if updated {
            self.notifier
                .publish(APPOINTMENTS_KEY, ChangeKind::Updated, Some(id));
        }
        Ok(updated)
    }

    fn delete_by_id(&self, id: &str) -> anyhow::Result<bool> {
        let deleted = {
            let conn = lock(&self.db)?;
            queries::delete_appointment(&conn, id)?
        };
        if deleted {
            self.notifier
                .publish(APPOINTMENTS_KEY, ChangeKind::Deleted, Some(id));
        }
        Ok(deleted)
    }

    fn clear_all(&self) -> anyhow::Result<usize> {
        let count = {
            let conn = lock(&self.db)?;
            queries::clear_appointments(&conn)?
        };
        self.notifier
            .publish(APPOINTMENTS_KEY, ChangeKind::Cleared, None);
        Ok(count)
    }
}

pub struct SqliteSessionStore {
    db: Arc<Mutex<Connection>>,
    notifier: ChangeNotifier,
}

impl SqliteSessionStore {
    pub fn new(db: Arc<Mutex<Connection>>, notifier: ChangeNotifier) -> Self {
        Self { db, notifier }
    }
}

impl SessionStore for SqliteSessionStore {
    fn load(&self, id: &str) -> anyhow::Result<Option<Session>> {
        let conn = lock(&self.db)?;
        queries::get_session(&conn, id)
    }

    fn save(&self, session: &Session) -> anyhow::Result<()> {
        {
            let conn = lock(&self.db)?;
            queries::save_session(&conn, session)?;
        }
        self.notifier
            .publish(&session_key(&session.id), ChangeKind::Updated, Some(&session.id));
        Ok(())
    }

    fn remove(&self, id: &str) -> anyhow::Result<bool> {
        let removed = {
            let conn = lock(&self.db)?;
            queries::delete_session(&conn, id)?
        };
        if removed {
            self.notifier
                .publish(&session_key(id), ChangeKind::Deleted, Some(id));
        }
        Ok(removed)
    }

    fn expire_old(&self) -> anyhow::Result<usize> {
        let conn = lock(&self.db)?;
        queries::expire_old_sessions(&conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::BookedVia;
    use std::time::Duration;
    use tokio_stream::StreamExt;

    fn shared_db() -> Arc<Mutex<Connection>> {
        Arc::new(Mutex::new(db::init_db(":memory:").unwrap()))
    }

    fn sample() -> NewAppointment {
        NewAppointment {
            appointment_id: "appt-abc1234".to_string(),
            patient_name: "Jane Roe".to_string(),
            phone_number: "5551234567".to_string(),
            problem: "sore throat".to_string(),
            preferred_time_slot: "9:00 AM on Wed Jul 10 2024".to_string(),
            confirmation_message: "Confirmed".to_string(),
            booked_via: BookedVia::Chatbot,
            created_at: chrono::Utc::now(),
            status: AppointmentStatus::Pending,
            is_emergency: false,
        }
    }

    #[tokio::test]
    async fn test_append_publishes_change() {
        let notifier = ChangeNotifier::default();
        let store = SqliteAppointmentStore::new(shared_db(), notifier.clone());
        let mut events = Box::pin(notifier.subscribe(APPOINTMENTS_KEY));

        let id = store.append(&sample()).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(1), events.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.kind, ChangeKind::Created);
        assert_eq!(event.id, Some(id.clone()));
        assert_eq!(store.get_by_id(&id).unwrap().unwrap().appointment_id, "appt-abc1234");
    }

    #[test]
    fn test_update_field_only_accepts_status() {
        let store = SqliteAppointmentStore::new(shared_db(), ChangeNotifier::default());
        let id = store.append(&sample()).unwrap();

        assert!(store.update_field(&id, "status", "appointed").unwrap());
        assert_eq!(
            store.get_by_id(&id).unwrap().unwrap().status,
            AppointmentStatus::Appointed
        );
        assert!(store.update_field(&id, "status", "cancelled").is_err());
        assert!(store.update_field(&id, "problem", "other").is_err());
        assert!(!store.update_field("missing", "status", "on hold").unwrap());
    }

    #[test]
    fn test_clear_all() {
        let store = SqliteAppointmentStore::new(shared_db(), ChangeNotifier::default());
        let mut second = sample();
        second.appointment_id = "appt-def5678".to_string();
        store.append(&sample()).unwrap();
        store.append(&second).unwrap();

        assert_eq!(store.clear_all().unwrap(), 2);
        assert!(store.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_appointment_id_must_be_unique() {
        let store = SqliteAppointmentStore::new(shared_db(), ChangeNotifier::default());
        store.append(&sample()).unwrap();

        let mut other_slot = sample();
        other_slot.preferred_time_slot = "2:00 PM on Wed Jul 10 2024".to_string();
        assert!(store.append(&other_slot).is_err());
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_session_store_remove() {
        let store = SqliteSessionStore::new(shared_db(), ChangeNotifier::default());
        store.save(&Session::new("s-1", 30)).unwrap();
        assert!(store.load("s-1").unwrap().is_some());
        assert!(store.remove("s-1").unwrap());
        assert!(store.load("s-1").unwrap().is_none());
    }
}
