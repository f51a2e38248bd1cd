use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::models::{
    Appointment, AppointmentStatus, BookedVia, BookingDraft, ConversationTurn, NewAppointment,
    Session, SessionState,
};

const SESSION_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const APPOINTMENT_COLUMNS: &str = "id, appointment_id, patient_name, phone_number, problem, \
     preferred_time_slot, confirmation_message, booked_via, created_at, status, is_emergency";

// ── Appointments ──

pub fn insert_appointment(conn: &Connection, id: &str, appt: &NewAppointment) -> anyhow::Result<()> {
    let created_at = appt.created_at.to_rfc3339_opts(SecondsFormat::Millis, true);

    conn.execute(
        "INSERT INTO appointments (id, appointment_id, patient_name, phone_number, problem, preferred_time_slot, confirmation_message, booked_via, created_at, status, is_emergency)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            id,
            appt.appointment_id,
            appt.patient_name,
            appt.phone_number,
            appt.problem,
            appt.preferred_time_slot,
            appt.confirmation_message,
            appt.booked_via.as_str(),
            created_at,
            appt.status.as_str(),
            appt.is_emergency,
        ],
    )?;
    Ok(())
}

/// Newest first.
pub fn list_appointments(conn: &Connection) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments ORDER BY created_at DESC, rowid DESC"
    ))?;

    let rows = stmt.query_map([], |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub fn get_appointment_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"
    ))?;

    let row = stmt
        .query_row(params![id], |row| Ok(parse_appointment_row(row)))
        .optional()?;

    row.transpose()
}

pub fn update_appointment_status(
    conn: &Connection,
    id: &str,
    status: AppointmentStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE appointments SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(count > 0)
}

pub fn delete_appointment(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM appointments WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn clear_appointments(conn: &Connection) -> anyhow::Result<usize> {
    let count = conn.execute("DELETE FROM appointments", [])?;
    Ok(count)
}

fn parse_appointment_row(row: &Row<'_>) -> anyhow::Result<Appointment> {
    let created_at_str: String = row.get(8)?;
    let status_str: String = row.get(9)?;
    let booked_via_str: String = row.get(7)?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| anyhow::anyhow!("invalid created_at {created_at_str:?}: {e}"))?;
    let status = AppointmentStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("invalid appointment status: {status_str:?}"))?;

    Ok(Appointment {
        id: row.get(0)?,
        appointment_id: row.get(1)?,
        patient_name: row.get(2)?,
        phone_number: row.get(3)?,
        problem: row.get(4)?,
        preferred_time_slot: row.get(5)?,
        confirmation_message: row.get(6)?,
        booked_via: BookedVia::parse(&booked_via_str),
        created_at,
        status,
        is_emergency: row.get(10)?,
    })
}

// ── Sessions ──

pub fn get_session(conn: &Connection, id: &str) -> anyhow::Result<Option<Session>> {
    let now = Utc::now().naive_utc().format(SESSION_TIME_FORMAT).to_string();
    let mut stmt = conn.prepare(
        "SELECT id, history, draft, state, appointment_id, last_activity, expires_at
         FROM sessions WHERE id = ?1 AND expires_at > ?2",
    )?;

    let result = stmt
        .query_row(params![id, now], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })
        .optional()?;

    let Some((id, history_json, draft_json, state_str, appointment_id, last_activity, expires_at)) =
        result
    else {
        return Ok(None);
    };

    let history: Vec<ConversationTurn> = serde_json::from_str(&history_json)?;
    let draft: BookingDraft = serde_json::from_str(&draft_json)?;

    Ok(Some(Session {
        id,
        history,
        draft,
        state: SessionState::parse(&state_str),
        appointment_id,
        last_activity: parse_session_time(&last_activity),
        expires_at: parse_session_time(&expires_at),
    }))
}

pub fn save_session(conn: &Connection, session: &Session) -> anyhow::Result<()> {
    let history_json = serde_json::to_string(&session.history)?;
    let draft_json = serde_json::to_string(&session.draft)?;
    let last_activity = session.last_activity.format(SESSION_TIME_FORMAT).to_string();
    let expires_at = session.expires_at.format(SESSION_TIME_FORMAT).to_string();

    conn.execute(
        "INSERT INTO sessions (id, history, draft, state, appointment_id, last_activity, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(id) DO UPDATE SET
           history = excluded.history,
           draft = excluded.draft,
           state = excluded.state,
           appointment_id = excluded.appointment_id,
           last_activity = excluded.last_activity,
           expires_at = excluded.expires_at",
        params![
            session.id,
            history_json,
            draft_json,
            session.state.as_str(),
            session.appointment_id,
            last_activity,
            expires_at,
        ],
    )?;
    Ok(())
}

pub fn delete_session(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

pub fn expire_old_sessions(conn: &Connection) -> anyhow::Result<usize> {
    let now = Utc::now().naive_utc().format(SESSION_TIME_FORMAT).to_string();
    let count = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", params![now])?;
    Ok(count)
}

fn parse_session_time(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, SESSION_TIME_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}
