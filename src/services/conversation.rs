use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::{
    BookingConfirmation, BookingDraft, BookingRequest, ConversationTurn, DialogueResult, Session,
    SessionState,
};
use crate::services::booking;
use crate::services::dialogue::{DialogueEngine, Stage};
use crate::state::AppState;

const AFFIRMATIVE: [&str; 9] = [
    "yes", "y", "yeah", "yep", "sure", "ok", "okay", "confirm", "correct",
];
const RESTART: &str = "No problem. Let's start over. What is your full name?";
const BOOKING_FAILED: &str =
    "I'm sorry, but something went wrong while booking. Please try again later.";
const REDIRECT: &str = "I'll redirect you to the confirmation page.";

/// What the chat client receives after every step.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReply {
    pub session_id: String,
    pub reply: String,
    pub suggestions: Vec<String>,
    pub is_complete: bool,
    pub state: SessionState,
    pub draft: BookingDraft,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment: Option<BookingConfirmation>,
}

impl ChatReply {
    fn from_session(session: &Session, reply: String, suggestions: Vec<String>) -> Self {
        Self {
            session_id: session.id.clone(),
            reply,
            suggestions,
            is_complete: session.state == SessionState::Confirming,
            state: session.state.clone(),
            draft: session.draft.clone(),
            success: true,
            error: None,
            appointment: None,
        }
    }
}

fn engine(state: &AppState) -> DialogueEngine<'_> {
    DialogueEngine::new(
        state.llm.as_ref(),
        state.appointments.as_ref(),
        &state.config.time_slots,
    )
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Opens a session and asks the first question.
pub async fn start_session(state: &Arc<AppState>) -> Result<ChatReply, AppError> {
    let mut session = Session::new(
        uuid::Uuid::new_v4().to_string(),
        state.config.session_ttl_minutes,
    );

    let result = engine(state)
        .next_question(&session.history, &session.draft, today())
        .await;
    let reply = apply(&mut session, result);

    state.sessions.save(&session)?;
    tracing::info!(session = %session.id, "chat session started");
    Ok(reply)
}

pub async fn process_message(
    state: &Arc<AppState>,
    session_id: &str,
    message: &str,
) -> Result<ChatReply, AppError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(AppError::Validation("message must not be empty".to_string()));
    }

    let ttl = state.config.session_ttl_minutes;
    let mut session = state
        .sessions
        .load(session_id)?
        .unwrap_or_else(|| Session::new(session_id, ttl));

    let stage = Stage::for_session(&session, &state.config.time_slots);
    if stage == Stage::Done {
        tracing::info!(session = %session.id, "booked session received a new message, restarting");
        session.restart();
    }

    session.history.push(ConversationTurn::user(message));

    tracing::info!(
        session = %session.id,
        state = session.state.as_str(),
        ?stage,
        turns = session.history.len(),
        missing = ?session.draft.missing_fields(),
        "processing message"
    );

    let reply = match session.state {
        SessionState::Confirming => confirm(state, &mut session, message).await,
        _ => {
            let result = engine(state)
                .next_question(&session.history, &session.draft, today())
                .await;
            apply(&mut session, result)
        }
    };

    session.touch(ttl);
    state.sessions.save(&session)?;
    Ok(reply)
}

/// Merges a dialogue step into the session and records the assistant turn.
fn apply(session: &mut Session, result: DialogueResult) -> ChatReply {
    session.draft.merge(&result.updated_data);
    if result.is_complete {
        session.state = SessionState::Confirming;
    }
    session
        .history
        .push(ConversationTurn::assistant(result.next_question.clone()));

    ChatReply::from_session(session, result.next_question, result.suggestions.unwrap_or_default())
}

async fn confirm(state: &Arc<AppState>, session: &mut Session, answer: &str) -> ChatReply {
    if !is_affirmative(answer) {
        tracing::info!(session = %session.id, "booking declined, starting over");
        session.restart();
        session.history.push(ConversationTurn::assistant(RESTART));
        return ChatReply::from_session(session, RESTART.to_string(), vec![]);
    }

    let request = BookingRequest::from(&session.draft);
    match booking::finalize(
        state.appointments.as_ref(),
        &state.config.time_slots,
        &request,
    ) {
        Ok(confirmation) => {
            session.state = SessionState::Booked;
            session.appointment_id = Some(confirmation.id.clone());

            let text = format!("{} {REDIRECT}", confirmation.confirmation_message);
            session.history.push(ConversationTurn::assistant(text.clone()));

            let mut reply = ChatReply::from_session(session, text, vec![]);
            reply.appointment = Some(confirmation);
            reply
        }
        Err(AppError::Conflict(slot)) => {
            // Keep the date, drop the time, and offer what is left.
            let date = state
                .config
                .time_slots
                .split_scheduled(&slot)
                .map(|(_, day)| day.to_string());
            session.draft.preferred_time_slot = date;
            session.state = SessionState::Collecting;

            let mut result = engine(state).reprompt(&session.draft);
            result.next_question = format!(
                "Sorry, {slot} was just booked by someone else. {}",
                result.next_question
            );
            apply(session, result)
        }
        Err(e) => {
            tracing::warn!(session = %session.id, error = %e, "booking failed");
            session
                .history
                .push(ConversationTurn::assistant(BOOKING_FAILED));

            let mut reply = ChatReply::from_session(session, BOOKING_FAILED.to_string(), vec![]);
            reply.success = false;
            reply.error = Some(e.to_string());
            reply
        }
    }
}

fn is_affirmative(answer: &str) -> bool {
    answer
        .split_whitespace()
        .next()
        .map(|word| {
            let word = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            AFFIRMATIVE.contains(&word.as_str())
        })
        .unwrap_or(false)
}
