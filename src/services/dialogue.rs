use chrono::{Datelike, Days, NaiveDate, Weekday};

use crate::models::draft::{normalize_phone, validate_name, validate_problem};
use crate::models::time_slots::{combine, format_date, parse_calendar_date};
use crate::models::{
    BookingDraft, ConversationTurn, DialogueResult, Role, Session, SessionState, TimeSlotCatalog,
    EMERGENCY_SLOT,
};
use crate::services::ai::extraction::{self, DateContext, Extraction};
use crate::services::ai::LlmProvider;
use crate::services::availability::AvailabilityResolver;
use crate::services::storage::AppointmentStore;

const GREETING: &str = "Hello! I can help you book an appointment at the clinic.";
const NAME_QUESTION: &str = "To start, could you please provide your full name?";
const PROBLEM_QUESTION: &str =
    "Got it. Could you briefly describe the medical problem or concern you'd like to be seen for?";
const DATE_QUESTION: &str =
    "What date would you like to come in? You can say today, tomorrow, or give a specific date.";
const PHONE_REASK: &str =
    "The phone number must be exactly 10 digits. Could you please provide it again?";
const REPHRASE: &str = "I'm sorry, I'm having trouble understanding. Could you please rephrase?";
const STARTUP_TROUBLE: &str = "I'm having trouble starting up. Please try again in a moment.";
const UNAVAILABLE: &str =
    "I'm sorry, I can't reach the scheduling system right now. Please try again in a moment.";
const ALREADY_BOOKED: &str =
    "Your appointment is already booked. Send a new message if you'd like to book another one.";
const NOT_PROVIDED: &str = "not provided";

/// The first missing requirement of a booking, in collection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Name,
    Phone,
    Problem,
    Date,
    Time,
    Confirm,
    Done,
}

impl Stage {
    /// Derived purely from the draft. `Done` is only reached once a session is booked.
    pub fn of(draft: &BookingDraft, catalog: &TimeSlotCatalog) -> Self {
        if draft.is_emergency() {
            return Stage::Confirm;
        }
        if !filled(&draft.patient_name) {
            return Stage::Name;
        }
        if !draft.has_valid_phone() {
            return Stage::Phone;
        }
        if !filled(&draft.problem) {
            return Stage::Problem;
        }
        match draft.preferred_time_slot.as_deref().map(str::trim) {
            Some(slot) if catalog.split_scheduled(slot).is_some() => Stage::Confirm,
            Some(slot) if parse_calendar_date(slot).is_some() => Stage::Time,
            _ => Stage::Date,
        }
    }

    pub fn for_session(session: &Session, catalog: &TimeSlotCatalog) -> Self {
        if session.state == SessionState::Booked {
            Stage::Done
        } else {
            Stage::of(&session.draft, catalog)
        }
    }
}

fn filled(v: &Option<String>) -> bool {
    v.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
}

enum DateOutcome {
    Open(NaiveDate, Vec<String>),
    Reask(String),
    Unavailable,
}

/// Decides the next question of a booking conversation.
///
/// The model only reads values out of the conversation. Ordering, validation,
/// availability and every reply are decided here.
pub struct DialogueEngine<'a> {
    llm: &'a dyn LlmProvider,
    availability: AvailabilityResolver<'a>,
    catalog: &'a TimeSlotCatalog,
}

impl<'a> DialogueEngine<'a> {
    pub fn new(
        llm: &'a dyn LlmProvider,
        store: &'a dyn AppointmentStore,
        catalog: &'a TimeSlotCatalog,
    ) -> Self {
        Self {
            llm,
            availability: AvailabilityResolver::new(store, catalog),
            catalog,
        }
    }

    /// One dialogue step. Never fails: every failure becomes a user-facing reply.
    pub async fn next_question(
        &self,
        history: &[ConversationTurn],
        current: &BookingDraft,
        today: NaiveDate,
    ) -> DialogueResult {
        let stage = Stage::of(current, self.catalog);
        let started = history.iter().any(|t| t.role == Role::Assistant);

        if !matches!(history.last(), Some(turn) if turn.role == Role::User) {
            return self.prompt(stage, current, BookingDraft::default(), None, started);
        }

        let extracted =
            match extraction::extract(self.llm, history, current, &DateContext::new(today)).await {
                Ok(extracted) => extracted,
                Err(e) => {
                    tracing::warn!(error = %e, ?stage, "could not extract booking details");
                    return DialogueResult::message(if started { REPHRASE } else { STARTUP_TROUBLE });
                }
            };

        if extracted.is_emergency && !current.is_emergency() {
            return self.emergency(current, &extracted);
        }

        self.advance(stage, current, &extracted, today)
    }

    /// Asks for whatever the draft still lacks without consulting the model.
    pub fn reprompt(&self, current: &BookingDraft) -> DialogueResult {
        self.prompt(Stage::of(current, self.catalog), current, BookingDraft::default(), None, true)
    }

    /// Accepts extracted values one stage at a time, stopping at the first
    /// stage the extraction does not satisfy.
    fn advance(
        &self,
        mut stage: Stage,
        current: &BookingDraft,
        extracted: &Extraction,
        today: NaiveDate,
    ) -> DialogueResult {
        let mut draft = current.clone();
        let mut updates = BookingDraft::default();
        let mut open: Option<(NaiveDate, Vec<String>)> = None;

        loop {
            match stage {
                Stage::Name => match extracted.patient_name.as_deref().map(validate_name) {
                    Some(Ok(name)) => {
                        draft.patient_name = Some(name.clone());
                        updates.patient_name = Some(name);
                    }
                    _ => break,
                },
                Stage::Phone => {
                    let Some(raw) = extracted.phone_number.as_deref() else {
                        break;
                    };
                    match normalize_phone(raw) {
                        Ok(phone) => {
                            draft.phone_number = Some(phone.clone());
                            updates.phone_number = Some(phone);
                        }
                        Err(_) => {
                            tracing::debug!("rejected phone number with wrong digit count");
                            return reask(updates, PHONE_REASK, None);
                        }
                    }
                }
                Stage::Problem => match extracted.problem.as_deref().map(validate_problem) {
                    Some(Ok(problem)) => {
                        draft.problem = Some(problem.clone());
                        updates.problem = Some(problem);
                    }
                    _ => break,
                },
                Stage::Date => {
                    let Some(raw) = extracted.preferred_date.as_deref() else {
                        break;
                    };
                    match self.accept_date(raw, today) {
                        DateOutcome::Open(date, slots) => {
                            let label = format_date(date);
                            draft.preferred_time_slot = Some(label.clone());
                            updates.preferred_time_slot = Some(label);
                            open = Some((date, slots));
                        }
                        DateOutcome::Reask(text) => return reask(updates, text, None),
                        DateOutcome::Unavailable => return DialogueResult::message(UNAVAILABLE),
                    }
                }
                Stage::Time => {
                    let Some(date) = draft.preferred_time_slot.as_deref().and_then(parse_calendar_date)
                    else {
                        break;
                    };

                    // A different day named while choosing a time replaces the date.
                    if let Some(new_date) = extracted
                        .preferred_date
                        .as_deref()
                        .and_then(|raw| resolve_date(raw, today))
                    {
                        if new_date != date {
                            draft.preferred_time_slot = None;
                            stage = Stage::Date;
                            continue;
                        }
                    }

                    let Some(raw_time) = extracted.preferred_time.as_deref() else {
                        break;
                    };

                    let slots = match open.take() {
                        Some((d, slots)) if d == date => slots,
                        _ => match self.availability.open_slots(date) {
                            Ok(slots) => slots,
                            Err(_) => return DialogueResult::message(UNAVAILABLE),
                        },
                    };

                    let date_label = format_date(date);
                    match self.catalog.match_label(raw_time) {
                        Some(label) if slots.iter().any(|s| s == label) => {
                            let slot = combine(label, &date_label);
                            draft.preferred_time_slot = Some(slot.clone());
                            updates.preferred_time_slot = Some(slot);
                        }
                        Some(label) => {
                            let text = format!(
                                "Sorry, {label} is already taken on {date_label}. Please choose one of the available times."
                            );
                            return reask(updates, text, Some(slots));
                        }
                        None => {
                            let text = format!(
                                "Please choose one of the available times on {date_label}."
                            );
                            return reask(updates, text, Some(slots));
                        }
                    }
                }
                Stage::Confirm | Stage::Done => break,
            }
            stage = Stage::of(&draft, self.catalog);
        }

        self.prompt(stage, &draft, updates, open, true)
    }

    fn accept_date(&self, raw: &str, today: NaiveDate) -> DateOutcome {
        let Some(date) = resolve_date(raw, today) else {
            return DateOutcome::Reask(format!(
                "I couldn't work out a date from \"{raw}\". Could you give a date like tomorrow or July 10?"
            ));
        };
        if date < today {
            return DateOutcome::Reask(format!(
                "{} has already passed. Which upcoming date would you like?",
                format_date(date)
            ));
        }

        match self.availability.open_slots(date) {
            Ok(slots) if slots.is_empty() => DateOutcome::Reask(fully_booked(date)),
            Ok(slots) => DateOutcome::Open(date, slots),
            Err(_) => DateOutcome::Unavailable,
        }
    }

    /// Fills whatever valid details came with the emergency and skips the rest.
    fn emergency(&self, current: &BookingDraft, extracted: &Extraction) -> DialogueResult {
        let mut updates = BookingDraft::default();

        if !filled(&current.patient_name) {
            updates.patient_name = extracted
                .patient_name
                .as_deref()
                .and_then(|n| validate_name(n).ok());
        }
        if !current.has_valid_phone() {
            updates.phone_number = extracted
                .phone_number
                .as_deref()
                .and_then(|p| normalize_phone(p).ok());
        }
        if !filled(&current.problem) {
            updates.problem = extracted
                .problem
                .as_deref()
                .and_then(|p| validate_problem(p).ok());
        }
        updates.is_emergency = Some(true);
        updates.preferred_time_slot = Some(EMERGENCY_SLOT.to_string());

        let mut draft = current.clone();
        draft.merge(&updates);
        tracing::info!("emergency detected, skipping remaining details");

        DialogueResult {
            next_question: summary(&draft),
            is_complete: true,
            updated_data: updates,
            suggestions: None,
        }
    }

    fn prompt(
        &self,
        stage: Stage,
        draft: &BookingDraft,
        updates: BookingDraft,
        open: Option<(NaiveDate, Vec<String>)>,
        started: bool,
    ) -> DialogueResult {
        let text = match stage {
            Stage::Name if started => NAME_QUESTION.to_string(),
            Stage::Name => format!("{GREETING} {NAME_QUESTION}"),
            Stage::Phone => format!(
                "Thanks, {}. What's the best phone number to reach you at?",
                draft.patient_name.as_deref().unwrap_or("there")
            ),
            Stage::Problem => PROBLEM_QUESTION.to_string(),
            Stage::Date => DATE_QUESTION.to_string(),
            Stage::Time => {
                let Some(date) = draft.preferred_time_slot.as_deref().and_then(parse_calendar_date)
                else {
                    return reask(updates, DATE_QUESTION, None);
                };
                let slots = match open {
                    Some((d, slots)) if d == date => slots,
                    _ => match self.availability.open_slots(date) {
                        Ok(slots) => slots,
                        Err(_) => return DialogueResult::message(UNAVAILABLE),
                    },
                };
                if slots.is_empty() {
                    return reask(updates, fully_booked(date), None);
                }
                let text = format!(
                    "Here are the available times on {}. Which one works best for you?",
                    format_date(date)
                );
                return reask(updates, text, Some(slots));
            }
            Stage::Confirm => {
                return DialogueResult {
                    next_question: summary(draft),
                    is_complete: true,
                    updated_data: updates,
                    suggestions: None,
                }
            }
            Stage::Done => ALREADY_BOOKED.to_string(),
        };

        reask(updates, text, None)
    }
}

fn reask(
    updates: BookingDraft,
    text: impl Into<String>,
    suggestions: Option<Vec<String>>,
) -> DialogueResult {
    DialogueResult {
        next_question: text.into(),
        is_complete: false,
        updated_data: updates,
        suggestions,
    }
}

fn fully_booked(date: NaiveDate) -> String {
    format!(
        "Sorry, there are no open times left on {}. Could you choose another date?",
        format_date(date)
    )
}

/// The confirmation question for a complete draft.
pub fn summary(draft: &BookingDraft) -> String {
    let name = draft.patient_name.as_deref().unwrap_or(NOT_PROVIDED);
    let phone = draft.phone_number.as_deref().unwrap_or(NOT_PROVIDED);
    let problem = draft.problem.as_deref().unwrap_or(NOT_PROVIDED);

    if draft.is_emergency() {
        format!(
            "This seems to be an emergency. I have your name as {name}, phone as {phone}, and reason as '{problem}'. I am marking this as an immediate emergency appointment. Is this correct?"
        )
    } else {
        let slot = draft.preferred_time_slot.as_deref().unwrap_or(NOT_PROVIDED);
        format!(
            "Great, I have all the details. I've got your name as {name}, phone as {phone}, reason for visit as '{problem}', and preferred time as '{slot}'. Can I go ahead and book this?"
        )
    }
}

/// Resolves relative words, weekday names, absolute dates and year-less
/// dates against `today`. Weekdays and year-less dates mean the next occurrence.
pub fn resolve_date(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    let cleaned = input
        .trim()
        .trim_end_matches(['.', '!', '?'])
        .trim()
        .to_lowercase();
    let cleaned = cleaned.strip_prefix("the ").unwrap_or(&cleaned);

    match cleaned {
        "today" => return Some(today),
        "tomorrow" => return today.checked_add_days(Days::new(1)),
        "day after tomorrow" => return today.checked_add_days(Days::new(2)),
        _ => {}
    }

    if let Some(date) = parse_calendar_date(input) {
        return Some(date);
    }

    let day_name = cleaned
        .strip_prefix("next ")
        .or_else(|| cleaned.strip_prefix("this "))
        .or_else(|| cleaned.strip_prefix("on "))
        .unwrap_or(cleaned);
    if let Ok(weekday) = day_name.parse::<Weekday>() {
        return (1..=7)
            .filter_map(|n| today.checked_add_days(Days::new(n)))
            .find(|d| d.weekday() == weekday);
    }

    let trimmed = input.trim().trim_end_matches(',');
    let this_year = parse_calendar_date(&format!("{trimmed} {}", today.year()))?;
    if this_year >= today {
        Some(this_year)
    } else {
        this_year.with_year(today.year() + 1)
    }
}
