use chrono::{Days, NaiveDate};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::models::time_slots::format_date;
use crate::models::{BookingDraft, ConversationTurn};
use crate::services::ai::{LlmProvider, Message};

const SYSTEM_PROMPT: &str = r#"You extract appointment details for a medical clinic's booking assistant. Read the conversation and report what the patient has told you.

Return ONLY valid JSON (no markdown, no explanation) with this exact structure:
{
  "patient_name": "the patient's full name or null",
  "phone_number": "the phone number exactly as the patient typed it, or null",
  "problem": "a brief description of the medical problem or concern, or null",
  "preferred_date": "the requested appointment date or null",
  "preferred_time": "the requested time of day or null",
  "is_emergency": false
}

Rules:
- Only report what the patient actually said. Never invent or guess values.
- Prefer the patient's latest message. Earlier messages may fill fields that are still missing from the collected data.
- Copy the phone number as written, even if it looks wrong.
- If the patient uses a relative date ("today", "tomorrow", "day after tomorrow"), convert it with the date context below. Otherwise copy the date as written.
- Report times as written, for example "2:00 PM".
- Set "is_emergency" to true only when the patient expresses urgency such as "as soon as possible", "emergency" or "urgent", or describes a condition needing immediate care.
"#;

/// What the model read out of the conversation. Every field is unvalidated.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Extraction {
    #[serde(default)]
    pub patient_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub problem: Option<String>,
    #[serde(default)]
    pub preferred_date: Option<String>,
    #[serde(default)]
    pub preferred_time: Option<String>,
    pub is_emergency: bool,
}

impl Extraction {
    fn normalized(self) -> Self {
        Self {
            patient_name: clean(self.patient_name),
            phone_number: clean(self.phone_number),
            problem: clean(self.problem),
            preferred_date: clean(self.preferred_date),
            preferred_time: clean(self.preferred_time),
            is_emergency: self.is_emergency,
        }
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

/// Relative day names resolved against today.
#[derive(Debug, Clone, Copy)]
pub struct DateContext {
    pub today: NaiveDate,
}

impl DateContext {
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        for (name, offset) in [("today", 0), ("tomorrow", 1), ("day after tomorrow", 2)] {
            if let Some(day) = self.today.checked_add_days(Days::new(offset)) {
                map.insert(name.to_string(), Value::String(format_date(day)));
            }
        }
        Value::Object(map)
    }
}

pub async fn extract(
    llm: &dyn LlmProvider,
    history: &[ConversationTurn],
    current: &BookingDraft,
    context: &DateContext,
) -> Result<Extraction, AppError> {
    let messages: Vec<Message> = history.iter().map(Message::from).collect();

    let collected = serde_json::to_string(current).map_err(anyhow::Error::from)?;
    let system = format!(
        "{SYSTEM_PROMPT}\nCurrently collected data:\n{collected}\n\nDate context:\n{}",
        context.to_json()
    );

    let response = llm
        .chat(&system, &messages)
        .await
        .map_err(|e| AppError::Understanding(format!("model call failed: {e:#}")))?;

    parse_extraction(&response)
}

fn parse_extraction(response: &str) -> Result<Extraction, AppError> {
    let trimmed = response.trim();
    let cleaned = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned).trim();

    let object = match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start < end => &cleaned[start..=end],
        _ => {
            return Err(AppError::Understanding(
                "model response contains no JSON object".to_string(),
            ))
        }
    };

    serde_json::from_str::<Extraction>(object)
        .map(Extraction::normalized)
        .map_err(|e| AppError::Understanding(format!("model response does not match schema: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_json() {
        let json = r#"{"patient_name":"John Doe","phone_number":"555-123-4567","problem":null,"preferred_date":null,"preferred_time":null,"is_emergency":false}"#;
        let result = parse_extraction(json).unwrap();
        assert_eq!(result.patient_name.as_deref(), Some("John Doe"));
        assert_eq!(result.phone_number.as_deref(), Some("555-123-4567"));
        assert!(result.problem.is_none());
        assert!(!result.is_emergency);
    }

    #[test]
    fn test_parse_fenced_json_with_missing_optionals() {
        let json = "```json\n{\"problem\": \"chest pain\", \"is_emergency\": true}\n```";
        let result = parse_extraction(json).unwrap();
        assert_eq!(result.problem.as_deref(), Some("chest pain"));
        assert!(result.is_emergency);
    }

    #[test]
    fn test_blank_and_null_strings_become_none() {
        let json = r#"{"patient_name":"  ","preferred_time":"null","is_emergency":false}"#;
        let result = parse_extraction(json).unwrap();
        assert!(result.patient_name.is_none());
        assert!(result.preferred_time.is_none());
    }

    #[test]
    fn test_rejects_prose() {
        let err = parse_extraction("Sure! Your name is John.").unwrap_err();
        assert!(matches!(err, AppError::Understanding(_)));
    }

    #[test]
    fn test_rejects_schema_violations() {
        // missing required flag
        assert!(parse_extraction(r#"{"patient_name":"John"}"#).is_err());
        // wrong type
        assert!(parse_extraction(r#"{"patient_name":42,"is_emergency":false}"#).is_err());
        // unknown field
        assert!(parse_extraction(r#"{"intent":"book","is_emergency":false}"#).is_err());
    }

    #[test]
    fn test_date_context_labels() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 10).unwrap();
        let context = DateContext::new(today).to_json();
        assert_eq!(context["today"], "Wed Jul 10 2024");
        assert_eq!(context["tomorrow"], "Thu Jul 11 2024");
        assert_eq!(context["day after tomorrow"], "Fri Jul 12 2024");
    }
}
