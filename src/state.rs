use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::config::AppConfig;
use crate::errors::AppError;
use crate::services::ai::groq::GroqProvider;
use crate::services::ai::ollama::OllamaProvider;
use crate::services::ai::LlmProvider;
use crate::services::events::ChangeNotifier;
use crate::services::storage::sqlite::{SqliteAppointmentStore, SqliteSessionStore};
use crate::services::storage::{AppointmentStore, SessionStore};

pub struct AppState {
    pub config: AppConfig,
    pub llm: Box<dyn LlmProvider>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub notifier: ChangeNotifier,
}

impl AppState {
    /// SQLite-backed stores sharing one connection and one change notifier.
    pub fn new(config: AppConfig, conn: Connection, llm: Box<dyn LlmProvider>) -> Self {
        let db = Arc::new(Mutex::new(conn));
        let notifier = ChangeNotifier::default();

        Self {
            appointments: Arc::new(SqliteAppointmentStore::new(db.clone(), notifier.clone())),
            sessions: Arc::new(SqliteSessionStore::new(db, notifier.clone())),
            notifier,
            config,
            llm,
        }
    }
}

pub fn build_llm(config: &AppConfig) -> Result<Box<dyn LlmProvider>, AppError> {
    match config.llm_provider.as_str() {
        "groq" => {
            if config.groq_api_key.is_empty() {
                return Err(AppError::Config(
                    "GROQ_API_KEY must be set when LLM_PROVIDER=groq".to_string(),
                ));
            }
            tracing::info!(model = %config.groq_model, "using groq provider");
            Ok(Box::new(GroqProvider::new(
                config.groq_api_key.clone(),
                config.groq_model.clone(),
            )))
        }
        "ollama" => {
            tracing::info!(url = %config.ollama_url, model = %config.ollama_model, "using ollama provider");
            Ok(Box::new(OllamaProvider::new(
                config.ollama_url.clone(),
                config.ollama_model.clone(),
            )))
        }
        other => Err(AppError::Config(format!(
            "unknown LLM_PROVIDER {other:?}, expected \"groq\" or \"ollama\""
        ))),
    }
}
