//! Webhook adapter: decodes transport updates into engine input and answers
//! inline with the engine's outbound messages. Fatal conversation errors are
//! logged server-side and surfaced to the candidate as plain text, so the
//! webhook itself never fails the transport.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use super::domain::ChatId;
use super::engine::{ConversationEngine, EngineError};
use super::reminders::ReminderQueue;
use super::store::{Directory, InteractionStore};
use super::transport::{CandidateInput, OutboundMessage};

/// One decoded update delivered by the chat transport.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookUpdate {
    pub chat_id: String,
    #[serde(flatten)]
    pub input: CandidateInput,
}

#[derive(Debug, Serialize)]
pub struct WebhookReply {
    pub messages: Vec<OutboundMessage>,
}

/// Router builder exposing the candidate webhook.
pub fn webhook_router<D, I, R>(engine: Arc<ConversationEngine<D, I, R>>) -> Router
where
    D: Directory + 'static,
    I: InteractionStore + 'static,
    R: ReminderQueue + 'static,
{
    Router::new()
        .route("/webhook/update", post(update_handler::<D, I, R>))
        .with_state(engine)
}

pub(crate) async fn update_handler<D, I, R>(
    State(engine): State<Arc<ConversationEngine<D, I, R>>>,
    Json(update): Json<WebhookUpdate>,
) -> Response
where
    D: Directory + 'static,
    I: InteractionStore + 'static,
    R: ReminderQueue + 'static,
{
    let chat = ChatId(update.chat_id);
    match engine.handle(&chat, update.input) {
        Ok(messages) => (StatusCode::OK, Json(WebhookReply { messages })).into_response(),
        Err(err) => {
            let body = candidate_facing_text(&err);
            match err {
                EngineError::Store(ref source) => {
                    error!(chat = %chat, error = %source, "store failure while handling update")
                }
                ref other => error!(chat = %chat, error = %other, "conversation failed"),
            }
            let reply = WebhookReply {
                messages: vec![OutboundMessage::Ack { body }],
            };
            (StatusCode::OK, Json(reply)).into_response()
        }
    }
}

/// Map engine failures onto what the candidate should read. Store failures
/// are transient ("try again"); missing resources are generic by design.
fn candidate_facing_text(error: &EngineError) -> String {
    match error {
        EngineError::CandidateNotFound => {
            "You are not registered as an applicant for any vacancy.".to_string()
        }
        EngineError::NoActiveApplication => {
            "You have no active applications at the moment.".to_string()
        }
        EngineError::NoQuestionsConfigured => {
            "There are no questions configured for this vacancy yet.".to_string()
        }
        EngineError::AlreadySubmitted => {
            "This application was already submitted; HR is reviewing it.".to_string()
        }
        EngineError::VacancyNotFound | EngineError::ConversationExpired => {
            "Something went wrong with this questionnaire. Send /start to begin again.".to_string()
        }
        EngineError::Store(_) => {
            "We could not save your progress. Please try again in a moment.".to_string()
        }
    }
}
