//! Candidate questionnaire workflow: the conversation state machine, its
//! durable interaction state, reminder scheduling, and the webhook adapter.

pub mod context;
pub mod domain;
pub mod fsm;
pub mod import;
pub mod reminders;
pub mod router;
pub mod store;
pub mod transport;

mod engine;

#[cfg(test)]
mod tests;

pub use context::SessionContext;
pub use domain::{
    AnswerShape, AnswerValue, Application, ApplicationId, ApplicationStatus, Candidate,
    CandidateId, ChatId, Interaction, InteractionId, InteractionState, NewCandidate, NewQuestion,
    Question, QuestionId, ScreeningCriteria, Vacancy, VacancyId,
};
pub use engine::{ConversationEngine, EngineError, SessionMap, TokenVerifier};
pub use fsm::{
    transition, ConversationEvent, ConversationState, Directive, RejectReason, Step,
};
pub use import::{parse_question_bank, ImportError};
pub use reminders::{ReminderEntry, ReminderQueue, ReminderScheduler};
pub use router::{webhook_router, WebhookReply, WebhookUpdate};
pub use store::{Directory, InteractionStore, StoreError};
pub use transport::{
    CallbackData, CandidateInput, ChatTransport, ChoiceButton, CommandName, OutboundMessage,
    TransportError,
};
