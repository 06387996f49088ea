//! Conversation engine.
//!
//! Every candidate action is one unit of work: load the durable interaction,
//! run the state machine, apply its directives against the stores, and flush
//! the working copy back before replying. No task lives longer than one
//! action; resumability comes entirely from the interaction store.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::config::QuestionnaireConfig;
use crate::workflows::scoring::{ScoringHandoff, ScoringJob};

use super::context::SessionContext;
use super::domain::{
    AnswerValue, ApplicationStatus, Candidate, CandidateId, ChatId, Interaction, InteractionState,
    Vacancy,
};
use super::fsm::{
    transition, ConversationEvent, ConversationState, Directive, RejectReason, Step,
};
use super::reminders::{ReminderEntry, ReminderQueue};
use super::store::{Directory, InteractionStore, StoreError};
use super::transport::{
    CallbackData, CandidateInput, ChoiceButton, CommandName, OutboundMessage,
};

/// Conversation-level failures. Validation misses are not errors; they are
/// handled inside the state machine as re-prompts.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("candidate is not registered for any vacancy")]
    CandidateNotFound,
    #[error("candidate has no active application")]
    NoActiveApplication,
    #[error("no questions are configured for the vacancy")]
    NoQuestionsConfigured,
    #[error("vacancy record is missing")]
    VacancyNotFound,
    #[error("the questionnaire session is no longer valid")]
    ConversationExpired,
    #[error("the application was already submitted")]
    AlreadySubmitted,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolves a registration token to the candidate it was issued for. Token
/// generation and hashing live outside this crate.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Option<CandidateId>, StoreError>;
}

/// Live conversation snapshot cached between actions.
#[derive(Debug, Clone)]
pub(crate) struct Session {
    pub(crate) state: ConversationState,
    pub(crate) ctx: SessionContext,
}

/// Shared handle to the per-chat session cache. The reminder sweep holds a
/// clone so it can evict conversations it force-pauses.
#[derive(Clone, Default)]
pub struct SessionMap {
    inner: Arc<Mutex<HashMap<ChatId, Session>>>,
}

impl SessionMap {
    fn get(&self, chat: &ChatId) -> Option<Session> {
        self.inner
            .lock()
            .expect("session mutex poisoned")
            .get(chat)
            .cloned()
    }

    fn put(&self, chat: ChatId, session: Session) {
        self.inner
            .lock()
            .expect("session mutex poisoned")
            .insert(chat, session);
    }

    fn remove(&self, chat: &ChatId) {
        self.inner.lock().expect("session mutex poisoned").remove(chat);
    }

    /// Drop a cached conversation (idle-timeout eviction). Returns whether a
    /// session was present.
    pub fn evict(&self, chat: &ChatId) -> bool {
        self.inner
            .lock()
            .expect("session mutex poisoned")
            .remove(chat)
            .is_some()
    }
}

/// Drives candidate conversations over abstract stores and hands finished
/// questionnaires to the scoring dispatcher.
pub struct ConversationEngine<D, I, R> {
    directory: Arc<D>,
    interactions: Arc<I>,
    reminders: Arc<R>,
    scoring: Arc<dyn ScoringHandoff>,
    token_verifier: Option<Arc<dyn TokenVerifier>>,
    sessions: SessionMap,
    pending_tokens: Mutex<HashSet<ChatId>>,
    config: QuestionnaireConfig,
}

impl<D, I, R> ConversationEngine<D, I, R>
where
    D: Directory,
    I: InteractionStore,
    R: ReminderQueue,
{
    pub fn new(
        directory: Arc<D>,
        interactions: Arc<I>,
        reminders: Arc<R>,
        scoring: Arc<dyn ScoringHandoff>,
        config: QuestionnaireConfig,
    ) -> Self {
        Self {
            directory,
            interactions,
            reminders,
            scoring,
            token_verifier: None,
            sessions: SessionMap::default(),
            pending_tokens: Mutex::new(HashSet::new()),
            config,
        }
    }

    /// Enable the token-auth fallback for chats with no linked candidate.
    pub fn with_token_verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.token_verifier = Some(verifier);
        self
    }

    /// Session cache handle for the reminder sweep.
    pub fn session_map(&self) -> SessionMap {
        self.sessions.clone()
    }

    /// Entry point for every decoded candidate action.
    pub fn handle(
        &self,
        chat: &ChatId,
        input: CandidateInput,
    ) -> Result<Vec<OutboundMessage>, EngineError> {
        match input {
            CandidateInput::Command { name: CommandName::Start } => self.start(chat),
            CandidateInput::Command { name: CommandName::Cancel } => self.cancel_command(chat),
            other if self.awaiting_token(chat) => self.handle_token_input(chat, other),
            other => self.dispatch_event(chat, decode_event(other)),
        }
    }

    /// Start or resume the questionnaire for this chat.
    pub fn start(&self, chat: &ChatId) -> Result<Vec<OutboundMessage>, EngineError> {
        let Some(candidate) = self.directory.candidate_by_chat(chat)? else {
            if self.token_verifier.is_some() {
                self.pending_tokens
                    .lock()
                    .expect("token mutex poisoned")
                    .insert(chat.clone());
                return Ok(vec![token_prompt()]);
            }
            return Err(EngineError::CandidateNotFound);
        };

        let application = self
            .directory
            .active_application(candidate.id)?
            .ok_or(EngineError::NoActiveApplication)?;
        let questions = self.directory.questions_for_vacancy(application.vacancy_id)?;
        if questions.is_empty() {
            return Err(EngineError::NoQuestionsConfigured);
        }
        let vacancy = self
            .directory
            .vacancy(application.vacancy_id)?
            .ok_or(EngineError::VacancyNotFound)?;

        let now = Utc::now();
        match self.interactions.get(application.id)? {
            Some(existing) if existing.state == InteractionState::Completed => {
                // Tolerated partial submit: interaction committed but the
                // application status write was lost. Reconcile on read.
                if application.status == ApplicationStatus::Active {
                    self.directory
                        .set_application_status(application.id, ApplicationStatus::Review)?;
                }
                Err(EngineError::AlreadySubmitted)
            }
            Some(existing)
                if existing.state == InteractionState::NoConsent
                    || now - existing.last_active > self.config.retention =>
            {
                // Stale or consent-declined runs are discarded for a fresh start.
                self.interactions.delete(existing.id)?;
                self.begin_fresh(chat, &candidate, &application, &vacancy, questions)
            }
            Some(existing) => self.resume(chat, existing, questions, now),
            None => self.begin_fresh(chat, &candidate, &application, &vacancy, questions),
        }
    }

    fn begin_fresh(
        &self,
        chat: &ChatId,
        candidate: &Candidate,
        application: &super::domain::Application,
        vacancy: &Vacancy,
        questions: Vec<super::domain::Question>,
    ) -> Result<Vec<OutboundMessage>, EngineError> {
        let interaction = self.interactions.create(
            candidate.id,
            application.id,
            vacancy.id,
            questions[0].id,
        )?;

        let ctx = SessionContext {
            candidate_id: interaction.candidate_id,
            application_id: interaction.application_id,
            vacancy_id: interaction.vacancy_id,
            interaction_id: interaction.id,
            questions,
            answers: BTreeMap::new(),
            current_index: 0,
            review_page: 0,
            consent: None,
            choice_case_insensitive: self.config.choice_case_insensitive,
        };

        self.sessions.put(
            chat.clone(),
            Session {
                state: ConversationState::AwaitingConsent,
                ctx: ctx.clone(),
            },
        );
        info!(candidate = ctx.candidate_id.0, application = ctx.application_id.0, "questionnaire started");

        Ok(vec![
            OutboundMessage::Text {
                body: format!(
                    "Hello, {}! To move forward with your application for '{}', \
                     please complete a short questionnaire of {} questions.",
                    candidate.full_name,
                    vacancy.title,
                    ctx.question_count(),
                ),
            },
            consent_prompt(),
        ])
    }

    fn resume(
        &self,
        chat: &ChatId,
        existing: Interaction,
        questions: Vec<super::domain::Question>,
        now: DateTime<Utc>,
    ) -> Result<Vec<OutboundMessage>, EngineError> {
        let Some(ctx) = SessionContext::from_interaction(
            &existing,
            questions,
            self.config.choice_case_insensitive,
        ) else {
            // The bank changed underneath the stored pointer; the only safe
            // move is a restart.
            warn!(interaction = existing.id.0, "stored pointer no longer resolves, restarting");
            self.sessions.remove(chat);
            self.interactions.delete(existing.id)?;
            return Err(EngineError::ConversationExpired);
        };

        let state = if ctx.consent.is_none() {
            ConversationState::AwaitingConsent
        } else if existing.state == InteractionState::Review {
            ConversationState::Review
        } else {
            ConversationState::Answering
        };

        let mut record = existing;
        record.state = match state {
            ConversationState::Review => InteractionState::Review,
            _ => InteractionState::Started,
        };
        record.last_active = now;
        self.interactions.update(record)?;

        let mut messages = vec![OutboundMessage::Ack {
            body: "Welcome back! Resuming your questionnaire where you left off.".to_string(),
        }];
        messages.push(self.state_prompt(state, &ctx));

        self.sessions.put(chat.clone(), Session { state, ctx });
        Ok(messages)
    }

    fn cancel_command(&self, chat: &ChatId) -> Result<Vec<OutboundMessage>, EngineError> {
        if self
            .pending_tokens
            .lock()
            .expect("token mutex poisoned")
            .remove(chat)
        {
            return Ok(vec![OutboundMessage::Ack {
                body: "Cancelled. Send /start when you are ready.".to_string(),
            }]);
        }

        if self.sessions.get(chat).is_none() {
            return Ok(vec![OutboundMessage::Ack {
                body: "Nothing is in progress. Send /start to begin.".to_string(),
            }]);
        }

        self.dispatch_event(chat, ConversationEvent::CancelRequested)
    }

    fn awaiting_token(&self, chat: &ChatId) -> bool {
        self.pending_tokens
            .lock()
            .expect("token mutex poisoned")
            .contains(chat)
    }

    fn handle_token_input(
        &self,
        chat: &ChatId,
        input: CandidateInput,
    ) -> Result<Vec<OutboundMessage>, EngineError> {
        let Some(verifier) = self.token_verifier.as_ref() else {
            self.pending_tokens
                .lock()
                .expect("token mutex poisoned")
                .remove(chat);
            return Err(EngineError::CandidateNotFound);
        };

        match input {
            CandidateInput::Text { body } => match verifier.verify(body.trim())? {
                Some(candidate_id) => {
                    self.directory.bind_chat(candidate_id, chat.clone())?;
                    self.pending_tokens
                        .lock()
                        .expect("token mutex poisoned")
                        .remove(chat);
                    let mut messages = vec![OutboundMessage::Ack {
                        body: "Your profile is now linked.".to_string(),
                    }];
                    messages.extend(self.start(chat)?);
                    Ok(messages)
                }
                None => Ok(vec![
                    OutboundMessage::Ack {
                        body: "That token is not valid.".to_string(),
                    },
                    token_prompt(),
                ]),
            },
            CandidateInput::Callback { data }
                if CallbackData::decode(&data) == Some(CallbackData::Cancel) =>
            {
                self.cancel_command(chat)
            }
            _ => Ok(vec![token_prompt()]),
        }
    }

    fn dispatch_event(
        &self,
        chat: &ChatId,
        event: ConversationEvent,
    ) -> Result<Vec<OutboundMessage>, EngineError> {
        let Some(session) = self.sessions.get(chat) else {
            return Ok(vec![OutboundMessage::Ack {
                body: "No questionnaire is in progress. Send /start to begin.".to_string(),
            }]);
        };

        // The durable record is the source of truth; a conversation whose
        // interaction vanished mid-flow can only be restarted.
        let stored = self.interactions.get(session.ctx.application_id)?;
        let Some(stored) = stored else {
            self.sessions.remove(chat);
            return Err(EngineError::ConversationExpired);
        };
        if stored.state.is_terminal() {
            self.sessions.remove(chat);
            return Err(EngineError::ConversationExpired);
        }

        let step = transition(session.state, &session.ctx, event);
        self.apply(chat, &session, step)
    }

    /// Run the machine's directives. The session and durable record are only
    /// committed after every directive succeeded, so a store failure leaves
    /// the conversation exactly where it was and a retry is safe.
    fn apply(
        &self,
        chat: &ChatId,
        session: &Session,
        step: Step,
    ) -> Result<Vec<OutboundMessage>, EngineError> {
        let now = Utc::now();
        let mut ctx = session.ctx.clone();
        let mut messages = Vec::new();
        let mut flushed = false;

        for directive in step.directives {
            match directive {
                Directive::VerifyToken { .. } => {
                    // Token flow is resolved before the machine is consulted.
                    warn!("unexpected VerifyToken directive in live conversation");
                }
                Directive::RecordConsent { granted } => {
                    ctx.consent = Some(granted);
                }
                Directive::AskQuestion { index } => {
                    ctx.current_index = index;
                    messages.push(question_prompt(&ctx));
                }
                Directive::Reject(reason) => {
                    messages.push(OutboundMessage::Ack {
                        body: reject_text(&reason),
                    });
                    messages.push(question_prompt(&ctx));
                }
                Directive::RecordAnswer { question, value } => {
                    ctx.answers.insert(question, value);
                }
                Directive::ShowReview { page } => {
                    let pages = ctx.review_page_count(self.config.review_page_size);
                    ctx.review_page = page.min(pages.saturating_sub(1));
                    messages.push(review_message(&ctx, self.config.review_page_size));
                }
                Directive::Reprompt => {
                    messages.push(self.state_prompt(step.next, &ctx));
                }
                Directive::MarkPaused => {
                    self.flush(&ctx, InteractionState::Paused, now, None)?;
                    self.reminders.schedule(ReminderEntry {
                        chat: chat.clone(),
                        application_id: ctx.application_id,
                        due_at: now + self.config.reminder_delay,
                    })?;
                    messages.push(OutboundMessage::Ack {
                        body: "Questionnaire paused. Send /start to pick up where you left off."
                            .to_string(),
                    });
                    flushed = true;
                }
                Directive::MarkNoConsent => {
                    self.flush(&ctx, InteractionState::NoConsent, now, None)?;
                    messages.push(OutboundMessage::Ack {
                        body: "Understood. Without consent we cannot process your application. \
                               Send /start if you change your mind."
                            .to_string(),
                    });
                    flushed = true;
                }
                Directive::FinalizeSubmission => {
                    let application = self
                        .directory
                        .application(ctx.application_id)?
                        .ok_or(EngineError::ConversationExpired)?;
                    if application.status != ApplicationStatus::Active {
                        return Err(EngineError::AlreadySubmitted);
                    }
                    self.directory
                        .set_application_status(ctx.application_id, ApplicationStatus::Review)?;
                    self.flush(&ctx, InteractionState::Completed, now, Some(now))?;
                    self.scoring.dispatch(ScoringJob {
                        application_id: ctx.application_id,
                        candidate_id: ctx.candidate_id,
                        vacancy_id: ctx.vacancy_id,
                    });
                    info!(application = ctx.application_id.0, "questionnaire submitted");
                    messages.push(OutboundMessage::Ack {
                        body: "Thank you! Your answers were submitted; HR will get back to you."
                            .to_string(),
                    });
                    flushed = true;
                }
            }
        }

        if step.next.is_terminal() {
            self.sessions.remove(chat);
        } else {
            if !flushed {
                let state = match step.next {
                    ConversationState::Review => InteractionState::Review,
                    _ => InteractionState::Started,
                };
                self.flush(&ctx, state, now, None)?;
            }
            self.sessions.put(chat.clone(), Session { state: step.next, ctx });
        }

        Ok(messages)
    }

    /// Write the working copy back to the interaction store, preserving
    /// `started_at` and keying answers by question id so retries are
    /// idempotent upserts.
    fn flush(
        &self,
        ctx: &SessionContext,
        state: InteractionState,
        now: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<(), EngineError> {
        let mut record = self
            .interactions
            .get(ctx.application_id)?
            .ok_or(EngineError::ConversationExpired)?;

        let pointer_index = ctx.current_index.min(ctx.question_count().saturating_sub(1));
        record.current_question_id = ctx.questions[pointer_index].id;
        record.answers = ctx.answers.clone();
        record.state = state;
        record.consent = ctx.consent;
        record.last_active = now;
        if completed_at.is_some() {
            record.completed_at = completed_at;
        }

        self.interactions.update(record)?;
        Ok(())
    }

    /// The prompt a state re-issues when input did not move the machine.
    fn state_prompt(&self, state: ConversationState, ctx: &SessionContext) -> OutboundMessage {
        match state {
            ConversationState::TokenAuth => token_prompt(),
            ConversationState::AwaitingConsent => consent_prompt(),
            ConversationState::Answering | ConversationState::Editing => question_prompt(ctx),
            ConversationState::Review => review_message(ctx, self.config.review_page_size),
            ConversationState::Submitted
            | ConversationState::Cancelled
            | ConversationState::TimedOut
            | ConversationState::Declined => OutboundMessage::Ack {
                body: "This questionnaire has ended. Send /start to begin again.".to_string(),
            },
        }
    }
}

fn decode_event(input: CandidateInput) -> ConversationEvent {
    match input {
        CandidateInput::Text { body } => {
            ConversationEvent::AnswerProvided(AnswerValue::Text(body))
        }
        CandidateInput::File { reference } => {
            ConversationEvent::AnswerProvided(AnswerValue::FileRef(reference))
        }
        CandidateInput::Callback { data } => match CallbackData::decode(&data) {
            Some(CallbackData::Consent(true)) => ConversationEvent::ConsentGranted,
            Some(CallbackData::Consent(false)) => ConversationEvent::ConsentDeclined,
            Some(CallbackData::Choice(label)) => {
                ConversationEvent::AnswerProvided(AnswerValue::Choice(label))
            }
            Some(CallbackData::Continue) => ConversationEvent::Continue,
            Some(CallbackData::Edit(question)) => ConversationEvent::EditRequested(question),
            Some(CallbackData::Page(page)) => ConversationEvent::PageRequested(page),
            Some(CallbackData::Submit) => ConversationEvent::SubmitRequested,
            Some(CallbackData::Cancel) => ConversationEvent::CancelRequested,
            None => ConversationEvent::Unrecognized,
        },
        CandidateInput::Command { .. } => ConversationEvent::Unrecognized,
    }
}

fn cancel_button() -> ChoiceButton {
    ChoiceButton::new("Cancel", CallbackData::Cancel)
}

fn token_prompt() -> OutboundMessage {
    OutboundMessage::Choice {
        body: "You are not registered yet. Please send the registration token you received."
            .to_string(),
        options: vec![cancel_button()],
    }
}

fn consent_prompt() -> OutboundMessage {
    OutboundMessage::Choice {
        body: "Before we begin: do you consent to the processing of your personal data \
               for this application?"
            .to_string(),
        options: vec![
            ChoiceButton::new("I consent", CallbackData::Consent(true)),
            ChoiceButton::new("I do not consent", CallbackData::Consent(false)),
        ],
    }
}

fn question_prompt(ctx: &SessionContext) -> OutboundMessage {
    let Some(question) = ctx.current_question() else {
        return OutboundMessage::Ack {
            body: "Something went wrong with this questionnaire. Send /start to begin again."
                .to_string(),
        };
    };

    let body = format!(
        "Question {} of {}:\n{}",
        ctx.current_index + 1,
        ctx.question_count(),
        question.text,
    );

    let mut options: Vec<ChoiceButton> = match question.expected {
        super::domain::AnswerShape::Choice => question
            .choices
            .iter()
            .map(|label| ChoiceButton::new(label.clone(), CallbackData::Choice(label.clone())))
            .collect(),
        super::domain::AnswerShape::Info => {
            vec![ChoiceButton::new("Continue", CallbackData::Continue)]
        }
        super::domain::AnswerShape::Text | super::domain::AnswerShape::File => Vec::new(),
    };
    options.push(cancel_button());

    OutboundMessage::Choice { body, options }
}

fn review_message(ctx: &SessionContext, page_size: usize) -> OutboundMessage {
    let pages = ctx.review_page_count(page_size);
    let page = ctx.review_page.min(pages.saturating_sub(1));

    let mut body = format!(
        "Your answers (page {} of {}). Review them and submit when ready.",
        page + 1,
        pages,
    );
    for question in ctx.review_slice(page, page_size) {
        let answer = ctx
            .answers
            .get(&question.id)
            .map(AnswerValue::rendered)
            .unwrap_or_else(|| "No answer".to_string());
        body.push_str(&format!("\n{}. {}\n   {}", question.order, question.text, answer));
    }

    let mut options = Vec::new();
    for question in ctx.review_slice(page, page_size) {
        if question.expected != super::domain::AnswerShape::Info {
            options.push(ChoiceButton::new(
                format!("Edit {}", question.order),
                CallbackData::Edit(question.id),
            ));
        }
    }
    if page > 0 {
        options.push(ChoiceButton::new("Previous page", CallbackData::Page(page - 1)));
    }
    if page + 1 < pages {
        options.push(ChoiceButton::new("Next page", CallbackData::Page(page + 1)));
    }
    options.push(ChoiceButton::new("Submit", CallbackData::Submit));
    options.push(cancel_button());

    OutboundMessage::Choice { body, options }
}

fn reject_text(reason: &RejectReason) -> String {
    match reason {
        RejectReason::ExpectedText => "Please answer with a text message.".to_string(),
        RejectReason::ExpectedFile => "Please attach a file for this step.".to_string(),
        RejectReason::UnknownChoice { provided } => format!(
            "'{provided}' is not one of the offered options. Please pick one of the buttons.",
        ),
        RejectReason::NoAnswerExpected => {
            "No answer is needed here. Tap Continue to move on.".to_string()
        }
    }
}
