//! Conversation state machine.
//!
//! The engine never branches on ad-hoc state flags; every candidate action is
//! funneled through [`transition`], a pure function from (state, context,
//! event) to the next state plus a list of directives. Directives are the
//! only way the machine requests side effects, so the full transition table
//! can be tested without stores or transports.

use super::context::SessionContext;
use super::domain::{AnswerShape, AnswerValue, Question, QuestionId};

/// Closed set of conversation states. `TokenAuth` precedes any questionnaire
/// context; the four terminal states end the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    TokenAuth,
    AwaitingConsent,
    Answering,
    Editing,
    Review,
    Submitted,
    Cancelled,
    TimedOut,
    Declined,
}

impl ConversationState {
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            ConversationState::Submitted
                | ConversationState::Cancelled
                | ConversationState::TimedOut
                | ConversationState::Declined
        )
    }
}

/// Candidate-originated events, already decoded from the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationEvent {
    TokenPresented(String),
    ConsentGranted,
    ConsentDeclined,
    AnswerProvided(AnswerValue),
    /// Acknowledge an informational step without supplying an answer.
    Continue,
    EditRequested(QuestionId),
    PageRequested(usize),
    SubmitRequested,
    CancelRequested,
    IdleTimeout,
    /// Input the transport could not decode; re-prompt the current step.
    Unrecognized,
}

/// Side effects the machine asks the engine to perform, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    VerifyToken { token: String },
    RecordConsent { granted: bool },
    /// Move the pointer to `index` and prompt that question.
    AskQuestion { index: usize },
    /// Invalid answer: explain and re-prompt without advancing.
    Reject(RejectReason),
    RecordAnswer { question: QuestionId, value: AnswerValue },
    ShowReview { page: usize },
    /// Re-send the prompt matching the (unchanged) current state.
    Reprompt,
    /// Persist the paused interaction and schedule a reminder.
    MarkPaused,
    MarkNoConsent,
    /// Guarded submission: application to review, interaction completed,
    /// scoring handed off.
    FinalizeSubmission,
}

/// Why an answer was turned away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    ExpectedText,
    ExpectedFile,
    UnknownChoice { provided: String },
    NoAnswerExpected,
}

/// Result of one dispatch: the state to commit and the effects to run.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub next: ConversationState,
    pub directives: Vec<Directive>,
}

impl Step {
    fn stay(state: ConversationState, directives: Vec<Directive>) -> Self {
        Self {
            next: state,
            directives,
        }
    }
}

/// Single dispatch for the whole conversation flow.
pub fn transition(
    state: ConversationState,
    ctx: &SessionContext,
    event: ConversationEvent,
) -> Step {
    match (state, event) {
        // Token auth: the only accepted input is a token string.
        (ConversationState::TokenAuth, ConversationEvent::TokenPresented(token)) => {
            Step::stay(ConversationState::TokenAuth, vec![Directive::VerifyToken { token }])
        }
        (ConversationState::TokenAuth, ConversationEvent::CancelRequested) => Step {
            next: ConversationState::Cancelled,
            directives: Vec::new(),
        },
        (ConversationState::TokenAuth, _) => {
            Step::stay(ConversationState::TokenAuth, vec![Directive::Reprompt])
        }

        (ConversationState::AwaitingConsent, ConversationEvent::ConsentGranted) => Step {
            next: ConversationState::Answering,
            directives: vec![
                Directive::RecordConsent { granted: true },
                Directive::AskQuestion { index: ctx.current_index },
            ],
        },
        (ConversationState::AwaitingConsent, ConversationEvent::ConsentDeclined) => Step {
            next: ConversationState::Declined,
            directives: vec![
                Directive::RecordConsent { granted: false },
                Directive::MarkNoConsent,
            ],
        },
        (ConversationState::AwaitingConsent, ConversationEvent::CancelRequested) => Step {
            next: ConversationState::Cancelled,
            directives: vec![Directive::MarkPaused],
        },
        (ConversationState::AwaitingConsent, ConversationEvent::IdleTimeout) => Step {
            next: ConversationState::TimedOut,
            directives: vec![Directive::MarkPaused],
        },
        (ConversationState::AwaitingConsent, _) => {
            Step::stay(ConversationState::AwaitingConsent, vec![Directive::Reprompt])
        }

        (ConversationState::Answering, ConversationEvent::AnswerProvided(value)) => {
            answer_step(ctx, value, AnswerTarget::Advance)
        }
        (ConversationState::Answering, ConversationEvent::Continue) => {
            continue_step(ctx, AnswerTarget::Advance)
        }
        (ConversationState::Answering, ConversationEvent::CancelRequested) => Step {
            next: ConversationState::Cancelled,
            directives: vec![Directive::MarkPaused],
        },
        (ConversationState::Answering, ConversationEvent::IdleTimeout) => Step {
            next: ConversationState::TimedOut,
            directives: vec![Directive::MarkPaused],
        },
        (ConversationState::Answering, _) => {
            Step::stay(ConversationState::Answering, vec![Directive::Reprompt])
        }

        (ConversationState::Editing, ConversationEvent::AnswerProvided(value)) => {
            answer_step(ctx, value, AnswerTarget::BackToReview)
        }
        (ConversationState::Editing, ConversationEvent::Continue) => {
            continue_step(ctx, AnswerTarget::BackToReview)
        }
        (ConversationState::Editing, ConversationEvent::CancelRequested) => Step {
            next: ConversationState::Cancelled,
            directives: vec![Directive::MarkPaused],
        },
        (ConversationState::Editing, ConversationEvent::IdleTimeout) => Step {
            next: ConversationState::TimedOut,
            directives: vec![Directive::MarkPaused],
        },
        (ConversationState::Editing, _) => {
            Step::stay(ConversationState::Editing, vec![Directive::Reprompt])
        }

        (ConversationState::Review, ConversationEvent::EditRequested(question)) => {
            match ctx.index_of(question) {
                Some(index) => Step {
                    next: ConversationState::Editing,
                    directives: vec![Directive::AskQuestion { index }],
                },
                None => Step::stay(ConversationState::Review, vec![Directive::Reprompt]),
            }
        }
        (ConversationState::Review, ConversationEvent::PageRequested(page)) => {
            Step::stay(ConversationState::Review, vec![Directive::ShowReview { page }])
        }
        (ConversationState::Review, ConversationEvent::SubmitRequested) => Step {
            next: ConversationState::Submitted,
            directives: vec![Directive::FinalizeSubmission],
        },
        (ConversationState::Review, ConversationEvent::CancelRequested) => Step {
            next: ConversationState::Cancelled,
            directives: vec![Directive::MarkPaused],
        },
        (ConversationState::Review, ConversationEvent::IdleTimeout) => Step {
            next: ConversationState::TimedOut,
            directives: vec![Directive::MarkPaused],
        },
        (ConversationState::Review, _) => {
            Step::stay(ConversationState::Review, vec![Directive::Reprompt])
        }

        // Terminal states accept nothing; the session is already gone.
        (
            state @ (ConversationState::Submitted
            | ConversationState::Cancelled
            | ConversationState::TimedOut
            | ConversationState::Declined),
            _,
        ) => Step::stay(state, Vec::new()),
    }
}

/// Where control flows after a successful answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AnswerTarget {
    /// Normal answering: advance the pointer or enter review.
    Advance,
    /// Editing: a single corrected answer returns to the review screen.
    BackToReview,
}

fn answer_step(ctx: &SessionContext, value: AnswerValue, target: AnswerTarget) -> Step {
    let state = match target {
        AnswerTarget::Advance => ConversationState::Answering,
        AnswerTarget::BackToReview => ConversationState::Editing,
    };

    let Some(question) = ctx.current_question() else {
        // Pointer past the bank only happens through store corruption; the
        // engine surfaces it as a fatal conversation error before dispatch.
        return Step::stay(state, vec![Directive::Reprompt]);
    };

    match validate_answer(question, value, ctx.choice_case_insensitive) {
        Err(reason) => Step::stay(state, vec![Directive::Reject(reason)]),
        Ok(accepted) => {
            let record = Directive::RecordAnswer {
                question: question.id,
                value: accepted,
            };
            match target {
                AnswerTarget::BackToReview => Step {
                    next: ConversationState::Review,
                    directives: vec![record, Directive::ShowReview { page: ctx.review_page }],
                },
                AnswerTarget::Advance if ctx.on_last_question() => Step {
                    next: ConversationState::Review,
                    directives: vec![record, Directive::ShowReview { page: 0 }],
                },
                AnswerTarget::Advance => Step {
                    next: ConversationState::Answering,
                    directives: vec![
                        record,
                        Directive::AskQuestion { index: ctx.current_index + 1 },
                    ],
                },
            }
        }
    }
}

fn continue_step(ctx: &SessionContext, target: AnswerTarget) -> Step {
    let state = match target {
        AnswerTarget::Advance => ConversationState::Answering,
        AnswerTarget::BackToReview => ConversationState::Editing,
    };

    let Some(question) = ctx.current_question() else {
        return Step::stay(state, vec![Directive::Reprompt]);
    };

    // `Continue` is only meaningful on informational steps.
    if question.expected != AnswerShape::Info {
        return Step::stay(state, vec![Directive::Reprompt]);
    }

    match target {
        AnswerTarget::BackToReview => Step {
            next: ConversationState::Review,
            directives: vec![Directive::ShowReview { page: ctx.review_page }],
        },
        AnswerTarget::Advance if ctx.on_last_question() => Step {
            next: ConversationState::Review,
            directives: vec![Directive::ShowReview { page: 0 }],
        },
        AnswerTarget::Advance => Step {
            next: ConversationState::Answering,
            directives: vec![Directive::AskQuestion { index: ctx.current_index + 1 }],
        },
    }
}

/// Check a candidate answer against the question's expected shape, returning
/// the canonical value to record.
pub fn validate_answer(
    question: &Question,
    value: AnswerValue,
    choice_case_insensitive: bool,
) -> Result<AnswerValue, RejectReason> {
    match question.expected {
        AnswerShape::Text => match value {
            AnswerValue::Text(text) if !text.trim().is_empty() => {
                Ok(AnswerValue::Text(text.trim().to_string()))
            }
            _ => Err(RejectReason::ExpectedText),
        },
        AnswerShape::File => match value {
            AnswerValue::FileRef(reference) => Ok(AnswerValue::FileRef(reference)),
            _ => Err(RejectReason::ExpectedFile),
        },
        AnswerShape::Choice => {
            let provided = match value {
                AnswerValue::Choice(label) | AnswerValue::Text(label) => label,
                AnswerValue::FileRef(reference) => {
                    return Err(RejectReason::UnknownChoice { provided: reference })
                }
            };
            let matched = question.choices.iter().find(|label| {
                if choice_case_insensitive {
                    label.eq_ignore_ascii_case(provided.trim())
                } else {
                    label.as_str() == provided.trim()
                }
            });
            match matched {
                // Record the configured label, not the candidate's spelling.
                Some(label) => Ok(AnswerValue::Choice(label.clone())),
                None => Err(RejectReason::UnknownChoice { provided }),
            }
        }
        AnswerShape::Info => Err(RejectReason::NoAnswerExpected),
    }
}
