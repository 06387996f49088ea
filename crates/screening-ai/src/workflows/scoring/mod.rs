//! Scoring dispatch: after submission the accumulated answers are formatted
//! into one document, sent to the external scoring model, and the result is
//! persisted next to the application together with an HR notification.
//!
//! The dispatcher sits off the candidate's request path; submission is
//! acknowledged before any network round trip happens here, and a failing
//! scoring call degrades to a zero score instead of failing the submission.

mod client;

pub use client::{HttpScoringClient, ScoringClient, ScoringClientError};

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::questionnaire::domain::{
    AnswerValue, ApplicationId, CandidateId, Question, QuestionId, VacancyId,
};
use super::questionnaire::store::{Directory, InteractionStore, StoreError};

/// Decision placeholder recorded until HR acts on the scored application.
pub const PENDING_DECISION: &str = "pending_review";

const BASE_INSTRUCTION: &str = "You are screening a job candidate. Evaluate the questionnaire \
answers below and reply with a single overall score from 0 to 10.";

/// Work item handed over by the conversation engine on submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringJob {
    pub application_id: ApplicationId,
    pub candidate_id: CandidateId,
    pub vacancy_id: VacancyId,
}

/// Synchronous hand-off seam between the engine and the dispatcher. The
/// production implementation spawns the asynchronous dispatch and returns
/// immediately.
pub trait ScoringHandoff: Send + Sync {
    fn dispatch(&self, job: ScoringJob);
}

/// Persisted outcome of one scoring run, tied to the application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringResult {
    pub application_id: ApplicationId,
    pub score: f32,
    pub decision: String,
    pub raw_response: String,
    pub created_at: DateTime<Utc>,
}

/// Storage for scoring results.
pub trait ScoreRepository: Send + Sync {
    fn record(&self, result: ScoringResult) -> Result<(), StoreError>;
    fn for_application(&self, id: ApplicationId) -> Result<Vec<ScoringResult>, StoreError>;
}

/// Notification queued for the HR side once a candidate is scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HrNotification {
    pub application_id: ApplicationId,
    pub candidate_id: CandidateId,
    pub vacancy_id: VacancyId,
    pub score: f32,
    pub decision: String,
}

/// Outbound HR notification hook; template wording lives elsewhere.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: HrNotification) -> Result<(), NotificationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("interaction for application vanished before scoring")]
    MissingInteraction,
    #[error(transparent)]
    Notification(#[from] NotificationError),
}

/// Formats completed answers and forwards them to the scoring model.
pub struct ScoringDispatcher<D, I, S, N> {
    directory: Arc<D>,
    interactions: Arc<I>,
    scores: Arc<S>,
    notifications: Arc<N>,
    client: Arc<dyn ScoringClient>,
}

impl<D, I, S, N> ScoringDispatcher<D, I, S, N>
where
    D: Directory + 'static,
    I: InteractionStore + 'static,
    S: ScoreRepository + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(
        directory: Arc<D>,
        interactions: Arc<I>,
        scores: Arc<S>,
        notifications: Arc<N>,
        client: Arc<dyn ScoringClient>,
    ) -> Self {
        Self {
            directory,
            interactions,
            scores,
            notifications,
            client,
        }
    }

    /// Score one submitted application end to end. A failing scoring call is
    /// downgraded to a zero score; only store/notification failures bubble
    /// up, and those are logged by the spawning wrapper.
    pub async fn dispatch(&self, job: ScoringJob) -> Result<ScoringResult, DispatchError> {
        let interaction = self
            .interactions
            .get(job.application_id)?
            .ok_or(DispatchError::MissingInteraction)?;
        let questions = self.directory.questions_for_vacancy(job.vacancy_id)?;

        let document = answers_document(&questions, &interaction.answers);
        let instruction = screening_instruction(&questions);

        let (score, raw_response) = match self.client.evaluate(&document, &instruction).await {
            Ok(raw) => (parse_score(&raw), raw),
            Err(err) => {
                warn!(application = job.application_id.0, error = %err, "scoring call failed, recording zero score");
                (0.0, format!("scoring client error: {err}"))
            }
        };

        let result = ScoringResult {
            application_id: job.application_id,
            score,
            decision: PENDING_DECISION.to_string(),
            raw_response,
            created_at: Utc::now(),
        };
        self.scores.record(result.clone())?;

        self.notifications.notify(HrNotification {
            application_id: job.application_id,
            candidate_id: job.candidate_id,
            vacancy_id: job.vacancy_id,
            score,
            decision: PENDING_DECISION.to_string(),
        })?;

        info!(application = job.application_id.0, score, "candidate scored");
        Ok(result)
    }
}

/// `ScoringHandoff` that spawns the dispatch on the tokio runtime so the
/// candidate's submission acknowledgment never waits on the scoring call.
pub struct TokioScoringHandoff<D, I, S, N> {
    dispatcher: Arc<ScoringDispatcher<D, I, S, N>>,
}

impl<D, I, S, N> TokioScoringHandoff<D, I, S, N> {
    pub fn new(dispatcher: Arc<ScoringDispatcher<D, I, S, N>>) -> Self {
        Self { dispatcher }
    }
}

impl<D, I, S, N> ScoringHandoff for TokioScoringHandoff<D, I, S, N>
where
    D: Directory + Send + Sync + 'static,
    I: InteractionStore + Send + Sync + 'static,
    S: ScoreRepository + Send + Sync + 'static,
    N: NotificationSink + Send + Sync + 'static,
{
    fn dispatch(&self, job: ScoringJob) {
        let dispatcher = self.dispatcher.clone();
        tokio::spawn(async move {
            if let Err(err) = dispatcher.dispatch(job).await {
                warn!(application = job.application_id.0, error = %err, "scoring dispatch failed");
            }
        });
    }
}

/// Join every question of the bank with the candidate's answer (or an
/// explicit "No answer") into one JSON document for the model.
pub fn answers_document(
    questions: &[Question],
    answers: &BTreeMap<QuestionId, AnswerValue>,
) -> String {
    let mut combined = Map::new();
    for question in questions {
        let answer = answers
            .get(&question.id)
            .map(AnswerValue::rendered)
            .unwrap_or_else(|| "No answer".to_string());
        combined.insert(question.text.clone(), Value::String(answer));
    }
    serde_json::to_string_pretty(&Value::Object(combined))
        .unwrap_or_else(|_| "{}".to_string())
}

/// Base task instruction plus the per-question criteria HR flagged for
/// screening.
pub fn screening_instruction(questions: &[Question]) -> String {
    let mut instruction = BASE_INSTRUCTION.to_string();
    for question in questions {
        if let Some(criteria) = &question.screening {
            instruction.push_str("\n- ");
            instruction.push_str(&question.text);
            instruction.push_str(": ");
            instruction.push_str(&criteria.instruction);
        }
    }
    instruction
}

/// Coerce the model's reply into a score. Accepts a bare number or a JSON
/// object with a `score` field; anything else collapses to 0.
pub fn parse_score(raw: &str) -> f32 {
    let trimmed = raw.trim();
    if let Ok(score) = trimmed.parse::<f32>() {
        return score;
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(score) = value.get("score") {
            if let Some(number) = score.as_f64() {
                return number as f32;
            }
            if let Some(text) = score.as_str() {
                if let Ok(number) = text.trim().parse::<f32>() {
                    return number;
                }
            }
        }
    }

    0.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::questionnaire::domain::{AnswerShape, ScreeningCriteria};

    fn question(id: i64, text: &str, screening: Option<&str>) -> Question {
        Question {
            id: QuestionId(id),
            vacancy_id: VacancyId(1),
            text: text.to_string(),
            order: id as u32,
            expected: AnswerShape::Text,
            choices: Vec::new(),
            screening: screening.map(|instruction| ScreeningCriteria {
                instruction: instruction.to_string(),
            }),
        }
    }

    #[test]
    fn parses_plain_and_json_scores() {
        assert_eq!(parse_score("7"), 7.0);
        assert_eq!(parse_score(" 8.5 \n"), 8.5);
        assert_eq!(parse_score(r#"{"score": 6}"#), 6.0);
        assert_eq!(parse_score(r#"{"score": "4.5"}"#), 4.5);
    }

    #[test]
    fn malformed_scores_collapse_to_zero() {
        assert_eq!(parse_score("not-a-number"), 0.0);
        assert_eq!(parse_score(r#"{"verdict": "great"}"#), 0.0);
        assert_eq!(parse_score(""), 0.0);
    }

    #[test]
    fn document_covers_unanswered_questions() {
        let questions = vec![question(1, "Why us?", None), question(2, "Salary?", None)];
        let mut answers = BTreeMap::new();
        answers.insert(QuestionId(1), AnswerValue::Text("Growth".to_string()));

        let document = answers_document(&questions, &answers);
        assert!(document.contains("\"Why us?\": \"Growth\""));
        assert!(document.contains("\"Salary?\": \"No answer\""));
    }

    #[test]
    fn instruction_collects_flagged_criteria() {
        let questions = vec![
            question(1, "Why us?", None),
            question(2, "Shift work ok?", Some("must accept night shifts")),
        ];
        let instruction = screening_instruction(&questions);
        assert!(instruction.contains("single overall score"));
        assert!(instruction.contains("Shift work ok?: must accept night shifts"));
        assert!(!instruction.contains("Why us?:"));
    }
}
