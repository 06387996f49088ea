use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrappers for the screening aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandidateId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VacancyId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuestionId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InteractionId(pub i64);

/// Stable chat-transport identity of a candidate (e.g. a messenger user id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub String);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A vacancy advertised by HR; the questionnaire is configured per vacancy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vacancy {
    pub id: VacancyId,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Candidate record assembled from resume intake; every profile field may be
/// missing after a partial scrape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub chat: Option<ChatId>,
    pub full_name: String,
    pub city: Option<String>,
    pub citizenship: Option<String>,
    pub relocation_ready: Option<bool>,
    pub resume_url: Option<String>,
    pub resume_score: Option<f32>,
    pub created_at: DateTime<Utc>,
}

/// Candidate fields known at intake time, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCandidate {
    pub chat: Option<ChatId>,
    pub full_name: String,
    pub city: Option<String>,
    pub citizenship: Option<String>,
    pub relocation_ready: Option<bool>,
    pub resume_url: Option<String>,
}

/// Links a candidate to a vacancy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub candidate_id: CandidateId,
    pub vacancy_id: VacancyId,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
}

/// Application lifecycle. The conversation engine reads the status to gate
/// starts and writes exactly one transition, `Active` to `Review`, on submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Active,
    Review,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Active => "active",
            ApplicationStatus::Review => "review",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

/// Shape of the answer a question expects.
///
/// `Info` steps carry no answer at all; the candidate acknowledges them and
/// the pointer advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerShape {
    Text,
    File,
    Choice,
    Info,
}

/// Optional per-question evaluation instruction forwarded to the scoring
/// model together with the candidate's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreeningCriteria {
    pub instruction: String,
}

/// One entry of a vacancy's ordered question bank. Immutable while a
/// candidate is mid-flow; HR edits land between interactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub vacancy_id: VacancyId,
    pub text: String,
    /// 1-based, contiguous within a vacancy.
    pub order: u32,
    pub expected: AnswerShape,
    /// Non-empty iff `expected` is `Choice`.
    pub choices: Vec<String>,
    pub screening: Option<ScreeningCriteria>,
}

/// Question fields supplied by an importer, before the store assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQuestion {
    pub text: String,
    pub order: u32,
    pub expected: AnswerShape,
    pub choices: Vec<String>,
    pub screening: Option<ScreeningCriteria>,
}

/// A captured answer. File answers persist as the `FILE:<reference>`
/// sentinel when rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerValue {
    Text(String),
    FileRef(String),
    Choice(String),
}

impl AnswerValue {
    /// Render the persisted/display form of the answer.
    pub fn rendered(&self) -> String {
        match self {
            AnswerValue::Text(text) => text.clone(),
            AnswerValue::FileRef(reference) => format!("FILE:{reference}"),
            AnswerValue::Choice(label) => label.clone(),
        }
    }
}

/// Durable lifecycle of one questionnaire run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionState {
    Started,
    Paused,
    Review,
    Completed,
    NoConsent,
}

impl InteractionState {
    pub const fn label(self) -> &'static str {
        match self {
            InteractionState::Started => "started",
            InteractionState::Paused => "paused",
            InteractionState::Review => "review",
            InteractionState::Completed => "completed",
            InteractionState::NoConsent => "no_consent",
        }
    }

    /// Completed and consent-declined interactions never resume.
    pub const fn is_terminal(self) -> bool {
        matches!(self, InteractionState::Completed | InteractionState::NoConsent)
    }
}

/// Durable record of one candidate's progress through one application's
/// questionnaire. At most one non-terminal interaction exists per
/// application; once `Completed`, `answers` and `current_question_id` are
/// frozen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: InteractionId,
    pub candidate_id: CandidateId,
    pub application_id: ApplicationId,
    pub vacancy_id: VacancyId,
    pub current_question_id: QuestionId,
    pub answers: BTreeMap<QuestionId, AnswerValue>,
    pub state: InteractionState,
    /// Personal-data consent: not yet asked / granted / declined.
    pub consent: Option<bool>,
    pub started_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_answers_render_with_sentinel() {
        let answer = AnswerValue::FileRef("resume-42.pdf".to_string());
        assert_eq!(answer.rendered(), "FILE:resume-42.pdf");
    }

    #[test]
    fn terminal_interaction_states() {
        assert!(InteractionState::Completed.is_terminal());
        assert!(InteractionState::NoConsent.is_terminal());
        assert!(!InteractionState::Started.is_terminal());
        assert!(!InteractionState::Paused.is_terminal());
        assert!(!InteractionState::Review.is_terminal());
    }
}
