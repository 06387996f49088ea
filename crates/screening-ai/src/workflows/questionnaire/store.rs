use chrono::{DateTime, Utc};

use super::domain::{
    Application, ApplicationId, ApplicationStatus, Candidate, CandidateId, ChatId, Interaction,
    InteractionId, NewCandidate, NewQuestion, Question, Vacancy, VacancyId,
};

/// Error enumeration for persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Read/write access to the relational aggregates the engine consults:
/// candidates, vacancies, applications, and the question bank. Interaction
/// state has its own contract below.
pub trait Directory: Send + Sync {
    fn candidate_by_chat(&self, chat: &ChatId) -> Result<Option<Candidate>, StoreError>;
    fn candidate(&self, id: CandidateId) -> Result<Option<Candidate>, StoreError>;
    fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate, StoreError>;
    /// Link a chat identity to an existing candidate (token-auth flow).
    fn bind_chat(&self, id: CandidateId, chat: ChatId) -> Result<(), StoreError>;
    fn record_resume_score(&self, id: CandidateId, score: f32) -> Result<(), StoreError>;

    fn vacancy(&self, id: VacancyId) -> Result<Option<Vacancy>, StoreError>;

    /// The candidate's single application still in `Active` status.
    fn active_application(&self, id: CandidateId) -> Result<Option<Application>, StoreError>;
    fn application(&self, id: ApplicationId) -> Result<Option<Application>, StoreError>;
    fn insert_application(
        &self,
        candidate_id: CandidateId,
        vacancy_id: VacancyId,
    ) -> Result<Application, StoreError>;
    fn set_application_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<(), StoreError>;

    /// Question bank for a vacancy, sorted by the persisted `order` field.
    fn questions_for_vacancy(&self, id: VacancyId) -> Result<Vec<Question>, StoreError>;
    /// Swap a vacancy's question bank wholesale (HR import between flows).
    fn replace_question_bank(
        &self,
        vacancy_id: VacancyId,
        questions: Vec<NewQuestion>,
    ) -> Result<Vec<Question>, StoreError>;
}

/// Durable interaction state, the resumable progress record of one
/// candidate's questionnaire run. Updates are last-writer-wins on the single
/// owning conversation.
pub trait InteractionStore: Send + Sync {
    fn get(&self, application_id: ApplicationId) -> Result<Option<Interaction>, StoreError>;
    /// Create a fresh interaction at the first question. Fails with
    /// `Conflict` if a non-terminal interaction already exists for the
    /// application.
    fn create(
        &self,
        candidate_id: CandidateId,
        application_id: ApplicationId,
        vacancy_id: VacancyId,
        first_question: super::domain::QuestionId,
    ) -> Result<Interaction, StoreError>;
    fn update(&self, interaction: Interaction) -> Result<(), StoreError>;
    fn delete(&self, id: InteractionId) -> Result<(), StoreError>;
    /// Started interactions whose `last_active` is older than `cutoff`;
    /// consumed by the inactivity sweep.
    fn stale_started(&self, cutoff: DateTime<Utc>) -> Result<Vec<Interaction>, StoreError>;
}
