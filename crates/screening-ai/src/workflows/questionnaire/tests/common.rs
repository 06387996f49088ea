use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::config::QuestionnaireConfig;
use crate::workflows::questionnaire::domain::{
    AnswerShape, Application, ApplicationId, ApplicationStatus, Candidate, CandidateId, ChatId,
    Interaction, InteractionId, InteractionState, NewCandidate, NewQuestion, Question, QuestionId,
    ScreeningCriteria, Vacancy, VacancyId,
};
use crate::workflows::questionnaire::engine::ConversationEngine;
use crate::workflows::questionnaire::reminders::{ReminderEntry, ReminderQueue};
use crate::workflows::questionnaire::store::{Directory, InteractionStore, StoreError};
use crate::workflows::questionnaire::transport::{ChatTransport, OutboundMessage, TransportError};
use crate::workflows::scoring::{ScoringHandoff, ScoringJob};

#[derive(Default)]
struct DirectoryInner {
    candidates: HashMap<CandidateId, Candidate>,
    vacancies: HashMap<VacancyId, Vacancy>,
    applications: HashMap<ApplicationId, Application>,
    questions: Vec<Question>,
    next_candidate: i64,
    next_vacancy: i64,
    next_application: i64,
    next_question: i64,
}

#[derive(Default)]
pub(super) struct MemoryDirectory {
    inner: Mutex<DirectoryInner>,
}

impl MemoryDirectory {
    pub(super) fn seed_vacancy(&self, title: &str) -> VacancyId {
        let mut inner = self.inner.lock().expect("directory mutex poisoned");
        inner.next_vacancy += 1;
        let id = VacancyId(inner.next_vacancy);
        inner.vacancies.insert(
            id,
            Vacancy {
                id,
                title: title.to_string(),
                description: String::new(),
                created_at: Utc::now(),
            },
        );
        id
    }

    pub(super) fn seed_candidate(&self, chat: Option<&str>, name: &str) -> CandidateId {
        let mut inner = self.inner.lock().expect("directory mutex poisoned");
        inner.next_candidate += 1;
        let id = CandidateId(inner.next_candidate);
        inner.candidates.insert(
            id,
            Candidate {
                id,
                chat: chat.map(|chat| ChatId(chat.to_string())),
                full_name: name.to_string(),
                city: None,
                citizenship: None,
                relocation_ready: None,
                resume_url: None,
                resume_score: None,
                created_at: Utc::now(),
            },
        );
        id
    }

    pub(super) fn seed_application(
        &self,
        candidate_id: CandidateId,
        vacancy_id: VacancyId,
    ) -> ApplicationId {
        let mut inner = self.inner.lock().expect("directory mutex poisoned");
        inner.next_application += 1;
        let id = ApplicationId(inner.next_application);
        inner.applications.insert(
            id,
            Application {
                id,
                candidate_id,
                vacancy_id,
                status: ApplicationStatus::Active,
                applied_at: Utc::now(),
            },
        );
        id
    }

    pub(super) fn seed_question(
        &self,
        vacancy_id: VacancyId,
        order: u32,
        text: &str,
        expected: AnswerShape,
        choices: &[&str],
        screening: Option<&str>,
    ) -> QuestionId {
        let mut inner = self.inner.lock().expect("directory mutex poisoned");
        inner.next_question += 1;
        let id = QuestionId(inner.next_question);
        inner.questions.push(Question {
            id,
            vacancy_id,
            text: text.to_string(),
            order,
            expected,
            choices: choices.iter().map(|label| label.to_string()).collect(),
            screening: screening.map(|instruction| ScreeningCriteria {
                instruction: instruction.to_string(),
            }),
        });
        id
    }

    pub(super) fn application_status(&self, id: ApplicationId) -> Option<ApplicationStatus> {
        self.inner
            .lock()
            .expect("directory mutex poisoned")
            .applications
            .get(&id)
            .map(|application| application.status)
    }
}

impl Directory for MemoryDirectory {
    fn candidate_by_chat(&self, chat: &ChatId) -> Result<Option<Candidate>, StoreError> {
        let inner = self.inner.lock().expect("directory mutex poisoned");
        Ok(inner
            .candidates
            .values()
            .find(|candidate| candidate.chat.as_ref() == Some(chat))
            .cloned())
    }

    fn candidate(&self, id: CandidateId) -> Result<Option<Candidate>, StoreError> {
        let inner = self.inner.lock().expect("directory mutex poisoned");
        Ok(inner.candidates.get(&id).cloned())
    }

    fn insert_candidate(&self, candidate: NewCandidate) -> Result<Candidate, StoreError> {
        let mut inner = self.inner.lock().expect("directory mutex poisoned");
        inner.next_candidate += 1;
        let id = CandidateId(inner.next_candidate);
        let record = Candidate {
            id,
            chat: candidate.chat,
            full_name: candidate.full_name,
            city: candidate.city,
            citizenship: candidate.citizenship,
            relocation_ready: candidate.relocation_ready,
            resume_url: candidate.resume_url,
            resume_score: None,
            created_at: Utc::now(),
        };
        inner.candidates.insert(id, record.clone());
        Ok(record)
    }

    fn bind_chat(&self, id: CandidateId, chat: ChatId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("directory mutex poisoned");
        let candidate = inner.candidates.get_mut(&id).ok_or(StoreError::NotFound)?;
        candidate.chat = Some(chat);
        Ok(())
    }

    fn record_resume_score(&self, id: CandidateId, score: f32) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("directory mutex poisoned");
        let candidate = inner.candidates.get_mut(&id).ok_or(StoreError::NotFound)?;
        candidate.resume_score = Some(score);
        Ok(())
    }

    fn vacancy(&self, id: VacancyId) -> Result<Option<Vacancy>, StoreError> {
        let inner = self.inner.lock().expect("directory mutex poisoned");
        Ok(inner.vacancies.get(&id).cloned())
    }

    fn active_application(&self, id: CandidateId) -> Result<Option<Application>, StoreError> {
        let inner = self.inner.lock().expect("directory mutex poisoned");
        Ok(inner
            .applications
            .values()
            .find(|application| {
                application.candidate_id == id && application.status == ApplicationStatus::Active
            })
            .cloned())
    }

    fn application(&self, id: ApplicationId) -> Result<Option<Application>, StoreError> {
        let inner = self.inner.lock().expect("directory mutex poisoned");
        Ok(inner.applications.get(&id).cloned())
    }

    fn insert_application(
        &self,
        candidate_id: CandidateId,
        vacancy_id: VacancyId,
    ) -> Result<Application, StoreError> {
        let mut inner = self.inner.lock().expect("directory mutex poisoned");
        inner.next_application += 1;
        let id = ApplicationId(inner.next_application);
        let record = Application {
            id,
            candidate_id,
            vacancy_id,
            status: ApplicationStatus::Active,
            applied_at: Utc::now(),
        };
        inner.applications.insert(id, record.clone());
        Ok(record)
    }

    fn set_application_status(
        &self,
        id: ApplicationId,
        status: ApplicationStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("directory mutex poisoned");
        let application = inner.applications.get_mut(&id).ok_or(StoreError::NotFound)?;
        application.status = status;
        Ok(())
    }

    fn questions_for_vacancy(&self, id: VacancyId) -> Result<Vec<Question>, StoreError> {
        let inner = self.inner.lock().expect("directory mutex poisoned");
        let mut questions: Vec<Question> = inner
            .questions
            .iter()
            .filter(|question| question.vacancy_id == id)
            .cloned()
            .collect();
        questions.sort_by_key(|question| question.order);
        Ok(questions)
    }

    fn replace_question_bank(
        &self,
        vacancy_id: VacancyId,
        questions: Vec<NewQuestion>,
    ) -> Result<Vec<Question>, StoreError> {
        let mut inner = self.inner.lock().expect("directory mutex poisoned");
        inner.questions.retain(|question| question.vacancy_id != vacancy_id);
        let mut stored = Vec::with_capacity(questions.len());
        for draft in questions {
            inner.next_question += 1;
            let question = Question {
                id: QuestionId(inner.next_question),
                vacancy_id,
                text: draft.text,
                order: draft.order,
                expected: draft.expected,
                choices: draft.choices,
                screening: draft.screening,
            };
            inner.questions.push(question.clone());
            stored.push(question);
        }
        Ok(stored)
    }
}

#[derive(Default)]
pub(super) struct MemoryInteractionStore {
    records: Mutex<HashMap<ApplicationId, Interaction>>,
    next_id: Mutex<i64>,
}

impl MemoryInteractionStore {
    /// Age a stored interaction for retention/sweep tests.
    pub(super) fn rewind_last_active(&self, application_id: ApplicationId, by: Duration) {
        let mut records = self.records.lock().expect("interaction mutex poisoned");
        if let Some(record) = records.get_mut(&application_id) {
            record.last_active -= by;
        }
    }
}

impl InteractionStore for MemoryInteractionStore {
    fn get(&self, application_id: ApplicationId) -> Result<Option<Interaction>, StoreError> {
        let records = self.records.lock().expect("interaction mutex poisoned");
        Ok(records.get(&application_id).cloned())
    }

    fn create(
        &self,
        candidate_id: CandidateId,
        application_id: ApplicationId,
        vacancy_id: VacancyId,
        first_question: QuestionId,
    ) -> Result<Interaction, StoreError> {
        let mut records = self.records.lock().expect("interaction mutex poisoned");
        if records
            .get(&application_id)
            .is_some_and(|record| !record.state.is_terminal())
        {
            return Err(StoreError::Conflict);
        }
        let mut next_id = self.next_id.lock().expect("interaction id mutex poisoned");
        *next_id += 1;
        let now = Utc::now();
        let record = Interaction {
            id: InteractionId(*next_id),
            candidate_id,
            application_id,
            vacancy_id,
            current_question_id: first_question,
            answers: Default::default(),
            state: InteractionState::Started,
            consent: None,
            started_at: now,
            last_active: now,
            completed_at: None,
        };
        records.insert(application_id, record.clone());
        Ok(record)
    }

    fn update(&self, interaction: Interaction) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("interaction mutex poisoned");
        records.insert(interaction.application_id, interaction);
        Ok(())
    }

    fn delete(&self, id: InteractionId) -> Result<(), StoreError> {
        let mut records = self.records.lock().expect("interaction mutex poisoned");
        let key = records
            .values()
            .find(|record| record.id == id)
            .map(|record| record.application_id);
        match key {
            Some(key) => {
                records.remove(&key);
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    fn stale_started(&self, cutoff: DateTime<Utc>) -> Result<Vec<Interaction>, StoreError> {
        let records = self.records.lock().expect("interaction mutex poisoned");
        Ok(records
            .values()
            .filter(|record| {
                record.state == InteractionState::Started && record.last_active < cutoff
            })
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(super) struct MemoryReminderQueue {
    entries: Mutex<HashMap<ChatId, ReminderEntry>>,
}

impl ReminderQueue for MemoryReminderQueue {
    fn schedule(&self, entry: ReminderEntry) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().expect("reminder mutex poisoned");
        entries.insert(entry.chat.clone(), entry);
        Ok(())
    }

    fn due(&self, now: DateTime<Utc>) -> Result<Vec<ReminderEntry>, StoreError> {
        let mut entries = self.entries.lock().expect("reminder mutex poisoned");
        let due: Vec<ReminderEntry> = entries
            .values()
            .filter(|entry| entry.due_at <= now)
            .cloned()
            .collect();
        for entry in &due {
            entries.remove(&entry.chat);
        }
        Ok(due)
    }

    fn pending(&self) -> Result<usize, StoreError> {
        Ok(self.entries.lock().expect("reminder mutex poisoned").len())
    }
}

impl MemoryReminderQueue {
    pub(super) fn entry_for(&self, chat: &ChatId) -> Option<ReminderEntry> {
        self.entries
            .lock()
            .expect("reminder mutex poisoned")
            .get(chat)
            .cloned()
    }
}

#[derive(Default)]
pub(super) struct RecordingHandoff {
    jobs: Mutex<Vec<ScoringJob>>,
}

impl RecordingHandoff {
    pub(super) fn jobs(&self) -> Vec<ScoringJob> {
        self.jobs.lock().expect("handoff mutex poisoned").clone()
    }
}

impl ScoringHandoff for RecordingHandoff {
    fn dispatch(&self, job: ScoringJob) {
        self.jobs.lock().expect("handoff mutex poisoned").push(job);
    }
}

#[derive(Default)]
pub(super) struct RecordingTransport {
    deliveries: Mutex<Vec<(ChatId, OutboundMessage)>>,
}

impl RecordingTransport {
    pub(super) fn deliveries(&self) -> Vec<(ChatId, OutboundMessage)> {
        self.deliveries
            .lock()
            .expect("transport mutex poisoned")
            .clone()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn deliver(
        &self,
        chat: &ChatId,
        message: OutboundMessage,
    ) -> Result<(), TransportError> {
        self.deliveries
            .lock()
            .expect("transport mutex poisoned")
            .push((chat.clone(), message));
        Ok(())
    }
}

/// Token verifier backed by a fixed token → candidate mapping.
pub(super) struct StaticTokenVerifier {
    pub(super) token: String,
    pub(super) candidate: CandidateId,
}

impl crate::workflows::questionnaire::engine::TokenVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> Result<Option<CandidateId>, StoreError> {
        Ok((token == self.token).then_some(self.candidate))
    }
}

pub(super) struct World {
    pub(super) directory: Arc<MemoryDirectory>,
    pub(super) interactions: Arc<MemoryInteractionStore>,
    pub(super) reminders: Arc<MemoryReminderQueue>,
    pub(super) scoring: Arc<RecordingHandoff>,
    pub(super) engine:
        ConversationEngine<MemoryDirectory, MemoryInteractionStore, MemoryReminderQueue>,
    pub(super) chat: ChatId,
    pub(super) application_id: ApplicationId,
    pub(super) question_ids: Vec<QuestionId>,
}

/// Vacancy with the canonical three-question bank [text, choice{Yes,No},
/// text], one registered candidate, one active application.
pub(super) fn standard_world() -> World {
    let directory = Arc::new(MemoryDirectory::default());
    let vacancy_id = directory.seed_vacancy("Contact center operator");
    let candidate_id = directory.seed_candidate(Some("chat-1"), "Alice Petrova");
    let application_id = directory.seed_application(candidate_id, vacancy_id);
    let question_ids = vec![
        directory.seed_question(vacancy_id, 1, "What is your name?", AnswerShape::Text, &[], None),
        directory.seed_question(
            vacancy_id,
            2,
            "Are you ready for shift work?",
            AnswerShape::Choice,
            &["Yes", "No"],
            Some("must accept shift work"),
        ),
        directory.seed_question(
            vacancy_id,
            3,
            "Describe your last customer support experience.",
            AnswerShape::Text,
            &[],
            None,
        ),
    ];

    let interactions = Arc::new(MemoryInteractionStore::default());
    let reminders = Arc::new(MemoryReminderQueue::default());
    let scoring = Arc::new(RecordingHandoff::default());
    let engine = ConversationEngine::new(
        directory.clone(),
        interactions.clone(),
        reminders.clone(),
        scoring.clone(),
        QuestionnaireConfig::default(),
    );

    World {
        directory,
        interactions,
        reminders,
        scoring,
        engine,
        chat: ChatId("chat-1".to_string()),
        application_id,
        question_ids,
    }
}
