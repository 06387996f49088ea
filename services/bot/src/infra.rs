use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use screening_ai::workflows::questionnaire::{
    AnswerShape, Application, ApplicationId, ApplicationStatus, Candidate, CandidateId,
    ChatTransport, ChatId, Directory, Interaction, InteractionId, InteractionState,
    InteractionStore, NewCandidate, NewQuestion, OutboundMessage, Question, QuestionId,
    ReminderEntry, ReminderQueue, ScreeningCriteria, StoreError, TransportError, Vacancy,
    VacancyId,
};
use screening_ai::workflows::scoring::{
    HrNotification, NotificationError, NotificationSink, ScoreRepository, ScoringResult,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct DirectoryInner {
    candidates: HashMap<CandidateId, Candidate>,
    vacancies: HashMap<VacancyId, Vacancy>,
    applications: HashMap<ApplicationId, Application>,
    questions: Vec<Question>,
    next_id: i64,
}

/// Relational directory backed by process memory. Stands in for the real
/// database adapter behind the same trait.
#[derive(Default)]
pub(crate) struct InMemoryDirectory {
    inner: Mutex<DirectoryInner>,
}

impl InMemoryDirectory {
    fn next_id(inner: &mut DirectoryInner) -> i64 {
        inner.next_id += 1;
        inner.next_id
    }

    pub(crate) fn seed_vacancy(&self, title: &str, description: &str) -> VacancyId {
        let mut inner = self.inner.lock().expect("directory mutex poisoned");
        let id = VacancyId(Self::next_id(&mut inner));
        inner.vacancies.insert(
            id,
            Vacancy {
                id,
                title: title.to_string(),
                description: description.to_string(),
                created_at: Utc::now(),
            },
        );
        id
    }

    pub(crate) fn seed_candidate(&self, chat: &str, name: &str) -> CandidateId {
        let mut inner = self.inner.lock().expect("directory mutex poisoned");
        let id = CandidateId(Self::next_id(&mut inner));
        inner.candidates.insert(
            id,
            Candidate {
                id,
                chat: Some(ChatId(chat.to_string())),
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

    pub(crate) fn seed_application(
        &self,
        candidate_id: CandidateId,
        vacancy_id: VacancyId,
    ) -> ApplicationId {
        let mut inner = self.inner.lock().expect("directory mutex poisoned");
        let id = ApplicationId(Self::next_id(&mut inner));
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
}

impl Directory for InMemoryDirectory {
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
        let id = CandidateId(Self::next_id(&mut inner));
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
        let id = ApplicationId(Self::next_id(&mut inner));
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
            let id = QuestionId(Self::next_id(&mut inner));
            let question = Question {
                id,
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
pub(crate) struct InMemoryInteractionStore {
    records: Mutex<HashMap<ApplicationId, Interaction>>,
    next_id: Mutex<i64>,
}

impl InteractionStore for InMemoryInteractionStore {
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
pub(crate) struct InMemoryReminderQueue {
    entries: Mutex<HashMap<ChatId, ReminderEntry>>,
}

impl ReminderQueue for InMemoryReminderQueue {
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

#[derive(Default)]
pub(crate) struct InMemoryScoreRepository {
    results: Mutex<Vec<ScoringResult>>,
}

impl ScoreRepository for InMemoryScoreRepository {
    fn record(&self, result: ScoringResult) -> Result<(), StoreError> {
        self.results
            .lock()
            .expect("score mutex poisoned")
            .push(result);
        Ok(())
    }

    fn for_application(&self, id: ApplicationId) -> Result<Vec<ScoringResult>, StoreError> {
        Ok(self
            .results
            .lock()
            .expect("score mutex poisoned")
            .iter()
            .filter(|result| result.application_id == id)
            .cloned()
            .collect())
    }
}

/// HR notifications are logged until a real channel (mail, messenger) is
/// wired up.
#[derive(Default)]
pub(crate) struct LoggingNotificationSink;

impl NotificationSink for LoggingNotificationSink {
    fn notify(&self, notification: HrNotification) -> Result<(), NotificationError> {
        info!(
            application = notification.application_id.0,
            candidate = notification.candidate_id.0,
            score = notification.score,
            decision = %notification.decision,
            "HR notification queued"
        );
        Ok(())
    }
}

/// Outbound push transport that logs instead of calling a messenger API;
/// webhook replies carry the real messages inline.
#[derive(Default)]
pub(crate) struct LoggingTransport;

#[async_trait]
impl ChatTransport for LoggingTransport {
    async fn deliver(&self, chat: &ChatId, message: OutboundMessage) -> Result<(), TransportError> {
        info!(chat = %chat, body = message.body(), "outbound push message");
        Ok(())
    }
}

/// Demo question bank for the built-in vacancy.
pub(crate) fn demo_questions() -> Vec<NewQuestion> {
    vec![
        NewQuestion {
            text: "What is your full name?".to_string(),
            order: 1,
            expected: AnswerShape::Text,
            choices: Vec::new(),
            screening: None,
        },
        NewQuestion {
            text: "Are you ready to work in shifts, including nights?".to_string(),
            order: 2,
            expected: AnswerShape::Choice,
            choices: vec!["Yes".to_string(), "No".to_string()],
            screening: Some(ScreeningCriteria {
                instruction: "the role requires accepting night shifts".to_string(),
            }),
        },
        NewQuestion {
            text: "Describe your most recent customer support experience.".to_string(),
            order: 3,
            expected: AnswerShape::Text,
            choices: Vec::new(),
            screening: Some(ScreeningCriteria {
                instruction: "prior contact-center experience is a strong plus".to_string(),
            }),
        },
    ]
}

pub(crate) struct DemoSeed {
    pub(crate) chat: ChatId,
}


/// Seed the in-memory directory with one vacancy, its question bank, and a
/// registered candidate so the webhook has something to talk to.
pub(crate) fn seed_demo_data(directory: &InMemoryDirectory) -> DemoSeed {
    let vacancy_id = directory.seed_vacancy(
        "Contact center operator",
        "Contact center operator, Yekaterinburg",
    );
    directory
        .replace_question_bank(vacancy_id, demo_questions())
        .expect("in-memory bank swap cannot fail");
    let candidate_id = directory.seed_candidate("demo-chat", "Alice Petrova");
    directory.seed_application(candidate_id, vacancy_id);
    DemoSeed {
        chat: ChatId("demo-chat".to_string()),
    }
}
