//! Resume intake: scrape a batch of resume URLs, create candidate and
//! application records from whatever fields survived, and score the resume
//! text. Scrape failures skip the candidate; scoring failures degrade to a
//! zero score. Neither aborts the batch.

mod profile;
mod scraper;

pub use profile::{EmploymentPreferences, Experience, ResumeProfile};
pub use scraper::{ResumeScraper, ScrapeError};

use std::sync::Arc;

use tracing::{info, warn};

use crate::workflows::questionnaire::domain::{NewCandidate, VacancyId};
use crate::workflows::questionnaire::store::Directory;
use crate::workflows::scoring::{parse_score, ScoringClient};

const RESUME_INSTRUCTION: &str = "You are screening a job candidate's resume. Evaluate the \
resume below against the vacancy and reply with a single overall score from 0 to 10.";

/// One resume URL to ingest against a vacancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeSource {
    pub url: String,
    pub vacancy_id: VacancyId,
}

/// Outcome counters for one ingestion batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntakeReport {
    pub created: usize,
    pub skipped: usize,
    pub scored: usize,
}

/// Batch ingestion of scraped resumes into the screening directory.
pub struct IntakePipeline<D> {
    directory: Arc<D>,
    scraper: Arc<dyn ResumeScraper>,
    client: Arc<dyn ScoringClient>,
}

impl<D> IntakePipeline<D>
where
    D: Directory,
{
    pub fn new(
        directory: Arc<D>,
        scraper: Arc<dyn ResumeScraper>,
        client: Arc<dyn ScoringClient>,
    ) -> Self {
        Self {
            directory,
            scraper,
            client,
        }
    }

    pub async fn ingest(&self, batch: &[ResumeSource]) -> IntakeReport {
        let mut report = IntakeReport::default();

        for source in batch {
            let profile = match self.scraper.fetch(&source.url, source.vacancy_id).await {
                Ok(profile) => profile,
                Err(err) => {
                    warn!(url = %source.url, error = %err, "resume scrape failed, skipping candidate");
                    report.skipped += 1;
                    continue;
                }
            };

            let candidate = match self.directory.insert_candidate(candidate_draft(&profile)) {
                Ok(candidate) => candidate,
                Err(err) => {
                    warn!(url = %source.url, error = %err, "could not create candidate entry");
                    report.skipped += 1;
                    continue;
                }
            };
            if let Err(err) = self
                .directory
                .insert_application(candidate.id, source.vacancy_id)
            {
                warn!(candidate = candidate.id.0, error = %err, "could not create application entry");
                report.skipped += 1;
                continue;
            }
            report.created += 1;

            let score = match self
                .client
                .evaluate(&profile.summary_document(), RESUME_INSTRUCTION)
                .await
            {
                Ok(raw) => parse_score(&raw),
                Err(err) => {
                    warn!(candidate = candidate.id.0, error = %err, "resume scoring failed, recording zero");
                    0.0
                }
            };
            match self.directory.record_resume_score(candidate.id, score) {
                Ok(()) => report.scored += 1,
                Err(err) => {
                    warn!(candidate = candidate.id.0, error = %err, "could not persist resume score")
                }
            }
        }

        info!(
            created = report.created,
            skipped = report.skipped,
            scored = report.scored,
            "resume intake batch finished"
        );
        report
    }
}

/// Candidate record from a partial profile; absent names get a placeholder
/// so HR can still find the entry.
fn candidate_draft(profile: &ResumeProfile) -> NewCandidate {
    NewCandidate {
        chat: None,
        full_name: profile
            .name
            .clone()
            .unwrap_or_else(|| "Unnamed candidate".to_string()),
        city: profile.address.clone(),
        citizenship: profile.citizenship.clone(),
        relocation_ready: profile.ready_to_relocate,
        resume_url: Some(profile.link.clone()),
    }
}
