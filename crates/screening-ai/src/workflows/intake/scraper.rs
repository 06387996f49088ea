//! Resume-scraper boundary. The intake pipeline only needs an opaque
//! producer of profile data; page fetching and selector logic live in the
//! implementing crate.

use async_trait::async_trait;

use super::profile::ResumeProfile;
use crate::workflows::questionnaire::domain::VacancyId;

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("failed to fetch resume page: {0}")]
    Fetch(String),
    #[error("failed to parse resume page: {0}")]
    Parse(String),
}

#[async_trait]
pub trait ResumeScraper: Send + Sync {
    async fn fetch(&self, url: &str, vacancy_id: VacancyId)
        -> Result<ResumeProfile, ScrapeError>;
}
