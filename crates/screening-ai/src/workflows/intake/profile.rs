//! Structured resume data produced by the scraper. Every field may be
//! missing after a partial scrape; downstream consumers accept what is
//! there.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::workflows::questionnaire::domain::VacancyId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeProfile {
    pub link: String,
    pub vacancy_id: VacancyId,
    pub name: Option<String>,
    pub age: Option<u8>,
    pub birth_date: Option<NaiveDate>,
    pub address: Option<String>,
    pub citizenship: Option<String>,
    pub ready_to_relocate: Option<bool>,
    pub job_search_status: Option<String>,
    pub salary: Option<String>,
    pub position: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub experiences: Vec<Experience>,
    pub employment: Option<EmploymentPreferences>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub company: String,
    pub position: String,
    /// Year-month bounds; an open end means the position is current.
    pub start: Option<(i32, u32)>,
    pub end: Option<(i32, u32)>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmploymentPreferences {
    pub employment_type: String,
    pub work_schedule: String,
}

impl ResumeProfile {
    /// Plain-text rendering of the profile for the scoring model.
    pub fn summary_document(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!("Resume: {}", self.link));
        if let Some(name) = &self.name {
            lines.push(format!("Name: {name}"));
        }
        if let Some(age) = self.age {
            lines.push(format!("Age: {age}"));
        }
        if let Some(position) = &self.position {
            lines.push(format!("Desired position: {position}"));
        }
        if let Some(salary) = &self.salary {
            lines.push(format!("Salary expectation: {salary}"));
        }
        if let Some(address) = &self.address {
            lines.push(format!("Location: {address}"));
        }
        if let Some(citizenship) = &self.citizenship {
            lines.push(format!("Citizenship: {citizenship}"));
        }
        if let Some(ready) = self.ready_to_relocate {
            lines.push(format!(
                "Ready to relocate: {}",
                if ready { "yes" } else { "no" }
            ));
        }
        if let Some(status) = &self.job_search_status {
            lines.push(format!("Job search status: {status}"));
        }
        if !self.skills.is_empty() {
            lines.push(format!("Skills: {}", self.skills.join(", ")));
        }
        if let Some(employment) = &self.employment {
            lines.push(format!(
                "Preferred employment: {} ({})",
                employment.employment_type, employment.work_schedule
            ));
        }
        for experience in &self.experiences {
            let period = match (experience.start, experience.end) {
                (Some((sy, sm)), Some((ey, em))) => format!("{sy}-{sm:02} to {ey}-{em:02}"),
                (Some((sy, sm)), None) => format!("since {sy}-{sm:02}"),
                _ => "period unknown".to_string(),
            };
            let mut line = format!(
                "Experience: {} at {} ({period})",
                experience.position, experience.company
            );
            if let Some(description) = &experience.description {
                line.push_str(&format!(": {description}"));
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_skips_missing_fields() {
        let profile = ResumeProfile {
            link: "https://example.com/resume/1".to_string(),
            vacancy_id: VacancyId(1),
            name: Some("Alice Petrova".to_string()),
            age: None,
            birth_date: None,
            address: None,
            citizenship: None,
            ready_to_relocate: Some(false),
            job_search_status: None,
            salary: None,
            position: Some("Support operator".to_string()),
            skills: vec!["CRM".to_string()],
            experiences: vec![Experience {
                company: "Acme".to_string(),
                position: "Operator".to_string(),
                start: Some((2022, 3)),
                end: None,
                description: None,
            }],
            employment: None,
        };

        let summary = profile.summary_document();
        assert!(summary.contains("Name: Alice Petrova"));
        assert!(summary.contains("Ready to relocate: no"));
        assert!(summary.contains("since 2022-03"));
        assert!(!summary.contains("Age:"));
        assert!(!summary.contains("Salary"));
    }
}
