use std::collections::BTreeMap;

use super::domain::{
    AnswerValue, ApplicationId, CandidateId, Interaction, InteractionId, Question, QuestionId,
    VacancyId,
};

/// Working copy of one conversation's state, built at start/resume and
/// flushed to the durable interaction after every mutating action.
///
/// The question list is a read-only snapshot of the vacancy's bank taken when
/// the session was built; the bank never changes mid-flow.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub candidate_id: CandidateId,
    pub application_id: ApplicationId,
    pub vacancy_id: VacancyId,
    pub interaction_id: InteractionId,
    pub questions: Vec<Question>,
    pub answers: BTreeMap<QuestionId, AnswerValue>,
    pub current_index: usize,
    pub review_page: usize,
    pub consent: Option<bool>,
    pub choice_case_insensitive: bool,
}

impl SessionContext {
    /// Rebuild the working copy from a stored interaction and its vacancy's
    /// ordered question list. Returns `None` when the stored pointer no
    /// longer resolves against the bank (question deleted between runs).
    pub fn from_interaction(
        interaction: &Interaction,
        questions: Vec<Question>,
        choice_case_insensitive: bool,
    ) -> Option<Self> {
        let current_index = questions
            .iter()
            .position(|question| question.id == interaction.current_question_id)?;

        Some(Self {
            candidate_id: interaction.candidate_id,
            application_id: interaction.application_id,
            vacancy_id: interaction.vacancy_id,
            interaction_id: interaction.id,
            questions,
            answers: interaction.answers.clone(),
            current_index,
            review_page: 0,
            consent: interaction.consent,
            choice_case_insensitive,
        })
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    pub fn index_of(&self, id: QuestionId) -> Option<usize> {
        self.questions.iter().position(|question| question.id == id)
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Whether the pointer sits on the last question of the bank.
    pub fn on_last_question(&self) -> bool {
        self.current_index + 1 >= self.questions.len()
    }

    /// Number of review pages under a fixed page size.
    pub fn review_page_count(&self, page_size: usize) -> usize {
        if self.questions.is_empty() || page_size == 0 {
            return 1;
        }
        self.questions.len().div_ceil(page_size)
    }

    /// Questions shown on a given review page, in bank order.
    pub fn review_slice(&self, page: usize, page_size: usize) -> &[Question] {
        if page_size == 0 {
            return &self.questions;
        }
        let start = page.saturating_mul(page_size).min(self.questions.len());
        let end = (start + page_size).min(self.questions.len());
        &self.questions[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::questionnaire::domain::AnswerShape;
    use chrono::Utc;

    fn question(id: i64, order: u32) -> Question {
        Question {
            id: QuestionId(id),
            vacancy_id: VacancyId(1),
            text: format!("question {order}"),
            order,
            expected: AnswerShape::Text,
            choices: Vec::new(),
            screening: None,
        }
    }

    fn interaction(current: QuestionId) -> Interaction {
        Interaction {
            id: InteractionId(7),
            candidate_id: CandidateId(1),
            application_id: ApplicationId(2),
            vacancy_id: VacancyId(1),
            current_question_id: current,
            answers: BTreeMap::new(),
            state: crate::workflows::questionnaire::domain::InteractionState::Paused,
            consent: Some(true),
            started_at: Utc::now(),
            last_active: Utc::now(),
            completed_at: None,
        }
    }

    #[test]
    fn rebuild_resolves_the_stored_pointer() {
        let questions = vec![question(10, 1), question(11, 2), question(12, 3)];
        let ctx =
            SessionContext::from_interaction(&interaction(QuestionId(11)), questions, false)
                .expect("pointer resolves");
        assert_eq!(ctx.current_index, 1);
        assert_eq!(ctx.consent, Some(true));
    }

    #[test]
    fn rebuild_fails_when_pointer_is_gone() {
        let questions = vec![question(10, 1)];
        assert!(
            SessionContext::from_interaction(&interaction(QuestionId(99)), questions, false)
                .is_none()
        );
    }

    #[test]
    fn review_pagination_chunks_in_order() {
        let questions = (0..7).map(|i| question(i, i as u32 + 1)).collect();
        let ctx = SessionContext::from_interaction(&interaction(QuestionId(0)), questions, false)
            .expect("pointer resolves");
        assert_eq!(ctx.review_page_count(3), 3);
        assert_eq!(ctx.review_slice(0, 3).len(), 3);
        assert_eq!(ctx.review_slice(2, 3).len(), 1);
        assert_eq!(ctx.review_slice(2, 3)[0].id, QuestionId(6));
        assert!(ctx.review_slice(5, 3).is_empty());
    }
}
