pub mod intake;
pub mod questionnaire;
pub mod scoring;
