//! Question-bank import.
//!
//! HR teams maintain the questionnaire for a vacancy as a spreadsheet export;
//! this importer validates the rows into an ordered bank that can be swapped
//! in between interactions.

use std::io::Read;

use serde::{Deserialize, Deserializer};

use super::domain::{AnswerShape, NewQuestion, ScreeningCriteria};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("question bank export contained no rows")]
    Empty,
    #[error("unknown answer shape '{value}' in row {row}")]
    UnknownShape { row: usize, value: String },
    #[error("question order must be contiguous from 1: expected {expected}, found {found}")]
    NonContiguousOrder { expected: u32, found: u32 },
    #[error("choice question in row {row} lists no choices")]
    MissingChoices { row: usize },
}

/// Parse a question-bank CSV export into ordered [`NewQuestion`] drafts.
///
/// Expected columns: `Order`, `Question`, `Shape` (text/file/choice/info),
/// `Choices` (pipe-separated), `Screening` (truthy flag), `Criteria`.
pub fn parse_question_bank<R: Read>(reader: R) -> Result<Vec<NewQuestion>, ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (index, record) in csv_reader.deserialize::<QuestionRow>().enumerate() {
        let row = record?;
        rows.push((index + 1, row));
    }
    if rows.is_empty() {
        return Err(ImportError::Empty);
    }

    rows.sort_by_key(|(_, row)| row.order);

    let mut questions = Vec::with_capacity(rows.len());
    for (position, (row_number, row)) in rows.into_iter().enumerate() {
        let expected_order = position as u32 + 1;
        if row.order != expected_order {
            return Err(ImportError::NonContiguousOrder {
                expected: expected_order,
                found: row.order,
            });
        }

        let expected = parse_shape(&row.shape).ok_or_else(|| ImportError::UnknownShape {
            row: row_number,
            value: row.shape.clone(),
        })?;

        let choices: Vec<String> = row
            .choices
            .as_deref()
            .map(|raw| {
                raw.split('|')
                    .map(str::trim)
                    .filter(|label| !label.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if expected == AnswerShape::Choice && choices.is_empty() {
            return Err(ImportError::MissingChoices { row: row_number });
        }

        let screening = if row.screening {
            row.criteria
                .filter(|criteria| !criteria.is_empty())
                .map(|instruction| ScreeningCriteria { instruction })
        } else {
            None
        };

        questions.push(NewQuestion {
            text: row.question,
            order: row.order,
            expected,
            choices,
            screening,
        });
    }

    Ok(questions)
}

#[derive(Debug, Deserialize)]
struct QuestionRow {
    #[serde(rename = "Order")]
    order: u32,
    #[serde(rename = "Question")]
    question: String,
    #[serde(rename = "Shape")]
    shape: String,
    #[serde(rename = "Choices", default, deserialize_with = "empty_string_as_none")]
    choices: Option<String>,
    #[serde(rename = "Screening", default, deserialize_with = "truthy_flag")]
    screening: bool,
    #[serde(rename = "Criteria", default, deserialize_with = "empty_string_as_none")]
    criteria: Option<String>,
}

fn parse_shape(value: &str) -> Option<AnswerShape> {
    match value.trim().to_ascii_lowercase().as_str() {
        "text" => Some(AnswerShape::Text),
        "file" => Some(AnswerShape::File),
        "choice" => Some(AnswerShape::Choice),
        "info" => Some(AnswerShape::Info),
        _ => None,
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn truthy_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt
        .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false))
}
