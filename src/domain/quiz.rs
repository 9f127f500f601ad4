//! Quiz page schema.

use serde::{Deserialize, Serialize};

use super::constraints::quiz::{ANSWER_CHARS, ANSWERS, QUESTIONS, TEXT_CHARS};
use super::error::DomainError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub name: String,
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub title: String,
    pub answers: Vec<QuizAnswer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizAnswer {
    pub answer: String,
    #[serde(rename = "isCorrect")]
    pub is_correct: bool,
}

impl Quiz {
    /// Decode a quiz page body and check it against the schema limits.
    pub fn parse(bytes: &[u8]) -> Result<Self, DomainError> {
        let quiz: Quiz = serde_json::from_slice(bytes).map_err(|err| DomainError::InvalidQuiz {
            reasons: vec![format!("quiz is not valid JSON: {err}")],
        })?;
        quiz.validate()?;
        Ok(quiz)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        let mut reasons = Vec::new();

        check_chars(&mut reasons, "Quiz name", &self.name, &TEXT_CHARS);
        if !QUESTIONS.contains(&self.questions.len()) {
            reasons.push(format!(
                "Quiz must contain between {} and {} questions",
                QUESTIONS.start(),
                QUESTIONS.end()
            ));
        }

        for question in &self.questions {
            check_chars(&mut reasons, "Quiz question", &question.title, &TEXT_CHARS);
            if !ANSWERS.contains(&question.answers.len()) {
                reasons.push(format!(
                    "Quiz question must contain between {} and {} answers",
                    ANSWERS.start(),
                    ANSWERS.end()
                ));
            }
            for answer in &question.answers {
                check_chars(&mut reasons, "Quiz answer", &answer.answer, &ANSWER_CHARS);
            }
        }

        if reasons.is_empty() {
            Ok(())
        } else {
            Err(DomainError::InvalidQuiz { reasons })
        }
    }
}

fn check_chars(
    reasons: &mut Vec<String>,
    field: &str,
    value: &str,
    bounds: &std::ops::RangeInclusive<usize>,
) {
    let len = value.chars().count();
    if len < *bounds.start() {
        reasons.push(format!(
            "{field} must have at least {} characters",
            bounds.start()
        ));
    } else if len > *bounds.end() {
        reasons.push(format!("{field} must have at max {} characters", bounds.end()));
    }
}
