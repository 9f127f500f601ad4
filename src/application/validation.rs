//! Input validation shared by the services.
//!
//! Validators collect every failing field of one input before returning, so a
//! caller sees all problems at once.

use std::{collections::BTreeMap, hash::Hash, ops::RangeInclusive};

use thiserror::Error;
use uuid::Uuid;

use crate::domain::constraints::{SEARCH_QUERY_CHARS, topics::NAME_CHARS as TOPIC_NAME_CHARS};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {subject}{}", describe_fields(.fields))]
pub struct ValidationError {
    pub subject: &'static str,
    pub fields: BTreeMap<String, String>,
}

impl ValidationError {
    pub fn single(subject: &'static str, field: &str, message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(field.to_string(), message.into());
        Self { subject, fields }
    }
}

fn describe_fields(fields: &BTreeMap<String, String>) -> String {
    let described: Vec<String> = fields
        .iter()
        .map(|(field, message)| format!("{field} {message}"))
        .collect();
    if described.is_empty() {
        String::new()
    } else {
        format!(": {}", described.join(", "))
    }
}

/// Field collector for one validated input.
#[derive(Debug)]
pub struct Report {
    subject: &'static str,
    fields: BTreeMap<String, String>,
}

impl Report {
    pub fn new(subject: &'static str) -> Self {
        Self {
            subject,
            fields: BTreeMap::new(),
        }
    }

    /// Record `check` under `field`. The first failure of a field wins.
    pub fn field(&mut self, field: &str, check: Result<(), String>) -> &mut Self {
        if let Err(message) = check {
            self.fields.entry(field.to_string()).or_insert(message);
        }
        self
    }

    /// Parse an id, recording a failure under `field`.
    pub fn uuid(&mut self, field: &str, value: &str) -> Option<Uuid> {
        match Uuid::parse_str(value.trim()) {
            Ok(id) => Some(id),
            Err(_) => {
                self.field(field, Err("must be a valid id".to_string()));
                None
            }
        }
    }

    pub fn finish(&mut self) -> Result<(), ValidationError> {
        if self.fields.is_empty() {
            return Ok(());
        }
        Err(ValidationError {
            subject: self.subject,
            fields: std::mem::take(&mut self.fields),
        })
    }

    /// Close the report and hand back the values its parsers produced.
    /// `parsed` is `None` only if one of them recorded a failure.
    pub fn finish_with<T>(&mut self, parsed: Option<T>) -> Result<T, ValidationError> {
        self.finish()?;
        parsed.ok_or_else(|| ValidationError::single(self.subject, "id", "must be a valid id"))
    }
}

pub fn parse_uuid(field: &'static str, value: &str) -> Result<Uuid, ValidationError> {
    Uuid::parse_str(value.trim())
        .map_err(|_| ValidationError::single(field, field, "must be a valid id"))
}

pub fn parse_optional_uuid(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<Uuid>, ValidationError> {
    value.map(|value| parse_uuid(field, value)).transpose()
}

pub fn char_length(value: &str, range: &RangeInclusive<usize>) -> Result<(), String> {
    let length = value.chars().count();
    if range.contains(&length) {
        Ok(())
    } else {
        Err(format!(
            "must be between {} and {} characters",
            range.start(),
            range.end()
        ))
    }
}

pub fn optional_char_length(
    value: Option<&str>,
    range: &RangeInclusive<usize>,
) -> Result<(), String> {
    value.map_or(Ok(()), |value| char_length(value, range))
}

pub fn count_within<T>(items: &[T], range: &RangeInclusive<usize>) -> Result<(), String> {
    if range.contains(&items.len()) {
        Ok(())
    } else {
        Err(format!(
            "must contain between {} and {} items",
            range.start(),
            range.end()
        ))
    }
}

pub fn email(value: &str) -> Result<(), String> {
    let trimmed = value.trim();
    let valid = match trimmed.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
        }
        None => false,
    };
    if valid && !trimmed.contains(char::is_whitespace) {
        Ok(())
    } else {
        Err("must be a valid email address".to_string())
    }
}

/// Trim a topic id and check its length.
pub fn topic_id(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let topic = value.trim();
    char_length(topic, &TOPIC_NAME_CHARS)
        .map_err(|message| ValidationError::single(field, field, message))?;
    Ok(topic.to_string())
}

pub fn topic_ids(field: &'static str, values: &[String]) -> Result<Vec<String>, ValidationError> {
    values.iter().map(|value| topic_id(field, value)).collect()
}

/// Validate an optional free-text search query.
pub fn search_query(subject: &'static str, query: Option<&str>) -> Result<(), ValidationError> {
    Report::new(subject)
        .field("q", optional_char_length(query, &SEARCH_QUERY_CHARS))
        .finish()
}

pub fn has_repetitions<T: Eq + Hash>(items: &[T]) -> bool {
    let mut seen = std::collections::HashSet::with_capacity(items.len());
    items.iter().any(|item| !seen.insert(item))
}
