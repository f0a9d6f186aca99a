//! Validation of create requests before anything reaches the upstream.

use crate::model::CreateEmployeeRequest;
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// Lowest accepted age.
pub const MIN_AGE: i64 = 16;
/// Highest accepted age.
pub const MAX_AGE: i64 = 75;

/// A create request as the client sent it, every field still optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateEmployeeDraft {
    pub name: Option<String>,
    pub salary: Option<i64>,
    pub age: Option<i64>,
    pub title: Option<String>,
}

/// One rejected field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every field error of a rejected draft, in field order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join(.0))]
pub struct ValidationErrors(pub Vec<FieldError>);

fn join(errors: &[FieldError]) -> String {
    if errors.is_empty() {
        return "Validation failed".to_string();
    }
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Checks a draft against the create constraints.
///
/// Returns an empty list when the draft is acceptable.
pub fn validate(draft: &CreateEmployeeDraft) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if is_blank(draft.name.as_deref()) {
        errors.push(FieldError {
            field: "name",
            message: "Name is required and cannot be blank",
        });
    }

    match draft.salary {
        None => errors.push(FieldError {
            field: "salary",
            message: "Salary is required",
        }),
        Some(salary) if salary < 1 => errors.push(FieldError {
            field: "salary",
            message: "Salary must be greater than zero",
        }),
        Some(_) => {}
    }

    match draft.age {
        None => errors.push(FieldError {
            field: "age",
            message: "Age is required",
        }),
        Some(age) if age < MIN_AGE => errors.push(FieldError {
            field: "age",
            message: "Age must be at least 16",
        }),
        Some(age) if age > MAX_AGE => errors.push(FieldError {
            field: "age",
            message: "Age must not exceed 75",
        }),
        Some(_) => {}
    }

    if is_blank(draft.title.as_deref()) {
        errors.push(FieldError {
            field: "title",
            message: "Title is required and cannot be blank",
        });
    }

    errors
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

impl TryFrom<CreateEmployeeDraft> for CreateEmployeeRequest {
    type Error = ValidationErrors;

    fn try_from(draft: CreateEmployeeDraft) -> Result<Self, Self::Error> {
        let errors = validate(&draft);
        match draft {
            CreateEmployeeDraft {
                name: Some(name),
                salary: Some(salary),
                age: Some(age),
                title: Some(title),
            } if errors.is_empty() => Ok(CreateEmployeeRequest {
                name,
                salary,
                age,
                title,
            }),
            _ => Err(ValidationErrors(errors)),
        }
    }
}
