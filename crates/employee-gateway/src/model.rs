//! Wire types shared by the upstream client and the REST facade.

use serde::{Deserialize, Deserializer, Serialize};

/// An employee record as the upstream stores it.
///
/// The same `employee_*` field names are used on both sides of the facade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(rename = "employee_name")]
    pub name: String,
    #[serde(rename = "employee_salary")]
    pub salary: i64,
    #[serde(rename = "employee_age", default)]
    pub age: i64,
    #[serde(rename = "employee_title", default)]
    pub title: String,
    #[serde(
        rename = "employee_email",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub email: Option<String>,
}

// Some upstream fixtures use numeric ids; the facade treats them as opaque text.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

/// A validated request to create an employee.
///
/// Only [`validation`](crate::validation) constructs these from client input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateEmployeeRequest {
    pub name: String,
    pub salary: i64,
    pub age: i64,
    pub title: String,
}

/// Body of the upstream's delete call, which addresses employees by name.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteEmployeeRequest<'a> {
    pub name: &'a str,
}

/// The upstream's `{ "data": ... }` wrapper. Other envelope fields are ignored.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
}
