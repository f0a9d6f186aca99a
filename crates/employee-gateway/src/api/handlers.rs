use super::error::ApiError;
use crate::model::{CreateEmployeeRequest, Employee};
use crate::service::{DeleteOutcome, EmployeeService};
use crate::validation::CreateEmployeeDraft;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{StatusCode, Uri};
use axum::Json;
use serde_json::{json, Value};

pub(crate) async fn all_employees(
    State(service): State<EmployeeService>,
) -> Result<Json<Vec<Employee>>, ApiError> {
    let employees = service.all_employees().await?;
    Ok(Json(employees.as_ref().clone()))
}

pub(crate) async fn search_by_name(
    State(service): State<EmployeeService>,
    Path(name): Path<String>,
) -> Result<Json<Vec<Employee>>, ApiError> {
    Ok(Json(service.search_by_name(&name).await?))
}

pub(crate) async fn employee_by_id(
    State(service): State<EmployeeService>,
    Path(id): Path<String>,
) -> Result<Json<Employee>, ApiError> {
    service
        .employee_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Employee with id '{id}' not found")))
}

pub(crate) async fn highest_salary(
    State(service): State<EmployeeService>,
) -> Result<Json<i64>, ApiError> {
    service
        .highest_salary()
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No employees found".to_string()))
}

pub(crate) async fn top_ten_highest_earning_names(
    State(service): State<EmployeeService>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(service.top_ten_highest_earning_names().await?))
}

pub(crate) async fn create_employee(
    State(service): State<EmployeeService>,
    payload: Result<Json<CreateEmployeeDraft>, JsonRejection>,
) -> Result<Json<Employee>, ApiError> {
    let Json(draft) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let request = CreateEmployeeRequest::try_from(draft)
        .map_err(|errors| ApiError::BadRequest(errors.to_string()))?;

    Ok(Json(service.create_employee(request).await?))
}

pub(crate) async fn delete_employee_by_id(
    State(service): State<EmployeeService>,
    Path(id): Path<String>,
) -> Result<Json<String>, ApiError> {
    match service.delete_employee_by_id(&id).await? {
        DeleteOutcome::Deleted(name) => Ok(Json(name)),
        DeleteOutcome::UnknownId => Err(ApiError::NotFound(format!(
            "Employee with id '{id}' not found"
        ))),
        DeleteOutcome::NotDeleted => Err(ApiError::NotFound(format!(
            "employee '{id}' was not deleted"
        ))),
    }
}

/// Liveness: the process is up.
pub(crate) async fn health_live() -> Json<Value> {
    Json(json!({ "status": "alive" }))
}

/// Readiness: 503 while the upstream circuit is open.
pub(crate) async fn health_ready(
    State(service): State<EmployeeService>,
) -> (StatusCode, Json<Value>) {
    let circuit = service.circuit();
    let status =
        StatusCode::from_u16(circuit.http_status()).unwrap_or(StatusCode::SERVICE_UNAVAILABLE);

    (
        status,
        Json(json!({
            "status": circuit.health_status(),
            "circuit_state": circuit.state().as_str(),
        })),
    )
}

pub(crate) async fn no_route(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("No route for {}", uri.path()))
}
