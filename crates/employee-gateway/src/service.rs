//! Employee operations the REST facade is built on.
//!
//! Reads are answered from the cached collection; writes go to the upstream
//! and invalidate the cache once they succeed.

use crate::model::{CreateEmployeeRequest, Employee};
use crate::query;
use crate::upstream::ResilientUpstream;
use employee_gateway_cache::CollectionCache;
use employee_gateway_circuitbreaker::{CircuitHandle, CircuitState};
use employee_gateway_core::UpstreamError;
use std::sync::Arc;

/// Name of the single cache entry.
pub const CACHE_NAME: &str = "all-employees";

/// Outcome of a delete by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The upstream deleted the employee with this name.
    Deleted(String),
    /// No employee has the id; the upstream was not called.
    UnknownId,
    /// The upstream answered the delete with `false`.
    NotDeleted,
}

/// Employee operations over the cached, resilient upstream.
#[derive(Clone)]
pub struct EmployeeService {
    upstream: ResilientUpstream,
    cache: CollectionCache<Vec<Employee>, UpstreamError>,
}

impl EmployeeService {
    pub fn new(upstream: ResilientUpstream) -> Self {
        let cache = CollectionCache::builder().name(CACHE_NAME).build();
        Self { upstream, cache }
    }

    /// The collection cache, for inspection.
    pub fn cache(&self) -> &CollectionCache<Vec<Employee>, UpstreamError> {
        &self.cache
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.upstream.circuit_state()
    }

    pub fn circuit(&self) -> &CircuitHandle {
        self.upstream.circuit()
    }

    /// Snapshot of every employee, fetched once and shared by concurrent misses.
    pub async fn all_employees(&self) -> Result<Arc<Vec<Employee>>, UpstreamError> {
        let upstream = &self.upstream;
        self.cache.get_or_fill(|| upstream.list_all()).await
    }

    /// Employees whose name contains `fragment`, ignoring case.
    pub async fn search_by_name(&self, fragment: &str) -> Result<Vec<Employee>, UpstreamError> {
        if fragment.trim().is_empty() {
            return Err(UpstreamError::InvalidInput {
                message: "Search string cannot be blank".to_string(),
            });
        }
        let employees = self.all_employees().await?;
        Ok(query::search_by_name(&employees, fragment))
    }

    /// The employee with `id`, or `None` when there is none.
    pub async fn employee_by_id(&self, id: &str) -> Result<Option<Employee>, UpstreamError> {
        require_id(id)?;
        let employees = self.all_employees().await?;
        Ok(query::by_id(&employees, id).cloned())
    }

    pub async fn highest_salary(&self) -> Result<Option<i64>, UpstreamError> {
        let employees = self.all_employees().await?;
        Ok(query::highest_salary(&employees))
    }

    pub async fn top_ten_highest_earning_names(&self) -> Result<Vec<String>, UpstreamError> {
        let employees = self.all_employees().await?;
        Ok(query::top_ten_names(&employees))
    }

    /// Creates an employee upstream and drops the cached collection.
    ///
    /// The new record is not spliced into the cache; the next read refetches.
    pub async fn create_employee(
        &self,
        request: CreateEmployeeRequest,
    ) -> Result<Employee, UpstreamError> {
        let created = self.upstream.create(request).await?;
        self.cache.invalidate();
        tracing::info!(id = %created.id, name = %created.name, "employee created");
        Ok(created)
    }

    /// Deletes the employee with `id`.
    ///
    /// The upstream deletes by name, so the id is first resolved against the
    /// cached collection. An unknown id never reaches the upstream.
    pub async fn delete_employee_by_id(&self, id: &str) -> Result<DeleteOutcome, UpstreamError> {
        require_id(id)?;

        let name = {
            let employees = self.all_employees().await?;
            match query::by_id(&employees, id) {
                Some(employee) => employee.name.clone(),
                None => return Ok(DeleteOutcome::UnknownId),
            }
        };

        if !self.upstream.delete_by_name(name.clone()).await? {
            tracing::warn!(id, name = %name, "upstream declined delete");
            return Ok(DeleteOutcome::NotDeleted);
        }

        self.cache.invalidate();
        tracing::info!(id, name = %name, "employee deleted");
        Ok(DeleteOutcome::Deleted(name))
    }
}

fn require_id(id: &str) -> Result<(), UpstreamError> {
    if id.trim().is_empty() {
        return Err(UpstreamError::InvalidInput {
            message: "Employee ID cannot be blank".to_string(),
        });
    }
    Ok(())
}
