//! The REST surface under `/api/v1`, plus health probes.
//!
//! | Method | Path | Answer |
//! |---|---|---|
//! | GET | `/api/v1` | every employee |
//! | GET | `/api/v1/search/{name}` | employees whose name contains `name` |
//! | GET | `/api/v1/{id}` | one employee |
//! | GET | `/api/v1/highestSalary` | the highest salary |
//! | GET | `/api/v1/topTenHighestEarningEmployeeNames` | up to ten names |
//! | POST | `/api/v1` | the created employee |
//! | DELETE | `/api/v1/{id}` | the deleted employee's name |
//! | GET | `/health/live`, `/health/ready` | probe status |

mod error;
mod handlers;

pub use error::ApiError;

use crate::service::EmployeeService;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

/// Builds the application router around `service`.
pub fn router(service: EmployeeService) -> Router {
    Router::new()
        .route(
            "/api/v1",
            get(handlers::all_employees).post(handlers::create_employee),
        )
        .route(
            "/api/v1/",
            get(handlers::all_employees).post(handlers::create_employee),
        )
        .route("/api/v1/search/{name}", get(handlers::search_by_name))
        .route("/api/v1/highestSalary", get(handlers::highest_salary))
        .route(
            "/api/v1/topTenHighestEarningEmployeeNames",
            get(handlers::top_ten_highest_earning_names),
        )
        .route(
            "/api/v1/{id}",
            get(handlers::employee_by_id).delete(handlers::delete_employee_by_id),
        )
        .route("/health/live", get(handlers::health_live))
        .route("/health/ready", get(handlers::health_ready))
        .fallback(handlers::no_route)
        .with_state(service)
        .layer(CatchPanicLayer::custom(error::panic_response))
        .layer(middleware::from_fn(error::render_errors))
        .layer(TraceLayer::new_for_http())
}
