//! Read-only views derived from a snapshot of the employee collection.
//!
//! Every function here takes a borrowed slice and never mutates it; callers
//! pass the cached snapshot directly.

use crate::model::Employee;

/// Number of names returned by [`top_ten_names`].
pub const TOP_EARNERS: usize = 10;

/// Returns the first employee whose id equals `id` exactly.
pub fn by_id<'a>(employees: &'a [Employee], id: &str) -> Option<&'a Employee> {
    employees.iter().find(|e| e.id == id)
}

/// Returns every employee whose folded name contains `query` folded, in
/// snapshot order.
///
/// Folding maps each character on its own to its first lowercase character,
/// so neighbouring letters never change the result (`Σ` is always `σ`) and
/// the folded text has as many characters as the input.
pub fn search_by_name(employees: &[Employee], query: &str) -> Vec<Employee> {
    let needle = fold(query);
    employees
        .iter()
        .filter(|e| fold(&e.name).contains(&needle))
        .cloned()
        .collect()
}

fn fold(text: &str) -> String {
    text.chars()
        .map(|c| c.to_lowercase().next().unwrap_or(c))
        .collect()
}

/// The largest salary in the snapshot, or `None` when it is empty.
pub fn highest_salary(employees: &[Employee]) -> Option<i64> {
    employees.iter().map(|e| e.salary).max()
}

/// Names of the ten best-paid employees, highest salary first.
///
/// Equal salaries keep their snapshot order.
pub fn top_ten_names(employees: &[Employee]) -> Vec<String> {
    let mut ranked: Vec<&Employee> = employees.iter().collect();
    // `sort_by` is stable.
    ranked.sort_by(|a, b| b.salary.cmp(&a.salary));
    ranked
        .into_iter()
        .take(TOP_EARNERS)
        .map(|e| e.name.clone())
        .collect()
}
