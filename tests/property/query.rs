//! Property tests for the query engine.
//!
//! Invariants tested:
//! - Search is case-insensitive and never invents employees
//! - Any slice of a name finds it, in every script
//! - The highest salary bounds every salary
//! - Top earners are sorted, capped at ten, and stable on ties

use employee_gateway::query::{self, TOP_EARNERS};
use employee_gateway::Employee;
use proptest::prelude::*;
use std::cmp::Reverse;

fn employee() -> impl Strategy<Value = Employee> {
    ("[a-zA-Z ]{0,12}", 0i64..200_000).prop_map(|(name, salary)| Employee {
        id: String::new(),
        name,
        salary,
        age: 30,
        title: "Engineer".to_string(),
        email: None,
    })
}

fn collection() -> impl Strategy<Value = Vec<Employee>> {
    prop::collection::vec(employee(), 0..40).prop_map(|mut employees| {
        for (i, e) in employees.iter_mut().enumerate() {
            e.id = i.to_string();
        }
        employees
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: the case of the query never changes the result
    #[test]
    fn search_ignores_case(employees in collection(), needle in "[a-zA-Z]{1,3}") {
        let lower = query::search_by_name(&employees, &needle.to_lowercase());
        let upper = query::search_by_name(&employees, &needle.to_uppercase());
        prop_assert_eq!(lower, upper);
    }

    /// Property: every hit contains the query and keeps collection order
    #[test]
    fn search_returns_a_subsequence(employees in collection(), needle in "[a-z]{1,2}") {
        let hits = query::search_by_name(&employees, &needle);
        for hit in &hits {
            prop_assert!(hit.name.to_lowercase().contains(&needle));
        }

        let expected: Vec<_> = employees
            .iter()
            .filter(|e| e.name.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        prop_assert_eq!(hits, expected);
    }

    /// Property: any slice of a name finds that name, whatever the script
    #[test]
    fn any_slice_of_a_name_finds_it(name in "\\PC{1,12}", a in 0usize..12, b in 0usize..12) {
        let chars: Vec<char> = name.chars().collect();
        let start = a % chars.len();
        let end = start + 1 + b % (chars.len() - start);
        let slice: String = chars[start..end].iter().collect();
        let employees = vec![Employee {
            id: "0".to_string(),
            name: name.clone(),
            salary: 1,
            age: 30,
            title: "Engineer".to_string(),
            email: None,
        }];

        prop_assert_eq!(query::search_by_name(&employees, &slice).len(), 1);
    }

    /// Property: the highest salary is attained and bounds all others
    #[test]
    fn highest_salary_is_the_maximum(employees in collection()) {
        match query::highest_salary(&employees) {
            None => prop_assert!(employees.is_empty()),
            Some(max) => {
                prop_assert!(employees.iter().all(|e| e.salary <= max));
                prop_assert!(employees.iter().any(|e| e.salary == max));
            }
        }
    }

    /// Property: top earners are capped, descending, and ties keep input order
    #[test]
    fn top_earners_are_sorted_and_stable(employees in collection()) {
        let names = query::top_ten_names(&employees);
        prop_assert_eq!(names.len(), employees.len().min(TOP_EARNERS));

        let mut ranked: Vec<usize> = (0..employees.len()).collect();
        ranked.sort_unstable_by_key(|&i| (Reverse(employees[i].salary), i));
        let expected: Vec<String> = ranked
            .into_iter()
            .take(TOP_EARNERS)
            .map(|i| employees[i].name.clone())
            .collect();
        prop_assert_eq!(names, expected);
    }

    /// Property: lookup by id finds exactly the record carrying that id
    #[test]
    fn by_id_finds_the_matching_record(employees in collection(), index in 0usize..50) {
        let id = index.to_string();
        match query::by_id(&employees, &id) {
            Some(found) => prop_assert_eq!(&found.id, &id),
            None => prop_assert!(index >= employees.len()),
        }
    }
}
