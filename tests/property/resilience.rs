//! Property tests for the resilient upstream.
//!
//! Invariants tested:
//! - Transient failures are retried up to the attempt budget and no further
//! - Rejections of the request itself are attempted exactly once
//! - Rejections never open the circuit

use employee_gateway::{
    ResilienceSettings, ResilientUpstream, UpstreamError, UpstreamRequest, UpstreamResponse,
};
use employee_gateway_circuitbreaker::CircuitState;
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::runtime::Runtime;

const BUDGET: usize = 5;

fn settings(max_attempts: usize) -> ResilienceSettings {
    ResilienceSettings {
        max_attempts,
        base_delay: Duration::from_millis(1),
        window_size: 1000,
        minimum_calls: 1000,
        ..ResilienceSettings::default()
    }
}

/// Fails the first `failures` calls with `error`, then lists nobody.
fn scripted(failures: usize, error: UpstreamError) -> (Arc<AtomicUsize>, ResilientUpstream) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let fake = tower::service_fn(move |_req: UpstreamRequest| {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        let error = error.clone();
        async move {
            if n < failures {
                Err(error)
            } else {
                Ok(UpstreamResponse::Employees(Vec::new()))
            }
        }
    });
    (calls, ResilientUpstream::new(fake, &settings(BUDGET)))
}

fn transient() -> impl Strategy<Value = UpstreamError> {
    prop_oneof![
        (500u16..600).prop_map(|status| UpstreamError::UpstreamServer { status }),
        Just(UpstreamError::unavailable("connection reset")),
        (proptest::option::of(0u64..10))
            .prop_map(|retry_after| UpstreamError::RateLimited { retry_after }),
    ]
}

fn rejection() -> impl Strategy<Value = UpstreamError> {
    prop_oneof![
        "[a-z ]{1,20}".prop_map(|message| UpstreamError::InvalidInput { message }),
        "[a-z]{1,10}".prop_map(|resource| UpstreamError::NotFound { resource }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: attempts stop at the first success or at the budget
    #[test]
    fn transient_failures_use_the_budget(failures in 0usize..8, error in transient()) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let (calls, upstream) = scripted(failures, error);
            let result = upstream.list_all().await;

            prop_assert_eq!(calls.load(Ordering::SeqCst), (failures + 1).min(BUDGET));
            prop_assert_eq!(result.is_ok(), failures < BUDGET);
            Ok(())
        })?;
    }

    /// Property: rejections are never retried
    #[test]
    fn rejections_are_attempted_once(error in rejection()) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let (calls, upstream) = scripted(usize::MAX, error.clone());
            let result = upstream.list_all().await;

            prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
            prop_assert_eq!(result.unwrap_err(), error);
            Ok(())
        })?;
    }

    /// Property: any number of rejections leaves the circuit closed
    #[test]
    fn rejections_never_open_the_circuit(errors in prop::collection::vec(rejection(), 1..30)) {
        let rt = Runtime::new().unwrap();
        rt.block_on(async {
            let tight = ResilienceSettings {
                window_size: 2,
                minimum_calls: 2,
                ..settings(3)
            };
            let script = Arc::new(errors.clone());
            let next = Arc::new(AtomicUsize::new(0));
            let fake = {
                let script = Arc::clone(&script);
                let next = Arc::clone(&next);
                tower::service_fn(move |_req: UpstreamRequest| {
                    let i = next.fetch_add(1, Ordering::SeqCst);
                    let error = script[i % script.len()].clone();
                    async move { Err::<UpstreamResponse, _>(error) }
                })
            };
            let upstream = ResilientUpstream::new(fake, &tight);

            for _ in 0..errors.len() {
                let _ = upstream.delete_by_name("anyone".to_string()).await;
            }

            prop_assert_eq!(next.load(Ordering::SeqCst), errors.len());
            prop_assert_eq!(upstream.circuit_state(), CircuitState::Closed);
            Ok(())
        })?;
    }
}
