use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use automaton::{AutomationError, RetryPolicy, with_retry};

fn fast_policy() -> RetryPolicy {
    RetryPolicy::new(Duration::from_millis(1), 2.0, 5)
}

#[tokio::test]
async fn transient_errors_are_retried_until_success() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();

    let result = with_retry(&fast_policy(), AutomationError::is_transient, move || {
        let counter = counter.clone();
        async move {
            let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt < 3 {
                Err(AutomationError::GraphQuery("connection reset".to_string()))
            } else {
                Ok("done")
            }
        }
    })
    .await;

    assert_eq!(result.unwrap(), "done");
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn validation_errors_fail_on_first_attempt() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();

    let result: Result<(), _> =
        with_retry(&fast_policy(), AutomationError::is_transient, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(AutomationError::ParameterValidation(
                    "bad value".to_string(),
                ))
            }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn attempt_budget_is_bounded() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();

    let result: Result<(), _> =
        with_retry(&fast_policy(), AutomationError::is_transient, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(AutomationError::GraphQuery("still down".to_string()))
            }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 5);
}
