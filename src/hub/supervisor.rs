//! Restarting the hub loop after a panic.

use std::any::Any;
use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::Hub;
use crate::config::RestartPolicy;
use crate::error::HubError;

/// Run `task` to completion, restarting it with backoff whenever it panics
/// or fails with a restartable error.
///
/// Any other result ends supervision. Failures are counted; once more than
/// `policy.max_restarts` have happened the supervisor gives up with
/// [`HubError::RestartsExhausted`]. Cancelling `cancel` during a backoff
/// ends supervision cleanly.
pub async fn supervise<F, Fut>(
    name: &'static str,
    policy: &RestartPolicy,
    cancel: &CancellationToken,
    mut task: F,
) -> Result<(), HubError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), HubError>> + Send + 'static,
{
    let mut restarts = 0;
    loop {
        let reason = match tokio::spawn(task()).await {
            Ok(Err(err)) if err.is_restartable() => err.to_string(),
            Ok(result) => return result,
            Err(err) if err.is_panic() => panic_message(err.into_panic()),
            Err(err) => {
                // Aborted along with the runtime
                warn!(task = name, error = %err, "supervised task cancelled");
                return Ok(());
            }
        };
        error!(task = name, restarts, %reason, "supervised task failed");
        if restarts >= policy.max_restarts {
            return Err(HubError::RestartsExhausted {
                task: name,
                attempts: restarts,
            });
        }
        restarts += 1;

        let backoff = policy.backoff(restarts);
        info!(task = name, restarts, backoff_ms = backoff.as_millis() as u64, "restarting");
        tokio::select! {
            () = cancel.cancelled() => return Ok(()),
            () = tokio::time::sleep(backoff) => {}
        }
    }
}

pub(super) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Hub {
    /// Run the hub loop under [`supervise`] with the configured restart
    /// policy.
    pub async fn run_supervised(&self) -> Result<(), HubError> {
        let hub = self.clone();
        supervise(
            "hub",
            &self.shared.config.restart_policy,
            &self.shared.cancel,
            move || {
                let hub = hub.clone();
                async move { hub.run().await }
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    async fn explode() -> Result<(), HubError> {
        panic!("{}", String::from("always"))
    }

    fn policy(max_restarts: u32) -> RestartPolicy {
        RestartPolicy {
            max_restarts,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_restarts_after_panics() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&runs);
        let result = supervise("flaky", &policy(5), &CancellationToken::new(), move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    panic!("boom");
                }
                Ok::<(), HubError>(())
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_restarts() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&runs);
        let result = supervise("doomed", &policy(2), &CancellationToken::new(), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                explode().await
            }
        })
        .await;

        assert!(matches!(
            result,
            Err(HubError::RestartsExhausted { task: "doomed", attempts: 2 })
        ));
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restartable_errors_are_retried() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&runs);
        let result = supervise("child", &policy(5), &CancellationToken::new(), move || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    return Err(HubError::TaskFailed {
                        task: "fan-out",
                        reason: "exited".into(),
                    });
                }
                Ok(())
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_end_supervision() {
        let result = supervise("failing", &policy(5), &CancellationToken::new(), || async {
            Err::<(), _>(HubError::ShuttingDown)
        })
        .await;
        assert!(matches!(result, Err(HubError::ShuttingDown)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_backoff() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let result = supervise("cancelled", &policy(5), &cancel, move || {
            trigger.cancel();
            explode()
        })
        .await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_panic_payloads_are_readable() {
        assert_eq!(panic_message(Box::new("static")), "static");
        assert_eq!(panic_message(Box::new(String::from("owned"))), "owned");
        assert_eq!(panic_message(Box::new(7_u8)), "unknown panic");
    }
}
