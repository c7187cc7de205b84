// Unit Tests for the Failure Supervisor
//
// UNIT UNDER TEST: Supervisor (concrete implementation)
//
// BUSINESS RESPONSIBILITY:
//   - Intercepts escaped errors and panics from supervised tasks
//   - Holds a recoverable Failed state instead of propagating the failure
//   - Refuses task execution while Failed (fallback-instead-of-subtree)
//   - Drives recovery via retry (delayed, counted) and reset (immediate)
//   - Produces a plain-text report and debug-only technical details
//
// TEST COVERAGE:
//   - Healthy -> Failed -> Healthy transitions and no other
//   - Exactly one capture per distinct escaped error
//   - Panic interception with payload extraction
//   - Retry counter monotonicity and reset-hook invocation
//   - Report content and the debug gating of technical details

use crate::error::AppError;
use crate::logger;
use crate::supervisor::{Supervisor, SupervisorState, TaskOutcome};
use serial_test::serial;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_supervisor() -> Supervisor {
        Supervisor::new().with_recovery_delay(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_successful_tasks_leave_the_supervisor_healthy() {
        // Arrange
        let mut supervisor = fast_supervisor();

        // Act
        let outcome = supervisor
            .run("load_dashboard", || async { Ok::<_, AppError>(42) })
            .await;

        // Assert
        assert_eq!(outcome.completed(), Some(42));
        assert_eq!(supervisor.state(), SupervisorState::Healthy);
        assert!(supervisor.failure().is_none());
    }

    /// Captures in the global buffer tagged with this supervisor task label.
    fn captures_for_task(label: &str) -> usize {
        logger::global()
            .errors()
            .iter()
            .filter(|entry| {
                entry.metadata.context.get("task").and_then(|v| v.as_str()) == Some(label)
            })
            .count()
    }

    #[tokio::test]
    #[serial]
    async fn test_escaped_error_enters_failed_and_captures_once() {
        // Test verifies the Healthy -> Failed transition captures through
        // the logger exactly once per distinct failure

        // Arrange
        let mut supervisor = fast_supervisor();
        let label = "render_products_capture_once";
        assert_eq!(captures_for_task(label), 0);

        // Act
        let outcome = supervisor
            .run(label, || async {
                Err::<(), _>(AppError::server("template exploded", 500))
            })
            .await;

        // Assert
        assert!(!outcome.is_completed());
        assert_eq!(supervisor.state(), SupervisorState::Failed);
        assert_eq!(
            captures_for_task(label),
            1,
            "Exactly one capture per distinct escaped error"
        );

        let failure = supervisor.failure().expect("failure held");
        assert!(!failure.error_id.is_empty(), "Capture id must be exposed");
        assert_eq!(
            failure.message,
            "Something went wrong on our end. Please try again later.",
            "Held message must be the friendly one, not the raw text"
        );
        assert_eq!(failure.raw_message, "Server error 500: template exploded");
    }

    #[tokio::test]
    async fn test_panicking_task_is_intercepted() {
        // Test verifies the panic barrier turns an unwind into Failed

        // Arrange
        let mut supervisor = fast_supervisor();

        // Act
        let outcome: TaskOutcome<()> = supervisor
            .run("render_team", || async {
                panic!("tried to index past the team roster")
            })
            .await;

        // Assert
        assert!(!outcome.is_completed());
        assert_eq!(supervisor.state(), SupervisorState::Failed);
        assert!(
            supervisor
                .failure()
                .expect("failure held")
                .raw_message
                .contains("team roster"),
            "Panic payload text must be preserved in the detail"
        );
    }

    #[tokio::test]
    async fn test_failed_supervisor_refuses_new_tasks() {
        // Test verifies the fallback-instead-of-subtree contract: while
        // Failed, the task body must not run at all

        // Arrange
        let mut supervisor = fast_supervisor();
        supervisor
            .run("first", || async { Err::<(), _>(AppError::unexpected("down")) })
            .await;
        let executed = Arc::new(AtomicBool::new(false));
        let executed_clone = executed.clone();

        // Act
        let outcome = supervisor
            .run("second", || {
                let executed = executed_clone.clone();
                async move {
                    executed.store(true, Ordering::SeqCst);
                    Ok::<_, AppError>(())
                }
            })
            .await;

        // Assert
        assert!(!outcome.is_completed());
        assert!(
            !executed.load(Ordering::SeqCst),
            "Tasks must not execute while the supervisor is Failed"
        );
        assert_eq!(
            match outcome {
                TaskOutcome::Failed(detail) => detail.task_label,
                TaskOutcome::Completed(_) => unreachable!("outcome checked above"),
            },
            "first",
            "The held failure, not a new one, is returned"
        );
    }

    #[tokio::test]
    async fn test_replacing_failure_keeps_failed_state() {
        // Test verifies a further failure replaces the detail only

        // Arrange
        let mut supervisor = fast_supervisor();
        supervisor.capture_failure("first", &AppError::unexpected("one"), None);
        let first_id = supervisor.failure().expect("held").error_id.clone();

        // Act
        supervisor.capture_failure("second", &AppError::unexpected("two"), None);

        // Assert
        assert_eq!(supervisor.state(), SupervisorState::Failed);
        let held = supervisor.failure().expect("held");
        assert_ne!(held.error_id, first_id, "Detail must be replaced");
        assert_eq!(held.task_label, "second");
    }

    #[tokio::test]
    async fn test_retry_recovers_and_counts() {
        // Test verifies retry waits out the recovery window, re-enters
        // Healthy, and increments the visible counter

        // Arrange
        let mut supervisor = fast_supervisor();
        supervisor
            .run("render", || async { Err::<(), _>(AppError::unexpected("down")) })
            .await;
        assert_eq!(supervisor.retry_count(), 0);

        // Act
        supervisor.retry().await;

        // Assert
        assert_eq!(supervisor.state(), SupervisorState::Healthy);
        assert_eq!(supervisor.retry_count(), 1, "Counter must increment by 1");

        // A later failure and retry keeps counting up
        supervisor
            .run("render", || async { Err::<(), _>(AppError::unexpected("down")) })
            .await;
        supervisor.retry().await;
        assert_eq!(
            supervisor.retry_count(),
            2,
            "Counter is monotonically increasing until reset"
        );
    }

    #[tokio::test]
    async fn test_retry_while_healthy_is_a_no_op() {
        // Arrange
        let mut supervisor = fast_supervisor();

        // Act
        supervisor.retry().await;

        // Assert
        assert_eq!(supervisor.retry_count(), 0, "Nothing to recover from");
        assert_eq!(supervisor.state(), SupervisorState::Healthy);
    }

    #[tokio::test]
    async fn test_reset_recovers_immediately_and_fires_hook() {
        // Test verifies reset discards the failure, zeroes the counter,
        // and invokes the navigation-reset hook

        // Arrange
        let hook_calls = Arc::new(AtomicU32::new(0));
        let hook_clone = hook_calls.clone();
        let mut supervisor = fast_supervisor().with_reset_hook(move || {
            hook_clone.fetch_add(1, Ordering::SeqCst);
        });
        supervisor
            .run("render", || async { Err::<(), _>(AppError::unexpected("down")) })
            .await;
        supervisor.retry().await;
        supervisor
            .run("render", || async { Err::<(), _>(AppError::unexpected("down")) })
            .await;

        // Act
        supervisor.reset();

        // Assert
        assert_eq!(supervisor.state(), SupervisorState::Healthy);
        assert_eq!(supervisor.retry_count(), 0, "Reset zeroes the counter");
        assert_eq!(hook_calls.load(Ordering::SeqCst), 1, "Hook fires once");
    }

    #[tokio::test]
    async fn test_report_contains_reference_fields() {
        // Test verifies the manual report block carries everything support
        // needs to find the capture

        // Arrange
        let mut supervisor = fast_supervisor();
        supervisor
            .run("render_blog", || async {
                Err::<(), _>(AppError::server("template exploded", 500))
            })
            .await;
        let failure = supervisor.failure().expect("held").clone();

        // Act
        let report = supervisor.report().expect("report available while Failed");

        // Assert
        assert!(report.contains(&failure.error_id));
        assert!(report.contains("template exploded"));
        assert!(report.contains("render_blog"));
        assert!(report.contains("Error Report"));
    }

    #[tokio::test]
    async fn test_report_is_unavailable_while_healthy() {
        // Arrange
        let supervisor = fast_supervisor();

        // Act & Assert
        assert!(supervisor.report().is_none());
    }

    #[tokio::test]
    async fn test_technical_details_are_debug_only() {
        // Test verifies the developer panel gating: available in debug
        // builds, never in release

        // Arrange
        let mut supervisor = fast_supervisor();
        supervisor
            .run("render", || async {
                Err::<(), _>(AppError::unexpected("raw detail"))
            })
            .await;

        // Act
        let details = supervisor.technical_details();

        // Assert
        if cfg!(debug_assertions) {
            assert!(
                details.expect("available in debug builds").contains("raw detail"),
                "Debug builds expose the raw failure text"
            );
        } else {
            assert!(details.is_none(), "Release builds must never expose it");
        }
    }
}
