//! Concurrent task primitives for script actions.
//!
//! `spawn` schedules work on its own thread and hands back an exclusively
//! owned [`TaskHandle`]; `wait_all` joins handles in order. There is no
//! cancellation propagation: one task's failure never stops its siblings,
//! and every sibling failure is at least counted in the reported error.

use std::thread::JoinHandle;

use thiserror::Error;
use tracing::debug;

use chore_core::Value;

/// Aggregate failure from a group of awaited tasks.
///
/// Carries the first failure in handle order plus how many of the
/// remaining tasks also failed — sibling errors are never silently
/// dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("task `{label}` failed: {message} ({additional_failures} additional task failure(s))")]
pub struct TaskError {
    /// Label of the first failing task.
    pub label: String,
    /// Its failure message.
    pub message: String,
    /// How many other awaited tasks failed after it.
    pub additional_failures: usize,
}

/// Handle to one spawned task. Exclusively owned: only the owner can wait
/// on it, and dropping it detaches the task without stopping it.
#[derive(Debug)]
pub struct TaskHandle<T = Value> {
    label: String,
    join: JoinHandle<Result<T, String>>,
}

impl<T> TaskHandle<T> {
    /// Label for error reports.
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Schedules `work` for concurrent execution.
///
/// # Examples
///
/// ```
/// use chore_core::Value;
/// use chore_runtime::{spawn_task, wait_all};
///
/// let a = spawn_task("one", || Ok(Value::Int(1)));
/// let b = spawn_task("two", || Ok(Value::Int(2)));
/// let values = wait_all(vec![a, b]).unwrap();
/// assert_eq!(values, vec![Value::Int(1), Value::Int(2)]);
/// ```
pub fn spawn_task<T, F>(label: impl Into<String>, work: F) -> TaskHandle<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, String> + Send + 'static,
{
    let label = label.into();
    debug!(task = %label, "spawning task");
    let join = std::thread::spawn(work);
    TaskHandle { label, join }
}

/// Blocks until every handle completes, returning values in handle order.
///
/// On failure, returns the first failing task's error; later tasks still
/// run to completion and their failures are counted in
/// [`TaskError::additional_failures`].
pub fn wait_all<T>(handles: Vec<TaskHandle<T>>) -> Result<Vec<T>, TaskError> {
    let mut values = Vec::with_capacity(handles.len());
    let mut first_failure: Option<(String, String)> = None;
    let mut additional_failures = 0;

    for handle in handles {
        let outcome = match handle.join.join() {
            Ok(result) => result,
            Err(_) => Err("task panicked".to_string()),
        };
        match outcome {
            Ok(value) => values.push(value),
            Err(message) => {
                debug!(task = %handle.label, error = %message, "task failed");
                if first_failure.is_none() {
                    first_failure = Some((handle.label, message));
                } else {
                    additional_failures += 1;
                }
            }
        }
    }

    match first_failure {
        None => Ok(values),
        Some((label, message)) => Err(TaskError {
            label,
            message,
            additional_failures,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_results_come_back_in_handle_order() {
        let slow = spawn_task("slow", || {
            std::thread::sleep(Duration::from_millis(50));
            Ok(Value::Int(1))
        });
        let fast = spawn_task("fast", || Ok(Value::Int(2)));
        let values = wait_all(vec![slow, fast]).unwrap();
        assert_eq!(values, vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn test_first_error_wins_and_others_are_counted() {
        let ok = spawn_task("ok", || Ok(Value::Bool(true)));
        let bad1 = spawn_task("bad1", || Err("first".to_string()));
        let bad2 = spawn_task("bad2", || Err("second".to_string()));
        let err = wait_all(vec![ok, bad1, bad2]).unwrap_err();
        assert_eq!(err.label, "bad1");
        assert_eq!(err.message, "first");
        assert_eq!(err.additional_failures, 1);
    }

    #[test]
    fn test_panic_is_reported_as_failure() {
        let boom = spawn_task("boom", || -> Result<Value, String> { panic!("kapow") });
        let err = wait_all(vec![boom]).unwrap_err();
        assert_eq!(err.message, "task panicked");
    }
}
