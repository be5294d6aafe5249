//! Deadline monitoring for potentially long-running computations.
//!
//! The computation runs on a freshly spawned worker thread while the caller
//! waits on a channel with a timeout. On expiry the worker is abandoned, not
//! killed; abandoned workers must only touch data moved into them.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Outcome of a monitored computation.
#[derive(Debug)]
pub enum Monitored<T> {
    Finished(T),
    /// The deadline expired; the worker may still be running detached.
    DeadlineExceeded,
}

/// Run `work` on a worker thread and wait at most `deadline` for it.
///
/// `work` takes ownership of everything it needs. If the deadline expires
/// the result channel is dropped and the worker's eventual send fails
/// silently; the thread then exits on its own.
pub fn run_with_deadline<T, F>(name: &str, deadline: Duration, work: F) -> Monitored<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let builder = thread::Builder::new().name(name.to_string());
    let spawned = builder.spawn(move || {
        let result = work();
        let _ = tx.send(result);
    });
    match spawned {
        Ok(_) => match rx.recv_timeout(deadline) {
            Ok(value) => Monitored::Finished(value),
            Err(_) => Monitored::DeadlineExceeded,
        },
        // Spawn failure (resource exhaustion) is treated like a timeout so
        // the caller degrades instead of aborting the whole run.
        Err(_) => Monitored::DeadlineExceeded,
    }
}

/// Run `work` inline when no deadline is configured, monitored otherwise.
pub fn run_with_optional_deadline<T, F>(
    name: &str,
    deadline: Option<Duration>,
    work: F,
) -> Monitored<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match deadline {
        Some(d) => run_with_deadline(name, d, work),
        None => Monitored::Finished(work()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fast_work_finishes() {
        match run_with_deadline("test-fast", Duration::from_secs(5), || 41 + 1) {
            Monitored::Finished(v) => assert_eq!(v, 42),
            Monitored::DeadlineExceeded => panic!("fast work timed out"),
        }
    }

    #[test]
    fn slow_work_hits_the_deadline() {
        let result = run_with_deadline("test-slow", Duration::from_millis(10), || {
            thread::sleep(Duration::from_secs(2));
            0
        });
        assert!(matches!(result, Monitored::DeadlineExceeded));
    }

    #[test]
    fn no_deadline_runs_inline() {
        match run_with_optional_deadline("test-inline", None, || "done") {
            Monitored::Finished(v) => assert_eq!(v, "done"),
            Monitored::DeadlineExceeded => panic!("inline work cannot time out"),
        }
    }
}
