//! Join barrier for the worker threads of one phase.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Phase, Result, WorkerFailure, WorkerFailures};

type Message<T> = (usize, Result<T>);

/// Run every task on its own named thread and wait for all of them.
///
/// Results come back in task order. Any failed or panicked task fails the whole
/// phase with every failure listed; an expired `timeout` fails it with the number
/// of workers still pending, leaving those threads detached.
pub fn run_phase<T, F>(phase: Phase, tasks: Vec<F>, timeout: Option<Duration>) -> Result<Vec<T>>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    let total = tasks.len();
    let (tx, rx) = mpsc::channel::<Message<T>>();

    let mut handles = Vec::with_capacity(total);
    let mut failures = Vec::new();

    for (index, task) in tasks.into_iter().enumerate() {
        let tx = tx.clone();
        let name = format!("{}-{}", phase, index);

        let spawned = thread::Builder::new().name(name.clone()).spawn(move || {
            let result = task();
            // The barrier may have stopped listening after a timeout.
            let _ = tx.send((index, result));
        });

        match spawned {
            Ok(handle) => handles.push((index, handle)),
            Err(err) => failures.push(WorkerFailure {
                index,
                error: Error::io(name, err),
            }),
        }
    }

    // Only worker threads hold senders from here, so a disconnect means all exited.
    drop(tx);

    let deadline = timeout.map(|timeout| Instant::now() + timeout);
    let mut results: Vec<Option<T>> = (0..total).map(|_| None).collect();
    let mut pending = handles.len();

    while pending > 0 {
        let message = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match rx.recv_timeout(remaining) {
                    Ok(message) => message,
                    Err(RecvTimeoutError::Timeout) => {
                        log::error!("{} phase timed out, {} worker(s) pending", phase, pending);
                        return Err(Error::PhaseTimeout { phase, pending });
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(message) => message,
                Err(_) => break,
            },
        };

        pending -= 1;

        match message {
            (index, Ok(value)) => results[index] = Some(value),
            (index, Err(error)) => {
                log::error!("{} worker {} failed: {}", phase, index, error);
                failures.push(WorkerFailure { index, error });
            }
        }
    }

    for (index, handle) in handles {
        if handle.join().is_err() {
            log::error!("{} worker {} panicked", phase, index);
            failures.push(WorkerFailure {
                index,
                error: Error::WorkerPanicked,
            });
        }
    }

    if !failures.is_empty() {
        failures.sort_by_key(|failure| failure.index);
        return Err(Error::PhaseFailed {
            phase,
            failures: WorkerFailures(failures),
        });
    }

    Ok(results.into_iter().flatten().collect())
}
