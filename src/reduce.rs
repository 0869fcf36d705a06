//! Reduce phase: one worker thread per shuffle partition.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::REDUCER_SUBDIR;
use crate::entry::Record;
use crate::error::{Error, Phase, Result};
use crate::worker;

/// Checks the records of one partition in key order.
///
/// `State` is created fresh for every partition and handed to each call, so a
/// reducer can remember earlier records (e.g. the previous key) without globals.
/// A partition's outcome is the logical AND of all calls, `true` when empty.
pub trait Reducer: Send + Sync {
    type State: Default;

    fn reduce(&self, state: &mut Self::State, record: &Record) -> bool;
}

/// Outcome of one reduce worker.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Reduced {
    pub output: PathBuf,
    pub outcome: bool,
}

pub fn output_path(output_dir: &Path, index: usize) -> PathBuf {
    output_dir
        .join(REDUCER_SUBDIR)
        .join(format!("reduce.{}.txt", index))
}

/// Reduce every partition concurrently, returning outcomes in partition order.
pub fn run<R: Reducer + 'static>(
    reducer: Arc<R>,
    partitions: &[PathBuf],
    output_dir: &Path,
    timeout: Option<Duration>,
) -> Result<Vec<Reduced>> {
    let tasks = partitions
        .iter()
        .enumerate()
        .map(|(index, partition)| {
            let reducer = Arc::clone(&reducer);
            let partition = partition.clone();
            let output = output_path(output_dir, index);

            move || {
                let outcome = reduce_task(&*reducer, &partition, &output)?;
                Ok(Reduced { output, outcome })
            }
        })
        .collect();

    worker::run_phase(Phase::Reduce, tasks, timeout)
}

fn reduce_task<R: Reducer + ?Sized>(reducer: &R, partition: &Path, output: &Path) -> Result<bool> {
    log::debug!(
        "Reduce partition {} into {}",
        partition.display(),
        output.display()
    );

    let outcome = reduce_partition(reducer, partition)?;

    if let Some(dir) = output.parent() {
        fs::create_dir_all(dir).map_err(|err| Error::io(dir, err))?;
    }

    let text = if outcome { "1\n" } else { "0\n" };
    fs::write(output, text).map_err(|err| Error::io(output, err))?;

    Ok(outcome)
}

fn reduce_partition<R: Reducer + ?Sized>(reducer: &R, partition: &Path) -> Result<bool> {
    let file = File::open(partition).map_err(|err| Error::open(partition, err))?;
    let reader = BufReader::new(file);

    let mut state = R::State::default();
    let mut outcome = true;

    for line in reader.lines() {
        let line = line.map_err(|err| Error::io(partition, err))?;

        let record = Record::parse_line(&line).ok_or_else(|| Error::MalformedRecord {
            path: partition.display().to_string(),
            line: line.clone(),
        })?;

        // Every record is fed through, the state must see the whole partition.
        let passed = reducer.reduce(&mut state, &record);
        log::trace!("Reduced {} to {}", record, passed);

        outcome &= passed;
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Passes while values stay below a limit, counting records in its state.
    struct Below(u64);

    impl Reducer for Below {
        type State = usize;

        fn reduce(&self, seen: &mut usize, record: &Record) -> bool {
            *seen += 1;
            record.value < self.0
        }
    }

    #[test]
    fn test_reduce_partitions() {
        let dir = tempfile::tempdir().unwrap();
        let passing = dir.path().join("part.0.txt");
        let failing = dir.path().join("part.1.txt");
        let empty = dir.path().join("part.2.txt");
        fs::write(&passing, "a 1\nb 2\n").unwrap();
        fs::write(&failing, "c 1\nd 9\ne 1\n").unwrap();
        fs::write(&empty, "").unwrap();

        let reduced = run(
            Arc::new(Below(5)),
            &[passing, failing, empty],
            dir.path(),
            None,
        )
        .unwrap();

        let outcomes: Vec<_> = reduced.iter().map(|r| r.outcome).collect();
        assert_eq!(outcomes, vec![true, false, true]);
        assert_eq!(fs::read_to_string(&reduced[0].output).unwrap(), "1\n");
        assert_eq!(fs::read_to_string(&reduced[1].output).unwrap(), "0\n");
        assert_eq!(reduced[2].output, output_path(dir.path(), 2));
    }

    #[test]
    fn test_state_sees_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let partition = dir.path().join("part.0.txt");
        fs::write(&partition, "a 9\nb 1\nc 1\n").unwrap();

        struct Count;

        impl Reducer for Count {
            type State = usize;

            fn reduce(&self, seen: &mut usize, _: &Record) -> bool {
                *seen += 1;
                *seen != 3
            }
        }

        assert!(!reduce_partition(&Count, &partition).unwrap());
    }

    #[test]
    fn test_unwritable_result_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let partition = dir.path().join("part.0.txt");
        fs::write(&partition, "a 1\n").unwrap();

        // A directory where the result file should go makes the write fail.
        let output = output_path(dir.path(), 0);
        fs::create_dir_all(&output).unwrap();

        let result = reduce_task(&Below(5), &partition, &output);

        assert!(matches!(result, Err(Error::Io { .. })));
    }

    #[test]
    fn test_missing_partition_fails_phase() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("part.0.txt");

        let result = run(Arc::new(Below(5)), &[missing], dir.path(), None);

        assert!(matches!(result, Err(Error::PhaseFailed { .. })));
    }
}
