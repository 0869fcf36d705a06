//! Error kinds of the pipeline.

use std::fmt::{self, Display};
use std::io;
use std::path::Path;

use failure::Fail;

pub type Result<T> = std::result::Result<T, Error>;

/// The pipeline phase a worker belongs to.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Phase {
    Map,
    Shuffle,
    Reduce,
}

impl Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Map => "map",
            Phase::Shuffle => "shuffle",
            Phase::Reduce => "reduce",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "invalid configuration: {}", _0)]
    Configuration(String),

    #[fail(display = "failed to open {}: {}", path, cause)]
    Open {
        path: String,
        #[cause]
        cause: io::Error,
    },

    #[fail(display = "i/o failure on {}: {}", path, cause)]
    Io {
        path: String,
        #[cause]
        cause: io::Error,
    },

    #[fail(display = "unreadable shuffle source {}: {}", path, cause)]
    ShuffleSource {
        path: String,
        #[cause]
        cause: io::Error,
    },

    #[fail(display = "malformed record {:?} in {}", line, path)]
    MalformedRecord { path: String, line: String },

    #[fail(display = "worker thread panicked")]
    WorkerPanicked,

    #[fail(display = "{} phase aborted: {}", phase, failures)]
    PhaseFailed {
        phase: Phase,
        failures: WorkerFailures,
    },

    #[fail(display = "{} phase timed out with {} worker(s) pending", phase, pending)]
    PhaseTimeout { phase: Phase, pending: usize },
}

impl Error {
    pub(crate) fn open<P: AsRef<Path>>(path: P, cause: io::Error) -> Error {
        Error::Open {
            path: path.as_ref().display().to_string(),
            cause,
        }
    }

    pub(crate) fn io<P: AsRef<Path>>(path: P, cause: io::Error) -> Error {
        Error::Io {
            path: path.as_ref().display().to_string(),
            cause,
        }
    }

    pub(crate) fn shuffle_source<P: AsRef<Path>>(path: P, cause: io::Error) -> Error {
        Error::ShuffleSource {
            path: path.as_ref().display().to_string(),
            cause,
        }
    }
}

/// A worker that did not complete, keyed by its index within the phase.
#[derive(Debug)]
pub struct WorkerFailure {
    pub index: usize,
    pub error: Error,
}

/// Every failed worker of one phase.
#[derive(Debug)]
pub struct WorkerFailures(pub Vec<WorkerFailure>);

impl WorkerFailures {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkerFailure> {
        self.0.iter()
    }
}

impl Display for WorkerFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} worker(s) failed", self.0.len())?;
        for failure in &self.0 {
            write!(f, "; worker {}: {}", failure.index, failure.error)?;
        }
        Ok(())
    }
}
