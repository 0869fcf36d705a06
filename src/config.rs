//! Pipeline configuration.

use std::time::Duration;

use crate::error::{Error, Result};

pub const MAPPER_SUBDIR: &str = "mapper";
pub const SHUFFLE_SUBDIR: &str = "shuffle";
pub const REDUCER_SUBDIR: &str = "reducer";

/// Worker counts and phase limits for one `MapReduce`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Config {
    mappers: usize,
    reducers: usize,
    worker_timeout: Option<Duration>,
    remove_intermediate: bool,
}

impl Config {
    /// Both counts must be positive.
    pub fn new(mappers: usize, reducers: usize) -> Result<Config> {
        if mappers == 0 {
            return Err(Error::Configuration(
                "mapper count must be greater than zero".to_string(),
            ));
        }

        if reducers == 0 {
            return Err(Error::Configuration(
                "reducer count must be greater than zero".to_string(),
            ));
        }

        Ok(Config {
            mappers,
            reducers,
            worker_timeout: None,
            remove_intermediate: false,
        })
    }

    /// Fail a phase whose workers have not all reported within `timeout`.
    pub fn with_worker_timeout(mut self, timeout: Duration) -> Config {
        self.worker_timeout = Some(timeout);
        self
    }

    /// Delete mapper outputs and the merged file after a successful shuffle.
    pub fn with_remove_intermediate(mut self, remove: bool) -> Config {
        self.remove_intermediate = remove;
        self
    }

    #[inline]
    pub fn mappers(&self) -> usize {
        self.mappers
    }

    #[inline]
    pub fn reducers(&self) -> usize {
        self.reducers
    }

    #[inline]
    pub fn worker_timeout(&self) -> Option<Duration> {
        self.worker_timeout
    }

    #[inline]
    pub fn remove_intermediate(&self) -> bool {
        self.remove_intermediate
    }
}
