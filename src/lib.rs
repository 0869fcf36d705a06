//! Find the shortest unique line prefix of a large file.
//!
//! The work is done by a single machine MapReduce over files on disk: the input
//! is split into line aligned blocks, mapped by parallel worker threads, merged
//! with a bounded memory k-way merge, repartitioned by key and reduced in
//! parallel again. Any mapper/reducer pair can be plugged into `MapReduce`;
//! the `prefix` module holds the pair used for unique prefixes.

pub mod chunk;
pub mod config;
pub mod entry;
pub mod error;
pub mod map;
pub mod map_reduce;
pub mod prefix;
pub mod reduce;
pub mod shuffle;

mod worker;

pub use crate::config::Config;
pub use crate::entry::Record;
pub use crate::error::{Error, Phase, Result};
pub use crate::map::Mapper;
pub use crate::map_reduce::{MapReduce, Report};
pub use crate::prefix::shortest_unique_prefix;
pub use crate::reduce::Reducer;
