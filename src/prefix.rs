//! Shortest unique line prefix, built on repeated pipeline runs.

use std::path::Path;

use crate::config::Config;
use crate::entry::Record;
use crate::error::Result;
use crate::map::Mapper;
use crate::map_reduce::MapReduce;
use crate::reduce::Reducer;

/// Emits the first `length` characters of every non-empty line with a count of 1.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct PrefixMapper {
    length: usize,
}

impl PrefixMapper {
    pub fn new(length: usize) -> PrefixMapper {
        PrefixMapper { length }
    }
}

impl Mapper for PrefixMapper {
    fn map(&self, line: &str) -> Vec<Record> {
        if line.is_empty() {
            return vec![];
        }

        // Cut on a char boundary, a byte cut could split a utf-8 sequence.
        let end = line
            .char_indices()
            .nth(self.length)
            .map_or(line.len(), |(idx, _)| idx);

        vec![Record::new(&line[..end], 1)]
    }
}

/// Fails any record repeating the previous key or carrying a count above one.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniqueReducer;

impl Reducer for UniqueReducer {
    type State = Option<String>;

    fn reduce(&self, previous: &mut Option<String>, record: &Record) -> bool {
        let repeated = previous.as_deref() == Some(record.key.as_str());
        if !repeated {
            *previous = Some(record.key.clone());
        }

        !repeated && record.value <= 1
    }
}

/// Try prefix lengths 1 to `max_length` until every line's prefix is unique.
///
/// Each attempt writes into `<output_dir>/iter<length>`. Returns `None` when no
/// length up to the cap works, or as soon as every key is shorter than the
/// length tried: longer prefixes would map the same whole lines again.
pub fn shortest_unique_prefix<P, Q>(
    config: Config,
    input: P,
    output_dir: Q,
    max_length: usize,
) -> Result<Option<usize>>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let input = input.as_ref();
    let output_dir = output_dir.as_ref();

    let mut runner = MapReduce::new(config, PrefixMapper::new(1), UniqueReducer);

    for length in 1..=max_length {
        runner.set_mapper(PrefixMapper::new(length));

        let report = runner.run(input, output_dir.join(format!("iter{}", length)))?;

        if report.outcome() {
            log::info!("Prefixes of length {} are unique", length);
            return Ok(Some(length));
        }

        if report.shuffled.longest_key < length {
            log::info!(
                "Whole lines repeat, no prefix longer than {} can be unique",
                report.shuffled.longest_key
            );
            return Ok(None);
        }

        log::debug!("Prefixes of length {} repeat", length);
    }

    Ok(None)
}
