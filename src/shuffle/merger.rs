//! Internal implementation of the k-way merge.

use std::cmp::{self, Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::entry::Record;
use crate::error::{Error, Result};

/// The smallest unconsumed record of one source file.
#[derive(Debug, Eq, PartialEq)]
struct Head {
    record: Record,
    source: usize,
}

impl Ord for Head {
    fn cmp(&self, other: &Head) -> Ordering {
        // Ties go to the lower source index so the merge is deterministic.
        self.record
            .cmp_key(&other.record)
            .then_with(|| self.source.cmp(&other.source))
    }
}

impl PartialOrd for Head {
    fn partial_cmp(&self, other: &Head) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Source {
    path: PathBuf,
    reader: BufReader<File>,
    line: String,
}

impl Source {
    fn open(path: &Path) -> Result<Source> {
        let file = File::open(path).map_err(|err| Error::shuffle_source(path, err))?;

        Ok(Source {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            line: String::new(),
        })
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        self.line.clear();

        let read = self
            .reader
            .read_line(&mut self.line)
            .map_err(|err| Error::shuffle_source(&self.path, err))?;
        if read == 0 {
            return Ok(None);
        }

        match Record::parse_line(&self.line) {
            Some(record) => Ok(Some(record)),
            None => Err(Error::MalformedRecord {
                path: self.path.display().to_string(),
                line: self.line.clone(),
            }),
        }
    }
}

/// Counters gathered while merging.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct MergeStats {
    pub records: u64,
    /// Length in chars of the longest key.
    pub longest_key: usize,
}

/// Merge key sorted `sources` into one key sorted file at `output`.
///
/// At most one record per source is held in memory.
pub fn merge_files(sources: &[PathBuf], output: &Path) -> Result<MergeStats> {
    // Open everything first: a missing source must fail before any output exists.
    let mut readers = sources
        .iter()
        .map(|path| Source::open(path))
        .collect::<Result<Vec<_>>>()?;

    let mut heap = BinaryHeap::with_capacity(readers.len());

    for (source, reader) in readers.iter_mut().enumerate() {
        if let Some(record) = reader.next_record()? {
            heap.push(Reverse(Head { record, source }));
        }
    }

    let file = File::create(output).map_err(|err| Error::open(output, err))?;
    let mut writer = BufWriter::new(file);
    let mut stats = MergeStats::default();

    while let Some(Reverse(Head { record, source })) = heap.pop() {
        log::trace!("Merge {} from source {}", record, source);

        writer
            .write_all(&record.as_bytes())
            .map_err(|err| Error::io(output, err))?;
        stats.records += 1;
        stats.longest_key = cmp::max(stats.longest_key, record.key.chars().count());

        if let Some(next) = readers[source].next_record()? {
            heap.push(Reverse(Head {
                record: next,
                source,
            }));
        }
    }

    writer.flush().map_err(|err| Error::io(output, err))?;

    Ok(stats)
}
