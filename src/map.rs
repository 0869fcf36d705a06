//! Map phase: one worker thread per block of the input file.
//!
//! Every worker opens the input on its own, maps the lines of its block and
//! writes the key sorted records to `mapper/map.<index>.txt`.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::chunk::Block;
use crate::config::MAPPER_SUBDIR;
use crate::entry::{self, Record};
use crate::error::{Error, Phase, Result};
use crate::worker;

/// Turns one input line into zero or more records.
///
/// Output should be sorted by key already; the worker sorts it stably anyway.
pub trait Mapper: Send + Sync {
    fn map(&self, line: &str) -> Vec<Record>;
}

impl<F> Mapper for F
where
    F: Fn(&str) -> Vec<Record> + Send + Sync,
{
    fn map(&self, line: &str) -> Vec<Record> {
        self(line)
    }
}

pub fn output_path(output_dir: &Path, index: usize) -> PathBuf {
    output_dir
        .join(MAPPER_SUBDIR)
        .join(format!("map.{}.txt", index))
}

/// Map every block concurrently, returning the intermediate files in block order.
pub fn run<M: Mapper + 'static>(
    mapper: Arc<M>,
    input: &Path,
    blocks: &[Block],
    output_dir: &Path,
    timeout: Option<Duration>,
) -> Result<Vec<PathBuf>> {
    let tasks = blocks
        .iter()
        .enumerate()
        .map(|(index, &block)| {
            let mapper = Arc::clone(&mapper);
            let input = input.to_path_buf();
            let output = output_path(output_dir, index);

            move || map_task(&*mapper, &input, block, &output).map(|_| output)
        })
        .collect();

    worker::run_phase(Phase::Map, tasks, timeout)
}

fn map_task<M: Mapper + ?Sized>(mapper: &M, input: &Path, block: Block, output: &Path) -> Result<()> {
    log::debug!(
        "Map block [{}, {}) of {} into {}",
        block.from,
        block.to,
        input.display(),
        output.display()
    );

    let records = map_block(mapper, input, block)?;
    write_records(output, &records)?;

    log::debug!("Wrote {} records to {}", records.len(), output.display());

    Ok(())
}

fn map_block<M: Mapper + ?Sized>(mapper: &M, input: &Path, block: Block) -> Result<Vec<Record>> {
    let file = File::open(input).map_err(|err| Error::open(input, err))?;
    let mut reader = BufReader::new(file);

    reader
        .seek(SeekFrom::Start(block.from))
        .map_err(|err| Error::io(input, err))?;

    let mut runs = Runs::default();
    let mut position = block.from;
    let mut buf = Vec::new();

    while position < block.to {
        buf.clear();

        let read = reader
            .read_until(b'\n', &mut buf)
            .map_err(|err| Error::io(input, err))?;
        if read == 0 {
            break;
        }
        position += read as u64;

        // Invalid utf-8 is replaced, a stray byte must not fail the block.
        let line = String::from_utf8_lossy(&buf);

        let mut records = mapper.map(trim_line_end(&line));
        records.sort_by(Record::cmp_key);

        // A newline in a key would break the line format of the intermediate file.
        if records.iter().any(|record| record.key.contains('\n')) {
            return Err(Error::MalformedRecord {
                path: input.display().to_string(),
                line: line.into_owned(),
            });
        }

        log::trace!("Mapped {:?} into {} records", line, records.len());

        runs.push(records);
    }

    Ok(runs.finish())
}

fn write_records(output: &Path, records: &[Record]) -> Result<()> {
    if let Some(dir) = output.parent() {
        fs::create_dir_all(dir).map_err(|err| Error::io(dir, err))?;
    }

    let file = File::create(output).map_err(|err| Error::open(output, err))?;
    let mut writer = BufWriter::new(file);

    for record in records {
        writer
            .write_all(&record.as_bytes())
            .map_err(|err| Error::io(output, err))?;
    }

    writer.flush().map_err(|err| Error::io(output, err))
}

fn trim_line_end(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Sorted runs kept in a stack of non-increasing lengths.
///
/// A new run is merged with every run on top that is not longer than it, so each
/// record takes part in O(log n) merges instead of one merge per input line.
#[derive(Default)]
struct Runs {
    stack: Vec<Vec<Record>>,
}

impl Runs {
    fn push(&mut self, mut run: Vec<Record>) {
        if run.is_empty() {
            return;
        }

        while self.stack.last().map_or(false, |top| top.len() <= run.len()) {
            if let Some(older) = self.stack.pop() {
                run = entry::merge_sorted(older, run);
            }
        }

        self.stack.push(run);
    }

    fn finish(self) -> Vec<Record> {
        self.stack
            .into_iter()
            .rev()
            .fold(Vec::new(), |newer, older| entry::merge_sorted(older, newer))
    }
}
