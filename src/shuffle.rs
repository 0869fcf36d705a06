//! Shuffle phase: external merge of the map outputs, then key aligned redistribution.
//!
//! The workflow is illustrated as following:
//!
//! map.0.txt ─┐                         ┌─> part.0.txt
//! map.1.txt ─┼─> merged.txt (sorted) ──┼─> part.1.txt
//! map.2.txt ─┘                         └─> part.2.txt
//!
//! The merged file is cut with the same line aligned splitting as the input,
//! then every cut is moved forward until the key changes, so one key never
//! spans two partitions.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::chunk::{self, Block};
use crate::config::SHUFFLE_SUBDIR;
use crate::entry;
use crate::error::{Error, Result};

mod merger;

pub const MERGED_FILE: &str = "merged.txt";

/// Files produced by one shuffle.
#[derive(Debug, Clone)]
pub struct Shuffled {
    /// Globally sorted concatenation of every map output.
    pub merged: PathBuf,
    /// One sorted, key disjoint file per reducer.
    pub partitions: Vec<PathBuf>,
    /// Byte range of `merged` that went into each partition.
    pub ranges: Vec<Block>,
    pub records: u64,
    /// Length in chars of the longest key.
    pub longest_key: usize,
}

pub fn partition_path(output_dir: &Path, index: usize) -> PathBuf {
    output_dir
        .join(SHUFFLE_SUBDIR)
        .join(format!("part.{}.txt", index))
}

/// Merge `sources` and repartition the result into `reducers` files.
pub fn run(sources: &[PathBuf], reducers: usize, output_dir: &Path) -> Result<Shuffled> {
    let dir = output_dir.join(SHUFFLE_SUBDIR);
    fs::create_dir_all(&dir).map_err(|err| Error::io(&dir, err))?;

    let merged = dir.join(MERGED_FILE);

    log::debug!(
        "Merge {} map outputs into {}",
        sources.len(),
        merged.display()
    );

    let stats = merger::merge_files(sources, &merged)?;
    let blocks = chunk::split(&merged, reducers)?;

    let partitions: Vec<_> = (0..reducers)
        .map(|index| partition_path(output_dir, index))
        .collect();

    let ranges = redistribute(&merged, &blocks, &partitions)?;

    for (path, range) in partitions.iter().zip(&ranges) {
        log::debug!(
            "Partition {} holds bytes [{}, {}) of the merged file",
            path.display(),
            range.from,
            range.to
        );
    }

    Ok(Shuffled {
        merged,
        partitions,
        ranges,
        records: stats.records,
        longest_key: stats.longest_key,
    })
}

/// Copy the lines of `merged` into `outputs`, one target block per output.
///
/// A line starting at or past its block's end moves on to the next output only
/// when its key differs from the previous line's key.
fn redistribute(merged: &Path, blocks: &[Block], outputs: &[PathBuf]) -> Result<Vec<Block>> {
    let file = File::open(merged).map_err(|err| Error::open(merged, err))?;
    let mut reader = BufReader::new(file);

    let mut writers = outputs
        .iter()
        .map(|path| {
            File::create(path)
                .map(BufWriter::new)
                .map_err(|err| Error::open(path, err))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut bounds = vec![0; blocks.len() + 1];
    let mut current = 0;
    let mut position = 0;
    let mut previous_key: Option<Vec<u8>> = None;
    let mut line = Vec::new();

    loop {
        line.clear();

        let read = reader
            .read_until(b'\n', &mut line)
            .map_err(|err| Error::io(merged, err))?;
        if read == 0 {
            break;
        }

        let key = entry::line_key(&line);
        let same_key = previous_key.as_ref().map_or(false, |prev| &prev[..] == key);

        if !same_key {
            while current + 1 < blocks.len() && position >= blocks[current].to {
                current += 1;
                bounds[current] = position;
            }
            previous_key = Some(key.to_vec());
        }

        writers[current]
            .write_all(&line)
            .map_err(|err| Error::io(&outputs[current], err))?;

        position += read as u64;
    }

    // Partitions past the last written one are empty at the end of the file.
    for bound in bounds.iter_mut().skip(current + 1) {
        *bound = position;
    }

    for (writer, path) in writers.iter_mut().zip(outputs) {
        writer.flush().map_err(|err| Error::io(path, err))?;
    }

    Ok(bounds
        .windows(2)
        .map(|pair| Block {
            from: pair[0],
            to: pair[1],
        })
        .collect())
}
