//! Split a file into byte ranges aligned to line boundaries.

use std::cmp;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Error, Result};

/// Half-open byte range `[from, to)` of a file.
///
/// Both ends sit at the start of a line or at the end of the file.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Block {
    pub from: u64,
    pub to: u64,
}

impl Block {
    #[inline]
    pub fn len(&self) -> u64 {
        self.to - self.from
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }
}

/// Split the file at `path` into `count` contiguous blocks covering it entirely.
///
/// Each tentative cut at a multiple of `size / count` is pushed forward past the
/// end of the line it falls in. Blocks may be empty when lines are long or few.
pub fn split<P: AsRef<Path>>(path: P, count: usize) -> Result<Vec<Block>> {
    if count == 0 {
        return Err(Error::Configuration(
            "block count must be greater than zero".to_string(),
        ));
    }

    let path = path.as_ref();
    let file = File::open(path).map_err(|err| Error::open(path, err))?;
    let size = file.metadata().map_err(|err| Error::io(path, err))?.len();

    let mut reader = BufReader::new(file);
    let blocks = split_reader(&mut reader, size, count).map_err(|err| Error::io(path, err))?;

    log::debug!(
        "Split {} ({} bytes) into {} blocks: {:?}",
        path.display(),
        size,
        count,
        blocks
    );

    Ok(blocks)
}

fn split_reader<R: BufRead + Seek>(reader: &mut R, size: u64, count: usize) -> io::Result<Vec<Block>> {
    let chunk = size / count as u64;

    let mut blocks = Vec::with_capacity(count);
    let mut from = 0;

    for i in 1..=count {
        // The last block always ends at the file size, whatever the rounding was.
        let to = if i == count {
            size
        } else {
            let tentative = cmp::max(i as u64 * chunk, from);
            line_boundary(reader, size, tentative)?
        };

        blocks.push(Block { from, to });
        from = to;
    }

    Ok(blocks)
}

/// The first line start at or after `offset`.
fn line_boundary<R: BufRead + Seek>(reader: &mut R, size: u64, offset: u64) -> io::Result<u64> {
    if offset == 0 || offset >= size {
        return Ok(cmp::min(offset, size));
    }

    // Start one byte early so an offset already on a line start stays put.
    reader.seek(SeekFrom::Start(offset - 1))?;

    let mut rest = Vec::new();
    let consumed = reader.read_until(b'\n', &mut rest)?;

    Ok(offset - 1 + consumed as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn split_bytes(data: &[u8], count: usize) -> Vec<Block> {
        let mut cursor = Cursor::new(data);
        split_reader(&mut cursor, data.len() as u64, count).unwrap()
    }

    fn assert_aligned(data: &[u8], blocks: &[Block]) {
        assert_eq!(blocks.first().unwrap().from, 0);
        assert_eq!(blocks.last().unwrap().to, data.len() as u64);

        for pair in blocks.windows(2) {
            assert_eq!(pair[0].to, pair[1].from);
        }

        for block in blocks {
            assert!(block.from <= block.to);
            let to = block.to as usize;
            assert!(to == 0 || to == data.len() || data[to - 1] == b'\n');
        }
    }

    #[test]
    fn test_split_on_line_boundaries() {
        let data = b"apple\napricot\nbanana\navocado\n";

        for count in 1..10 {
            let blocks = split_bytes(data, count);
            assert_eq!(blocks.len(), count);
            assert_aligned(data, &blocks);
        }
    }

    #[test]
    fn test_split_two_blocks() {
        let data = b"apple\napricot\nbanana\navocado\n";
        let blocks = split_bytes(data, 2);

        // 29 / 2 = 14 is the start of "banana".
        assert_eq!(
            blocks,
            vec![Block { from: 0, to: 14 }, Block { from: 14, to: 29 }]
        );
    }

    #[test]
    fn test_more_blocks_than_lines() {
        let data = b"a\nb\n";
        let blocks = split_bytes(data, 6);

        assert_aligned(data, &blocks);
        assert!(blocks.iter().filter(|block| block.is_empty()).count() >= 4);
        assert_eq!(blocks.iter().map(Block::len).sum::<u64>(), 4);
    }

    #[test]
    fn test_last_line_without_newline() {
        let data = b"first\nsecond\nthird";
        let blocks = split_bytes(data, 3);

        assert_aligned(data, &blocks);
        assert_eq!(blocks.last().unwrap().to, data.len() as u64);
    }

    #[test]
    fn test_empty_file() {
        let blocks = split_bytes(b"", 3);

        assert!(blocks.iter().all(Block::is_empty));
    }

    #[test]
    fn test_split_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"one\ntwo\nthree\nfour\n").unwrap();

        let blocks = split(file.path(), 2).unwrap();

        assert_eq!(blocks, vec![Block { from: 0, to: 14 }, Block { from: 14, to: 19 }]);
    }

    #[test]
    fn test_zero_blocks_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();

        assert!(matches!(split(file.path(), 0), Err(Error::Configuration(_))));
    }
}
