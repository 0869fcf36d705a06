//! MapReduce pipeline over the lines of one file.
//!
//! The workflow is illustrated as following:
//!
//! input ─> split into line aligned blocks
//!       ─> map workers (one thread per block)      ─> mapper/map.<i>.txt
//!       ─> join ─> external merge + redistribution ─> shuffle/part.<j>.txt
//!       ─> reduce workers (one thread per part)    ─> reducer/reduce.<j>.txt
//!       ─> join
//!
//! No phase starts before every worker of the previous one has reported back,
//! and a failed worker aborts the run.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::chunk;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::map::{self, Mapper};
use crate::reduce::{self, Reduced, Reducer};
use crate::shuffle::{self, Shuffled};

pub struct MapReduce<M, R> {
    config: Config,
    mapper: Arc<M>,
    reducer: Arc<R>,
}

/// Files and outcomes of one completed run.
#[derive(Debug, Clone)]
pub struct Report {
    pub map_outputs: Vec<PathBuf>,
    pub shuffled: Shuffled,
    pub reduced: Vec<Reduced>,
}

impl Report {
    /// The conjunction of every partition's outcome.
    pub fn outcome(&self) -> bool {
        self.reduced.iter().all(|reduced| reduced.outcome)
    }

    pub fn result_files(&self) -> impl Iterator<Item = &Path> {
        self.reduced.iter().map(|reduced| reduced.output.as_path())
    }
}

impl<M, R> MapReduce<M, R>
where
    M: Mapper + 'static,
    R: Reducer + 'static,
{
    pub fn new(config: Config, mapper: M, reducer: R) -> MapReduce<M, R> {
        MapReduce {
            config,
            mapper: Arc::new(mapper),
            reducer: Arc::new(reducer),
        }
    }

    /// Replace the mapper used by following runs.
    pub fn set_mapper(&mut self, mapper: M) {
        self.mapper = Arc::new(mapper);
    }

    /// Replace the reducer used by following runs.
    pub fn set_reducer(&mut self, reducer: R) {
        self.reducer = Arc::new(reducer);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run<P: AsRef<Path>, Q: AsRef<Path>>(&self, input: P, output_dir: Q) -> Result<Report> {
        let input = input.as_ref();
        let output_dir = output_dir.as_ref();
        let timeout = self.config.worker_timeout();

        log::info!(
            "Run {} with {} mappers and {} reducers into {}",
            input.display(),
            self.config.mappers(),
            self.config.reducers(),
            output_dir.display()
        );

        let blocks = chunk::split(input, self.config.mappers())?;

        log::info!("Start mapping process.");

        let map_outputs = map::run(
            Arc::clone(&self.mapper),
            input,
            &blocks,
            output_dir,
            timeout,
        )?;

        log::info!("Start shuffling process.");

        let shuffled = shuffle::run(&map_outputs, self.config.reducers(), output_dir)?;

        log::info!(
            "Shuffled {} records into {} partitions",
            shuffled.records,
            shuffled.partitions.len()
        );

        if self.config.remove_intermediate() {
            remove_temp_files(map_outputs.iter().chain(Some(&shuffled.merged)))?;
        }

        log::info!("Start reducing process.");

        let reduced = reduce::run(
            Arc::clone(&self.reducer),
            &shuffled.partitions,
            output_dir,
            timeout,
        )?;

        let report = Report {
            map_outputs,
            shuffled,
            reduced,
        };

        log::info!("Finished run, outcome {}", report.outcome());

        Ok(report)
    }
}

fn remove_temp_files<'a, I: Iterator<Item = &'a PathBuf>>(paths: I) -> Result<()> {
    for path in paths {
        log::debug!("Remove temp file {}", path.display());
        fs::remove_file(path).map_err(|err| Error::io(path, err))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::Record;

    fn first_letter(line: &str) -> Vec<Record> {
        line.chars()
            .next()
            .map(|c| vec![Record::new(c.to_string(), 1)])
            .unwrap_or_default()
    }

    /// Fails on a key seen right before, remembering the previous key in its state.
    struct Distinct;

    impl Reducer for Distinct {
        type State = Option<String>;

        fn reduce(&self, previous: &mut Option<String>, record: &Record) -> bool {
            let repeated = previous.as_deref() == Some(record.key.as_str());
            *previous = Some(record.key.clone());
            !repeated
        }
    }

    fn write_input(dir: &Path, content: &str) -> PathBuf {
        let input = dir.join("input.txt");
        fs::write(&input, content).unwrap();
        input
    }

    #[test]
    fn test_run_first_letters() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "apple\napricot\nbanana\navocado\n");
        let out = dir.path().join("out");

        let runner = MapReduce::new(Config::new(2, 2).unwrap(), first_letter, Distinct);
        let report = runner.run(&input, &out).unwrap();

        assert_eq!(report.map_outputs.len(), 2);
        assert_eq!(fs::read_to_string(&report.map_outputs[0]).unwrap(), "a 1\na 1\n");
        assert_eq!(fs::read_to_string(&report.map_outputs[1]).unwrap(), "a 1\nb 1\n");

        assert_eq!(
            fs::read_to_string(&report.shuffled.partitions[0]).unwrap(),
            "a 1\na 1\na 1\n"
        );
        assert_eq!(
            fs::read_to_string(&report.shuffled.partitions[1]).unwrap(),
            "b 1\n"
        );

        let outcomes: Vec<_> = report.reduced.iter().map(|r| r.outcome).collect();
        assert_eq!(outcomes, vec![false, true]);
        assert!(!report.outcome());
        assert_eq!(report.result_files().count(), 2);
    }

    #[test]
    fn test_missing_input_does_not_start() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");

        let runner = MapReduce::new(Config::new(2, 2).unwrap(), first_letter, Distinct);
        let result = runner.run(dir.path().join("missing.txt"), &out);

        assert!(matches!(result, Err(Error::Open { .. })));
        assert!(!out.exists());
    }

    #[test]
    fn test_remove_intermediate() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "one\ntwo\nthree\n");
        let out = dir.path().join("out");

        let config = Config::new(2, 1).unwrap().with_remove_intermediate(true);
        let report = MapReduce::new(config, first_letter, Distinct)
            .run(&input, &out)
            .unwrap();

        assert!(report.map_outputs.iter().all(|path| !path.exists()));
        assert!(!report.shuffled.merged.exists());
        assert!(report.shuffled.partitions[0].exists());
        // "two" and "three" share their first letter.
        assert!(!report.outcome());
    }

    #[test]
    fn test_set_reducer() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), "abc\nabd\n");

        struct Always(bool);

        impl Reducer for Always {
            type State = ();

            fn reduce(&self, _: &mut (), _: &Record) -> bool {
                self.0
            }
        }

        let mut runner = MapReduce::new(Config::new(1, 1).unwrap(), first_letter, Always(false));
        assert!(!runner.run(&input, dir.path().join("first")).unwrap().outcome());

        runner.set_reducer(Always(true));
        assert!(runner.run(&input, dir.path().join("second")).unwrap().outcome());
    }
}
