//! Find the shortest unique line prefix of a large file.
//!
//! Execution:
//! ```
//! cargo run -- --input data/words.txt --mappers 4 --reducers 2
//! ```

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use failure::{Error, ResultExt};

use unique_prefix::Config;

#[derive(Parser, Debug)]
#[command(
    name = "unique-prefix",
    version,
    about = "Find the shortest prefix length that makes every line of a file unique"
)]
struct Cli {
    /// Input file to process
    #[arg(short, long)]
    input: PathBuf,

    /// Directory for intermediate and result files
    #[arg(short, long, default_value = "out")]
    output: PathBuf,

    /// Amount of mapper threads
    #[arg(short, long, default_value_t = 3)]
    mappers: usize,

    /// Amount of reducer threads
    #[arg(short, long, default_value_t = 2)]
    reducers: usize,

    /// Longest prefix to try before giving up
    #[arg(long, default_value_t = 256)]
    max_prefix: usize,

    /// Abort a phase whose workers take longer than this
    #[arg(long)]
    timeout_secs: Option<u64>,
}

fn main() {
    let env = env_logger::Env::default().filter_or("RUST_LOG", "info");

    env_logger::init_from_env(env);

    let cli = Cli::parse();

    if let Err(error) = run(cli) {
        log::error!("{}", error);
        for cause in error.iter_causes() {
            log::error!("caused by: {}", cause);
        }
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    let mut config = Config::new(cli.mappers, cli.reducers).context("Invalid worker counts")?;

    if let Some(secs) = cli.timeout_secs {
        config = config.with_worker_timeout(Duration::from_secs(secs));
    }

    log::info!(
        "Using {} mappers, {} reducers with {} file",
        cli.mappers,
        cli.reducers,
        cli.input.display()
    );

    let length = unique_prefix::shortest_unique_prefix(config, &cli.input, &cli.output, cli.max_prefix)
        .context("Failed to find unique prefix")?;

    match length {
        Some(length) => log::info!("Found the shortest unique prefix length : {}", length),
        None => log::info!(
            "Can't find a unique prefix up to length {}.",
            cli.max_prefix
        ),
    }

    Ok(())
}
