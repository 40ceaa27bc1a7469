use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use koma::config::{self, CliOverrides};
use koma::nav::Step;
use koma::page::Page;
use koma::session::{self, Session, Spread};
use koma::sort::SortStrategy;

#[derive(Parser)]
#[command(
    name = "koma",
    version = koma::VERSION,
    about = "Image and manga viewer with book mode and background preloading"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Image files, directories or archives (zip/cbz, rar/cbr, 7z/cb7)
    #[arg(global = true)]
    inputs: Vec<PathBuf>,

    /// Show two pages side by side
    #[arg(long, global = true)]
    book: bool,

    /// Right-to-left reading order in book mode
    #[arg(long, global = true)]
    rtl: bool,

    /// Page ordering
    #[arg(long, global = true, value_enum)]
    sort: Option<SortStrategy>,

    /// Number of decoded pages kept in memory
    #[arg(long, global = true)]
    cache_size: Option<usize>,

    /// Pages preloaded per navigation step
    #[arg(long, global = true)]
    preload_depth: Option<usize>,

    /// Disable background preloading
    #[arg(long, global = true)]
    no_preload: bool,

    /// Disable automatic rescans when the inputs change
    #[arg(long, global = true)]
    no_watch: bool,

    /// Log output file path (enables logging when specified)
    #[arg(long, global = true)]
    log: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the ordered page list
    List,
    /// Walk every frame in the configured mode and print what it shows
    Spreads,
}

fn main() {
    let cli = Cli::parse();

    if let Some(log_path) = &cli.log {
        let file = match std::fs::File::create(log_path) {
            Ok(f) => f,
            Err(e) => {
                eprintln!("Error: failed to open log file {}: {e}", log_path.display());
                std::process::exit(1);
            }
        };
        env_logger::Builder::from_default_env()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();
    } else if cli.command.is_some() {
        env_logger::init();
    }
    // viewer mode + no --log → logger not initialized (no log output)

    // Load config file and merge CLI overrides
    let mut cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    };
    cfg.merge_cli(&CliOverrides {
        sort: cli.sort,
        cache_size: cli.cache_size,
        preload_depth: cli.preload_depth,
        no_preload: cli.no_preload,
        book: cli.book,
        rtl: cli.rtl,
        no_watch: cli.no_watch,
    });
    let config = cfg.resolve();

    let result = if cli.inputs.is_empty() {
        Err(anyhow::anyhow!("at least one input path is required"))
    } else {
        match cli.command {
            Some(Command::List) => cmd_list(&cli.inputs, config.session.sort),
            Some(Command::Spreads) => cmd_spreads(cli.inputs, &config),
            None => koma::viewer::run(cli.inputs, &config),
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn cmd_list(inputs: &[PathBuf], sort: SortStrategy) -> Result<()> {
    let pages = session::scan(inputs, sort);
    if pages.is_empty() {
        anyhow::bail!("no pages found");
    }
    for (i, locator) in pages.iter().enumerate() {
        println!("{:>5}  {}", i + 1, locator.key());
    }
    eprintln!("{} page(s), sort={sort}", pages.len());
    Ok(())
}

/// Steps by the width of each displayed frame, so a page that could not be
/// paired is not skipped.
fn cmd_spreads(inputs: Vec<PathBuf>, config: &config::Config) -> Result<()> {
    let start = Instant::now();
    let mut session =
        Session::open(inputs, &config.session).context("failed to open inputs")?;
    let len = session.len();
    let mut frames = 0;

    loop {
        let spread = session.current_spread();
        frames += 1;
        println!("{:>5}  {}", frames, describe(&spread));

        let Some(&last_shown) = spread.indices().iter().max() else {
            break;
        };
        if last_shown + 1 >= len {
            break;
        }
        session.advance(Step::Next, !spread.is_pair());
    }

    let cache = session.cache_stats();
    let preload = session.preload_stats();
    info!(
        "cmd_spreads: {frames} frame(s) in {:.1}ms",
        start.elapsed().as_secs_f64() * 1000.0
    );
    eprintln!(
        "{len} page(s), {frames} frame(s); cache hits={} misses={}; preload loaded={} failed={}",
        cache.hits, cache.misses, preload.loaded, preload.failed
    );
    Ok(())
}

fn describe(spread: &Spread) -> String {
    match spread {
        Spread::Empty => "(empty)".into(),
        Spread::Single { index, page } => frame_name(*index, page),
        Spread::Pair { left, right } => {
            format!("{}  |  {}", frame_name(left.0, &left.1), frame_name(right.0, &right.1))
        }
    }
}

fn frame_name(index: usize, page: &Page) -> String {
    let mark = if page.is_placeholder() {
        " (unreadable)"
    } else {
        ""
    };
    format!("{} {}{mark}", index + 1, page.label())
}
