//! DumpCut CLI
//!
//! Reads a Subversion dump stream from `--infile` (stdin by default),
//! applies one transform and writes the result to stdout. Diagnostics go
//! to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dumpcut_core::{
    DumpSource, Expunge, LineSource, Log, LogPatch, PathRename, PropDel, PropRename, PropSet,
    PropertyAssignment, PropertyRename, Renumberer, ReportOptions, See, Selection, SetLog, Sift,
    Strip, Swap, Transform, reduce, select,
};
use serde_json::json;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "dumpcut")]
#[command(author = "DumpCut Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Filter, redact, renumber and reduce Subversion dump streams")]
struct Cli {
    /// Revisions to operate on, e.g. 0:10,15,20:HEAD
    #[arg(short, long, global = true, default_value = "0:HEAD")]
    range: Selection,

    /// Read the dump from a file instead of stdin
    #[arg(short, long, global = true)]
    infile: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Print run statistics as JSON on stderr
    #[arg(long, global = true)]
    stats: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy the selected revisions unchanged
    Select,

    /// Delete revision properties
    Propdel {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Set revision properties (name=value)
    Propset {
        #[arg(required = true)]
        assignments: Vec<PropertyAssignment>,
    },

    /// Rename revision properties (old->new)
    Proprename {
        #[arg(required = true)]
        renames: Vec<PropertyRename>,
    },

    /// List log entries of the selected revisions in `svn log` format
    Log,

    /// Replace log messages from an `svn log` listing
    Setlog {
        /// Log listing to splice in
        #[arg(short, long)]
        logentries: PathBuf,
    },

    /// Replace file content with a cookie naming revision and path
    Strip {
        /// Only strip paths matching every pattern
        patterns: Vec<String>,
    },

    /// Drop nodes whose path matches any pattern
    Expunge {
        #[arg(required = true)]
        patterns: Vec<String>,
    },

    /// Keep only nodes whose path matches any pattern
    Sift {
        #[arg(required = true)]
        patterns: Vec<String>,
    },

    /// Rewrite paths with a regular expression
    Pathrename {
        /// Pattern to search for
        from: String,
        /// Replacement, may use $1 / ${name}
        to: String,
    },

    /// Renumber revisions densely, fixing copy sources and mergeinfo
    Renumber {
        /// Number given to the first revision
        #[arg(short, long, default_value_t = 0)]
        base: u64,
    },

    /// Drop runs of plain file modifications (needs a seekable file)
    Reduce {
        file: PathBuf,
    },

    /// Print a one-line summary of each node
    See,

    /// Swap the top two path components (project/trunk -> trunk/project)
    Swap,
}

fn init_tracing(debug: bool, quiet: bool) {
    let env_filter = if debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else if quiet {
        tracing_subscriber::EnvFilter::new("warn")
    } else {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(env_filter)
        .init();
}

fn open_input(infile: Option<&Path>) -> Result<Box<dyn BufRead>> {
    match infile {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open input file {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(io::stdin().lock())),
    }
}

/// Run `transform` through the report driver over the input stream.
fn report(
    cli: &Cli,
    transform: &mut dyn Transform,
    options: ReportOptions,
    out: &mut dyn Write,
) -> Result<serde_json::Value> {
    let mut source = DumpSource::new(open_input(cli.infile.as_deref())?);
    source
        .report(&cli.range, transform, options, out)
        .context("failed to process dump stream")?;
    Ok(serde_json::to_value(source.stats())?)
}

fn run(cli: &Cli, out: &mut dyn Write) -> Result<serde_json::Value> {
    match &cli.command {
        Commands::Select => {
            let mut source = DumpSource::new(open_input(cli.infile.as_deref())?);
            select(&mut source, &cli.range, out).context("failed to select revisions")?;
            Ok(serde_json::to_value(source.stats())?)
        }
        Commands::Propdel { names } => report(
            cli,
            &mut PropDel::new(names.iter().cloned()),
            ReportOptions::REWRITE,
            out,
        ),
        Commands::Propset { assignments } => report(
            cli,
            &mut PropSet::new(assignments.clone()),
            ReportOptions::REWRITE,
            out,
        ),
        Commands::Proprename { renames } => report(
            cli,
            &mut PropRename::new(renames.clone()),
            ReportOptions::REWRITE,
            out,
        ),
        Commands::Log => {
            let mut log = Log::new(cli.range.clone(), out);
            report(cli, &mut log, ReportOptions::INSPECT, &mut io::sink())
        }
        Commands::Setlog { logentries } => {
            let file = File::open(logentries)
                .with_context(|| format!("failed to open log patch {}", logentries.display()))?;
            let patch = LogPatch::parse(BufReader::new(file), Some(&cli.range))
                .with_context(|| format!("failed to parse log patch {}", logentries.display()))?;
            report(cli, &mut SetLog::new(patch), ReportOptions::REWRITE, out)
        }
        Commands::Strip { patterns } => {
            report(cli, &mut Strip::new(patterns)?, ReportOptions::REWRITE, out)
        }
        Commands::Expunge { patterns } => {
            report(cli, &mut Expunge::new(patterns)?, ReportOptions::REWRITE, out)
        }
        Commands::Sift { patterns } => {
            report(cli, &mut Sift::new(patterns)?, ReportOptions::FILTER, out)
        }
        Commands::Pathrename { from, to } => {
            report(cli, &mut PathRename::new(from, to)?, ReportOptions::REWRITE, out)
        }
        Commands::Renumber { base } => {
            let mut source = LineSource::new(open_input(cli.infile.as_deref())?);
            let mut renumberer = Renumberer::new(*base);
            renumberer
                .run(&mut source, out)
                .context("failed to renumber dump stream")?;
            Ok(json!({ "revisions_renumbered": renumberer.mapping().len() }))
        }
        Commands::Reduce { file } => {
            let handle = File::open(file)
                .with_context(|| format!("failed to open dump file {}", file.display()))?;
            let mut source = DumpSource::new(BufReader::new(handle));
            let kept = reduce(&mut source, out).context("failed to reduce dump stream")?;
            info!(selection = %kept, "reduction complete");
            Ok(serde_json::to_value(source.stats())?)
        }
        Commands::See => {
            let mut see = See::new(out);
            report(cli, &mut see, ReportOptions::INSPECT, &mut io::sink())
        }
        Commands::Swap => report(cli, &mut Swap::new(), ReportOptions::REWRITE, out),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug, cli.quiet);
    debug!(selection = %cli.range, command = ?cli.command, "starting");

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let stats = run(&cli, &mut out)?;
    out.flush().context("failed to flush output")?;

    if cli.stats {
        eprintln!("{}", serde_json::to_string_pretty(&stats)?);
    }
    Ok(())
}
