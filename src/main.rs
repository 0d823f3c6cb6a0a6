use anyhow::{Context, Result};
use clap::Parser;
use falseshare::cli::{AggregateArgs, Cli, Command, OutputFormat};
use falseshare::config::AnalysisConfig;
use falseshare::pipeline::{self, Analysis};
use falseshare::{candidates, report};
use std::fs::File;
use std::io::{self, BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber; logs always go to stderr
///
/// `RUST_LOG` sets the filter (default `info`); `--debug` and `--quiet`
/// override its global level.
fn init_tracing(debug: bool, quiet: bool) {
    let mut filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    if debug {
        filter = filter.add_directive(LevelFilter::TRACE.into());
    } else if quiet {
        filter = filter.add_directive(LevelFilter::WARN.into());
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_target(false)
        .init();
}

/// Defaults, then the config file, then CLI flags
fn load_config(path: Option<&Path>, cache_line_size: Option<u64>) -> Result<AnalysisConfig> {
    let config = match path {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };

    match cache_line_size {
        Some(size) => Ok(config.with_cache_line_size(size)?),
        None => Ok(config),
    }
}

fn create_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Could not open output file: {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout().lock()))),
    }
}

fn run_detect(trace: &Path, output: Option<PathBuf>, config: &AnalysisConfig) -> Result<()> {
    let output = output.unwrap_or_else(|| {
        let mut name = trace.as_os_str().to_owned();
        name.push(".interferences");
        PathBuf::from(name)
    });

    let (conflicts, _) = pipeline::detect_file(trace, config)?;

    tracing::info!("Number of interferences: {}", conflicts.len());
    let mut out = create_output(Some(&output))?;
    candidates::write_interferences(&mut out, &conflicts)?;
    tracing::info!("Outputted interferences to file: {}", output.display());
    Ok(())
}

fn write_report(analysis: &Analysis, args: &AggregateArgs, config: &AnalysisConfig) -> Result<()> {
    let mut out = create_output(args.output.as_deref())?;
    let records = match args.top {
        Some(limit) => report::ranked(&analysis.records, Some(limit)),
        None => analysis.records.iter().collect(),
    };

    match args.format {
        OutputFormat::Text => report::write_text(&mut out, records)?,
        OutputFormat::Json => report::write_json(
            &mut out,
            &report::JsonReport {
                cache_line_size: analysis.trace.map(|_| config.cache_line_size),
                conflicts: records,
                trace: analysis.trace,
                aggregate: analysis.aggregate,
            },
        )?,
    }

    if let Some(path) = &args.output {
        tracing::info!("Wrote conflict report to {}", path.display());
    }
    Ok(())
}

fn run_aggregate(
    realized: Option<&Path>,
    trace: Option<&Path>,
    args: &AggregateArgs,
    config: &AnalysisConfig,
) -> Result<()> {
    let source = args
        .symbol_source()
        .context("Must specify either --symbols FILE or --binary FILE")?;
    let symbols = source.load()?;
    let potential = args.potential.as_deref();

    let analysis = match (realized, trace) {
        (Some(realized), _) => pipeline::map_files(realized, potential, &symbols)?,
        (None, Some(trace)) => pipeline::analyze_file(trace, potential, &symbols, config)?,
        (None, None) => anyhow::bail!("Nothing to analyze"),
    };

    write_report(&analysis, args, config)
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug, args.quiet);

    let config = load_config(args.config.as_deref(), args.cache_line_size)?;

    match args.command {
        Command::Detect { trace, output } => run_detect(&trace, output, &config),
        Command::Map {
            realized,
            aggregate,
        } => run_aggregate(Some(&realized), None, &aggregate, &config),
        Command::Analyze { trace, aggregate } => {
            run_aggregate(None, Some(&trace), &aggregate, &config)
        }
    }
}
