use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use futures::future::join_all;

use logsift_engine::{
    Analyzer, ContinuationPolicy, Encoding, ErrorType, RecordFilter, RuleSet, SortPolicy, digest,
    project,
};

mod config;
mod input;
mod output;

use config::Config;
use input::InputReader;
use output::{FileReport, OutputFormat};

/// Logsift - classify and count errors in log files
#[derive(Parser, Debug)]
#[command(name = "logsift")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log files to analyze
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Row order: count, first, severity
    #[arg(short, long, default_value = "count")]
    sort: SortPolicy,

    /// Input encoding (utf-8, utf-16le, utf-16be, latin1); sniffed when omitted
    #[arg(short, long)]
    encoding: Option<Encoding>,

    /// Treat every line without a header as a continuation
    #[arg(long)]
    strict: bool,

    /// Keep only records at least this severe
    #[arg(long, value_name = "TYPE")]
    min_level: Option<ErrorType>,

    /// Keep only records whose text matches this regex (case-insensitive)
    #[arg(long, value_name = "REGEX")]
    grep: Option<String>,

    /// Drop records matching --grep instead of keeping them
    #[arg(long, requires = "grep")]
    invert: bool,

    /// Sample messages kept per error type
    #[arg(long, value_name = "N")]
    samples: Option<usize>,

    /// Print the compact digest
    #[arg(long)]
    digest: bool,

    /// Print records packed into chunks of at most N characters
    #[arg(long, value_name = "N")]
    chunks: Option<usize>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Analyze every file; `Ok(false)` when at least one of them failed
async fn run(args: Args) -> Result<bool> {
    let config = Config::load(args.config.as_deref())?;
    let analyzer = Arc::new(build_analyzer(&args, &config)?);
    let reader = InputReader::new(config.input.clone());
    let want_chunks = args.chunks.is_some();

    let tasks = args.files.iter().map(|path| {
        let analyzer = Arc::clone(&analyzer);
        let reader = reader.clone();
        let path = path.clone();
        async move {
            let bytes = reader.read(&path).await?;
            let label = path.display().to_string();
            let analyzed = tokio::task::spawn_blocking(move || -> Result<_> {
                let records = analyzer
                    .classify_all(&bytes)
                    .with_context(|| format!("Failed to decode {label}"))?;
                let summary = analyzer.analyze_records(&records);
                let chunks = want_chunks.then(|| analyzer.chunk_records(&records));
                Ok((label, summary, chunks))
            })
            .await
            .context("analysis task panicked")??;
            Ok::<_, anyhow::Error>(analyzed)
        }
    });

    let mut reports = Vec::new();
    let mut all_ok = true;
    for result in join_all(tasks).await {
        match result {
            Ok((label, summary, chunks)) => {
                let rows = project(&summary, args.sort);
                let mut report = FileReport::new(label, &summary, rows);
                if args.digest {
                    report.digest = Some(digest(&summary));
                }
                report.chunks = chunks;
                reports.push(report);
            }
            Err(e) => {
                all_ok = false;
                eprintln!("Error: {:#}", e);
            }
        }
    }

    if !reports.is_empty() {
        println!("{}", output::render(&reports, args.format)?);
    }
    Ok(all_ok)
}

/// Merge command-line flags over the configuration file
fn build_analyzer(args: &Args, config: &Config) -> Result<Analyzer> {
    let mut options = config.analysis.clone();
    if args.encoding.is_some() {
        options.encoding = args.encoding;
    }
    if args.strict {
        options.continuation = ContinuationPolicy::Strict;
    }
    if let Some(samples) = args.samples {
        options.sample_limit = samples;
    }
    if let Some(chunk_chars) = args.chunks {
        options.chunk_chars = chunk_chars;
    }

    let rules = RuleSet::from_config(&config.rules).context("Invalid [rules] configuration")?;
    let mut analyzer = Analyzer::new(rules, options).context("Failed to build analyzer")?;

    let mut filter = match &args.grep {
        Some(pattern) => RecordFilter::text(pattern)
            .with_context(|| format!("Invalid --grep pattern '{pattern}'"))?,
        None => RecordFilter::default(),
    };
    if args.invert {
        filter = filter.excluding_text();
    }
    if let Some(min) = args.min_level {
        filter = filter.at_least(min);
    }
    if !filter.is_empty() {
        tracing::debug!(?filter, "filtering records");
        analyzer = analyzer.with_filter(filter);
    }
    Ok(analyzer)
}
