//! Outlier detection CLI for entity attribute datasets.
//!
//! Loads `entity_id<TAB>value` attribute tables (and optionally an
//! `entity_id<TAB>tag` type table for cluster conditioning), runs a
//! detection pipeline, and prints a JSON report.

use clap::{Parser, Subcommand, ValueEnum};
use entity_outliers::error::{OutlierError, Result};
use entity_outliers::prelude::*;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// CLI-friendly detector method enum.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMethod {
    /// Range-based detection (percentile envelope)
    Iqr,
    /// Deviation-based detection (median absolute deviation)
    Mad,
    /// Density-based detection (kernel density estimate)
    Kde,
}

/// Entity outlier detection
#[derive(Parser)]
#[command(name = "outliers")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline from a YAML configuration file
    Run {
        /// Path to pipeline configuration YAML
        #[arg(short = 'c', long)]
        config: PathBuf,

        /// Path to attribute TSV (entity_id, value)
        #[arg(short, long)]
        data: PathBuf,

        /// Path to type TSV (entity_id, tag); required when the config
        /// enables clustering
        #[arg(short, long)]
        types: Option<PathBuf>,

        /// Discard fraction p for the tag vocabulary
        #[arg(long, default_value_t = 0.05)]
        discard_fraction: f64,

        /// Write unparsable attribute rows to this file
        #[arg(long)]
        parse_failures: Option<PathBuf>,

        /// Write the JSON report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a single detector globally with flag-level parameters
    Detect {
        /// Path to attribute TSV (entity_id, value)
        #[arg(short, long)]
        data: PathBuf,

        /// Detection method
        #[arg(short, long, value_enum)]
        method: CliMethod,

        /// Upper percentile (iqr)
        #[arg(long, default_value_t = 75.0)]
        upper: f64,

        /// Lower percentile (iqr)
        #[arg(long, default_value_t = 25.0)]
        lower: f64,

        /// Multiplying factor (iqr, mad)
        #[arg(long)]
        factor: Option<f64>,

        /// Kernel bandwidth (kde); derived from the data when omitted
        #[arg(long)]
        bandwidth: Option<f64>,

        /// Rescaled-density threshold (kde)
        #[arg(long, default_value_t = 1.0)]
        threshold: f64,

        /// Write the JSON report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            data,
            types,
            discard_fraction,
            parse_failures,
            output,
        } => run_pipeline(
            &config,
            &data,
            types.as_deref(),
            discard_fraction,
            parse_failures.as_deref(),
            output.as_deref(),
        ),
        Commands::Detect {
            data,
            method,
            upper,
            lower,
            factor,
            bandwidth,
            threshold,
            output,
        } => {
            let spec = match method {
                CliMethod::Iqr => DetectorSpec::Iqr {
                    upper,
                    lower,
                    factor: factor.unwrap_or(1.5),
                },
                CliMethod::Mad => DetectorSpec::Mad {
                    factor: factor.unwrap_or(1.0),
                },
                CliMethod::Kde => DetectorSpec::Kde {
                    bandwidth,
                    threshold,
                },
            };
            let config = PipelineConfig {
                name: "detect".to_string(),
                detectors: vec![spec],
                clustering: None,
                combine: false,
            };
            run_config(&config, &data, None, 0.05, None, output.as_deref())
        }
    }
}

fn run_pipeline(
    config_path: &std::path::Path,
    data: &std::path::Path,
    types: Option<&std::path::Path>,
    discard_fraction: f64,
    parse_failures: Option<&std::path::Path>,
    output: Option<&std::path::Path>,
) -> Result<()> {
    let yaml = fs::read_to_string(config_path)?;
    let config = PipelineConfig::from_yaml(&yaml)?;
    run_config(&config, data, types, discard_fraction, parse_failures, output)
}

fn run_config(
    config: &PipelineConfig,
    data: &std::path::Path,
    types: Option<&std::path::Path>,
    discard_fraction: f64,
    parse_failures: Option<&std::path::Path>,
    output: Option<&std::path::Path>,
) -> Result<()> {
    let (table, failures) = AttributeTable::from_tsv(data)?;

    if !failures.is_empty() {
        eprintln!("{} rows skipped as unparsable", failures.len());
        if let Some(path) = parse_failures {
            let mut file = fs::File::create(path)?;
            for f in &failures {
                writeln!(file, "{}:{}", f.entity_id, f.raw_value)?;
            }
        }
    }

    let extraction = match (&config.clustering, types) {
        (Some(_), Some(types_path)) => {
            let type_table = TypeTable::from_tsv(types_path)?;
            let extraction =
                extract_features(table.entity_ids(), &type_table, discard_fraction)?;
            for failure in &extraction.failures {
                eprintln!(
                    "type lookup failed for '{}': {}",
                    failure.entity_id, failure.reason
                );
            }
            Some(extraction)
        }
        (Some(_), None) => {
            return Err(OutlierError::InvalidParameter(
                "Pipeline config enables clustering; supply --types".to_string(),
            ))
        }
        (None, _) => None,
    };

    let report = Pipeline::from_config(config)
        .run(&table, extraction.as_ref().map(|e| &e.matrix))?;

    eprintln!("{}", report);
    let json = report.to_json()?;
    match output {
        Some(path) => fs::write(path, json)?,
        None => println!("{}", json),
    }
    Ok(())
}
