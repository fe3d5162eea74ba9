//! lowerc - run the semantic lowering passes over bound units
//!
//! # Usage
//!
//! ```bash
//! # Lower units and print a per-unit summary
//! lowerc Main.json Util.json
//!
//! # Write the lowered units next to each other in out/
//! lowerc --out out Main.json
//!
//! # Skip evaluation-order repair, show capture registries
//! lowerc --no-extract-unsequenced --dump-captures Main.json
//!
//! # Trace every rewrite of the sequencing pass
//! lowerc -vvv Main.json
//! ```

use clap::Parser;
use compiler::tast::TypedUnit;
use compiler::{error_codes, logging, lower_units, LoweringError, LoweringOptions};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "lowerc")]
#[command(version = "0.1.0")]
#[command(about = "Lower bound units: capture resolution, devirtualization, evaluation-order repair", long_about = None)]
struct Cli {
    /// Bound units, as JSON
    #[arg(required = true)]
    units: Vec<PathBuf>,

    /// Path to lowering.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Leave unsequenced expressions as they are
    #[arg(long)]
    no_extract_unsequenced: bool,

    /// Keep every method dynamically dispatched
    #[arg(long)]
    no_devirtualize: bool,

    /// Worker threads for lowering units in parallel
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Directory for the lowered units
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Print each unit's capture registry as JSON
    #[arg(long)]
    dump_captures: bool,

    /// More log output: -v summaries, -vv per pass, -vvv every rewrite
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();

    logging::init(cli.verbose);

    match run(cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    }
}

/// Options from the config file, overridden by command-line flags
fn load_options(cli: &Cli) -> Result<LoweringOptions, LoweringError> {
    let mut options = match &cli.config {
        Some(path) => LoweringOptions::from_file(path)?,
        None => LoweringOptions::default(),
    };
    if cli.no_extract_unsequenced {
        options.sequencing.extract_unsequenced = false;
    }
    if cli.no_devirtualize {
        options.devirtualization.enabled = false;
    }
    if cli.jobs.is_some() {
        options.pipeline.jobs = cli.jobs;
    }
    options.validate()?;
    Ok(options)
}

fn read_unit(path: &Path) -> Result<TypedUnit, LoweringError> {
    let unit_name = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|e| LoweringError::Input {
        code: error_codes::UNIT_READ_FAILED,
        unit: unit_name.clone(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| LoweringError::Input {
        code: error_codes::UNIT_DECODE_FAILED,
        unit: unit_name,
        message: e.to_string(),
    })
}

fn write_unit(dir: &Path, unit: &TypedUnit) -> Result<PathBuf, String> {
    std::fs::create_dir_all(dir).map_err(|e| format!("Failed to create {}: {}", dir.display(), e))?;
    let path = dir.join(format!("{}.json", unit.name));
    let json = serde_json::to_string_pretty(unit).map_err(|e| format!("Failed to encode {}: {}", unit.name, e))?;
    std::fs::write(&path, json).map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
    Ok(path)
}

/// Returns whether every unit lowered successfully
fn run(cli: Cli) -> Result<bool, String> {
    let options = load_options(&cli).map_err(|e| e.to_string())?;

    let mut units = Vec::with_capacity(cli.units.len());
    for path in &cli.units {
        units.push(read_unit(path).map_err(|e| e.to_string())?);
    }

    let results = lower_units(&mut units, &options).map_err(|e| e.to_string())?;

    let mut all_ok = true;
    for (unit, result) in units.iter().zip(results) {
        let report = match result {
            Ok(report) => report,
            Err(e) => {
                log::error!("{}: {}", unit.name, e);
                eprintln!("✗ {}: {}", unit.name, e);
                if let Some(help) = e.error_code().and_then(|code| code.help) {
                    eprintln!("  help: {}", help);
                }
                all_ok = false;
                continue;
            }
        };

        let totals = report.totals();
        let summary: Vec<String> = totals
            .stats
            .iter()
            .map(|(key, count)| format!("{}={}", key, count))
            .collect();
        if summary.is_empty() {
            println!("✓ {}: unchanged", report.unit);
        } else {
            println!("✓ {}: {}", report.unit, summary.join(" "));
        }

        if cli.dump_captures {
            let json = serde_json::to_string_pretty(&report.registry)
                .map_err(|e| format!("Failed to encode captures of {}: {}", report.unit, e))?;
            println!("{}", json);
        }

        if let Some(dir) = &cli.out {
            let path = write_unit(dir, unit)?;
            if cli.verbose > 0 {
                println!("  wrote {}", path.display());
            }
        }
    }

    Ok(all_ok)
}
