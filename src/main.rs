//! bundle-inspector - Recover module structure from minified webpack bundles.
//!
//! CLI entry point.

use bundle_inspector::clues::ClueRecord;
use bundle_inspector::config::CluesConfig;
use bundle_inspector::notify::ConsoleOutput;
use bundle_inspector::{AnalyzeConfig, Analyzer, BundleReport, Commands, Config, PathSignature};
use clap::Parser;
use std::fs;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Set up logging
    let filter = if config.verbose {
        EnvFilter::new("bundle_inspector=debug,info")
    } else {
        EnvFilter::new("bundle_inspector=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let outcome = match config.command.clone() {
        Commands::Analyze(analyze_config) => run_analyze(analyze_config, &config).await,
        Commands::Clues(clues_config) => run_clues(clues_config),
        Commands::Paths => {
            ConsoleOutput::default().print_signatures(&PathSignature::builtin());
            Ok(())
        }
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => code,
    }
}

async fn run_analyze(analyze_config: AnalyzeConfig, global_config: &Config) -> Result<(), ExitCode> {
    let analyzer = match Analyzer::from_config(&analyze_config) {
        Ok(a) => Arc::new(a),
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return Err(ExitCode::FAILURE);
        }
    };

    let files = match analyze_config.load_inputs() {
        Ok(f) => f,
        Err(e) => {
            error!("Failed to read input: {}", e);
            return Err(ExitCode::FAILURE);
        }
    };

    let console = ConsoleOutput::new(
        global_config.verbose,
        analyze_config.json,
        analyze_config.quiet,
    );
    let progress = console.create_progress_bar(files.len() as u64, "Analyzing bundles");

    let reports = analyzer
        .analyze_files(files, analyze_config.parallel, progress)
        .await;

    for report in reports.iter().filter(|r| !r.is_success()) {
        if let Some(message) = &report.error {
            error!("{}: {}", report.input, message);
        }
    }

    if analyze_config.json || analyze_config.output.is_some() {
        let json = match reports_to_json(&reports) {
            Ok(j) => j,
            Err(e) => {
                error!("Failed to serialize results: {}", e);
                return Err(ExitCode::FAILURE);
            }
        };

        if let Some(ref output_path) = analyze_config.output {
            if let Err(e) = fs::write(output_path, &json) {
                error!("Failed to write output file: {}", e);
                return Err(ExitCode::FAILURE);
            }
            info!("Results written to: {:?}", output_path);
        }
        if analyze_config.json {
            println!("{}", json);
        }
    }

    if !analyze_config.json {
        for report in &reports {
            console.print_report(report);
        }
    }

    if reports.iter().any(|r| !r.is_success()) {
        return Err(ExitCode::FAILURE);
    }

    Ok(())
}

/// A single bundle serializes as its bare function list.
fn reports_to_json(reports: &[BundleReport]) -> serde_json::Result<String> {
    match reports {
        [single] if single.is_success() => serde_json::to_string_pretty(&single.functions),
        _ => serde_json::to_string_pretty(reports),
    }
}

fn run_clues(clues_config: CluesConfig) -> Result<(), ExitCode> {
    let clues = match clues_config.clue_options.clue_database() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load clues: {}", e);
            return Err(ExitCode::FAILURE);
        }
    };

    if clues_config.json {
        let records: Vec<ClueRecord> = clues.iter().map(|c| c.to_record()).collect();
        match serde_json::to_string_pretty(&records) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize clues: {}", e);
                return Err(ExitCode::FAILURE);
            }
        }
    } else {
        ConsoleOutput::default().print_clues(&clues);
    }

    Ok(())
}
