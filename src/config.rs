//! Command line configuration.

use crate::clues::{builtin_clues, load_clues, ProvenanceClue};
use crate::locator::PathSignature;
use crate::types::{BundleFile, InspectorError, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;

/// Recover module boundaries and library provenance from webpack bundles.
#[derive(Parser, Debug, Clone)]
#[command(name = "bundle-inspector")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Analyze one or more bundles
    Analyze(AnalyzeConfig),
    /// List the provenance clue database
    Clues(CluesConfig),
    /// List the built-in path signatures
    Paths,
}

/// Where clues come from.
#[derive(Args, Debug, Clone, Default)]
pub struct ClueOptions {
    /// JSON file with extra clues, tried before the built-in ones
    #[arg(long, env = "BUNDLE_INSPECTOR_CLUES")]
    pub clues: Option<PathBuf>,

    /// Do not use the built-in clue database
    #[arg(long)]
    pub no_builtin_clues: bool,
}

impl ClueOptions {
    /// Clue file entries followed by the built-in database.
    pub fn clue_database(&self) -> Result<Vec<ProvenanceClue>> {
        let mut clues = match &self.clues {
            Some(path) => load_clues(path)?,
            None => Vec::new(),
        };

        if !self.no_builtin_clues {
            clues.extend(builtin_clues());
        }

        if clues.is_empty() {
            return Err(InspectorError::ConfigError(
                "no clues configured: pass --clues or drop --no-builtin-clues".to_string(),
            ));
        }

        Ok(clues)
    }
}

/// Configuration for the analyze command.
#[derive(Parser, Debug, Clone)]
pub struct AnalyzeConfig {
    /// Bundle file(s) to analyze, `-` reads stdin
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Write JSON results to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print JSON results to stdout
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub clue_options: ClueOptions,

    /// Extra path signature (dotted, e.g. body.0.expression.arguments.0.elements),
    /// tried before the built-in ones
    #[arg(long = "path", value_name = "SIGNATURE")]
    pub paths: Vec<String>,

    /// Number of bundles analyzed concurrently
    #[arg(long, short = 'p', default_value = "1")]
    pub parallel: usize,

    /// Match the functions of each bundle across all cores
    #[arg(long)]
    pub parallel_match: bool,

    /// Quiet mode: only print the summary of each bundle
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            output: None,
            json: false,
            clue_options: ClueOptions::default(),
            paths: Vec::new(),
            parallel: 1,
            parallel_match: false,
            quiet: false,
        }
    }
}

impl AnalyzeConfig {
    /// User signatures followed by the built-in list.
    pub fn path_signatures(&self) -> Result<Vec<PathSignature>> {
        let mut signatures = self
            .paths
            .iter()
            .map(|p| p.parse())
            .collect::<Result<Vec<PathSignature>>>()?;
        for signature in PathSignature::builtin() {
            if !signatures.contains(&signature) {
                signatures.push(signature);
            }
        }
        Ok(signatures)
    }

    /// Read every input bundle.
    pub fn load_inputs(&self) -> Result<Vec<BundleFile>> {
        let mut files = Vec::with_capacity(self.inputs.len());
        for path in &self.inputs {
            let content = if path.as_os_str() == "-" {
                let mut buffer = String::new();
                std::io::stdin().read_to_string(&mut buffer)?;
                buffer
            } else {
                std::fs::read_to_string(path)?
            };
            files.push(BundleFile::new(path.clone(), content));
        }
        Ok(files)
    }
}

/// Configuration for the clues command.
#[derive(Parser, Debug, Clone)]
pub struct CluesConfig {
    #[command(flatten)]
    pub clue_options: ClueOptions,

    /// Output the database as a JSON clue file
    #[arg(long)]
    pub json: bool,
}
