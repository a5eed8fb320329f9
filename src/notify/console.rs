//! Colored console output for analysis results.

use crate::clues::{Clue, ProvenanceClue};
use crate::locator::PathSignature;
use crate::types::{BundleReport, FunctionRecord};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

/// Console output handler with colors and formatting.
pub struct ConsoleOutput {
    verbose: bool,
    json_mode: bool,
    quiet: bool,
}

impl ConsoleOutput {
    /// Create a new console output handler.
    pub fn new(verbose: bool, json_mode: bool, quiet: bool) -> Self {
        Self {
            verbose,
            json_mode,
            quiet,
        }
    }

    /// Print every function of a report, then its summary.
    pub fn print_report(&self, report: &BundleReport) {
        if self.json_mode {
            return;
        }

        println!();
        println!(
            "{} Bundle: {} ({} bytes)",
            "[*]".bright_blue(),
            report.input.bright_white(),
            report.bytes
        );

        if let Some(error) = &report.error {
            println!("    {} {}", "error:".red().bold(), error);
            return;
        }

        if !self.quiet {
            for function in &report.functions.functions {
                self.print_function(function);
            }
        }

        self.print_summary(report);
    }

    /// Print one recovered function.
    pub fn print_function(&self, function: &FunctionRecord) {
        let name = if function.is_identified() {
            function.name.bright_white().bold()
        } else {
            "unknown".dimmed()
        };
        let marker = if function.polyfill {
            " [polyfill]".yellow()
        } else {
            "".normal()
        };

        println!(
            "  {:>5}  {}{}  {}",
            format!("#{}", function.id).bright_cyan(),
            name,
            marker,
            format!("{} bytes", function.code.len()).dimmed()
        );

        if self.verbose && !function.url.is_empty() {
            println!("         {}", function.url.dimmed());
        }
    }

    /// Print the per-bundle summary.
    pub fn print_summary(&self, report: &BundleReport) {
        let result = &report.functions;

        println!();
        println!("{}", "=== Bundle Summary ===".bright_cyan());
        if let Some(signature) = &report.signature {
            println!("  Signature:   {}", signature.dimmed());
        }
        println!("  Duration:    {:.2}s", report.duration_secs);
        println!("  Functions:   {}", result.len());
        println!(
            "  Identified:  {}",
            format!("{}", result.identified_count()).green()
        );
        println!("  Polyfills:   {}", result.polyfill_count());

        let counts = result.module_counts();
        if !counts.is_empty() {
            println!();
            for (module, count) in counts {
                println!("  - {} ({})", module, count);
            }
        }
    }

    /// Print a clue database listing.
    pub fn print_clues(&self, clues: &[ProvenanceClue]) {
        for (i, clue) in clues.iter().enumerate() {
            let kind = match clue.includes {
                Clue::Literal(_) => "literal".normal(),
                Clue::Pattern(_) => "pattern".magenta(),
            };
            let polyfill = if clue.polyfill {
                " [polyfill]".yellow()
            } else {
                "".normal()
            };
            println!(
                "{:>3}. {}{} ({}) {}",
                i + 1,
                clue.module.bright_white().bold(),
                polyfill,
                kind,
                clue.includes.as_str().dimmed()
            );
        }
    }

    /// Print the path signatures in the order they are tried.
    pub fn print_signatures(&self, signatures: &[PathSignature]) {
        for (i, signature) in signatures.iter().enumerate() {
            println!("{:>3}. {}", i + 1, signature);
        }
    }

    /// Create a progress bar.
    pub fn create_progress_bar(&self, total: u64, message: &str) -> Option<ProgressBar> {
        if self.json_mode || total < 2 {
            return None;
        }

        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .ok()?
            .progress_chars("#>-");
        pb.set_style(style);
        pb.set_message(message.to_string());
        Some(pb)
    }
}

impl Default for ConsoleOutput {
    fn default() -> Self {
        Self::new(false, false, false)
    }
}
