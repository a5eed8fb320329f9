//! Analyzer orchestrating parsing, module location and provenance matching.

use crate::clues::SignatureMatcher;
use crate::config::AnalyzeConfig;
use crate::locator::StructuralLocator;
use crate::parser::BundleParser;
use crate::types::{
    AnalysisResult, BundleFile, BundleReport, FunctionRecord, Inspection, InspectorError, Result,
};
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Runs the full pipeline over bundle text.
///
/// The signature and clue lists are fixed at construction and only read
/// afterwards, so one analyzer can serve concurrent calls.
#[derive(Debug, Clone)]
pub struct Analyzer {
    parser: BundleParser,
    locator: StructuralLocator,
    matcher: SignatureMatcher,
    parallel_match: bool,
}

impl Analyzer {
    /// Create an analyzer from a locator and a matcher.
    pub fn new(locator: StructuralLocator, matcher: SignatureMatcher) -> Self {
        Self {
            parser: BundleParser::new(locator.max_depth()),
            locator,
            matcher,
            parallel_match: false,
        }
    }

    /// Analyzer over the built-in signatures and clues.
    pub fn builtin() -> Self {
        Self::new(StructuralLocator::builtin(), SignatureMatcher::builtin())
    }

    /// Build an analyzer from command line options.
    pub fn from_config(config: &AnalyzeConfig) -> Result<Self> {
        let locator = StructuralLocator::new(config.path_signatures()?);
        let matcher = SignatureMatcher::new(config.clue_options.clue_database()?);
        Ok(Self::new(locator, matcher).with_parallel_match(config.parallel_match))
    }

    /// Match the functions of one bundle on the rayon pool.
    pub fn with_parallel_match(mut self, parallel_match: bool) -> Self {
        self.parallel_match = parallel_match;
        self
    }

    pub fn locator(&self) -> &StructuralLocator {
        &self.locator
    }

    pub fn matcher(&self) -> &SignatureMatcher {
        &self.matcher
    }

    /// Analyze a bundle, keeping track of which signature located it.
    pub fn inspect(&self, bundle: &str) -> Result<Inspection> {
        let parsed = self.parser.parse(bundle)?;
        let located = self.locator.locate(&parsed.tree)?;

        let sources = located
            .entries
            .iter()
            .map(|node| {
                bundle
                    .get(node.span.start..node.span.end)
                    .ok_or(InspectorError::InvalidSpan {
                        start: node.span.start,
                        end: node.span.end,
                        len: bundle.len(),
                    })
            })
            .collect::<Result<Vec<&str>>>()?;

        let predictions = self.matcher.predict_all(&sources, self.parallel_match);

        let functions: Vec<FunctionRecord> = sources
            .iter()
            .zip(predictions)
            .enumerate()
            .map(|(index, (code, clue))| FunctionRecord {
                id: index + 1,
                name: clue.module.clone(),
                code: code.to_string(),
                url: clue.url.clone(),
                polyfill: clue.polyfill,
            })
            .collect();

        let result = AnalysisResult { functions };
        debug!(
            "Identified {}/{} functions",
            result.identified_count(),
            result.len()
        );

        Ok(Inspection {
            result,
            signature: located.signature.to_string(),
            parse_errors: parsed.errors,
            salvaged: parsed.salvaged,
        })
    }

    /// Analyze a bundle into its ordered function records.
    pub fn analyze(&self, bundle: &str) -> Result<AnalysisResult> {
        self.inspect(bundle).map(|inspection| inspection.result)
    }

    /// Analyze one bundle file into a report. Failures are recorded, not returned.
    pub fn report(&self, file: &BundleFile) -> BundleReport {
        let start_time = Instant::now();
        let input = file.path.display().to_string();

        let (signature, functions, error) = match self.inspect(&file.content) {
            Ok(inspection) => (Some(inspection.signature), inspection.result, None),
            Err(e) => (None, AnalysisResult::default(), Some(e.to_string())),
        };

        BundleReport {
            input,
            content_hash: file.content_hash.clone(),
            bytes: file.content.len(),
            signature,
            functions,
            error,
            duration_secs: start_time.elapsed().as_secs_f64(),
        }
    }

    /// Analyze several bundle files, up to `parallel` at a time.
    ///
    /// Reports come back in input order. Files with identical content are
    /// analyzed once.
    pub async fn analyze_files(
        self: Arc<Self>,
        files: Vec<BundleFile>,
        parallel: usize,
        progress: Option<ProgressBar>,
    ) -> Vec<BundleReport> {
        let parallel_count = parallel.max(1);

        // Map each input onto the first file with the same content
        let mut first_by_hash: HashMap<String, usize> = HashMap::new();
        let mut slots: Vec<(usize, String)> = Vec::with_capacity(files.len());
        let mut unique: Vec<BundleFile> = Vec::new();
        for file in files {
            let input = file.path.display().to_string();
            match first_by_hash.get(&file.content_hash) {
                Some(&slot) => {
                    debug!("{} duplicates an earlier input, reusing its result", input);
                    slots.push((slot, input));
                }
                None => {
                    first_by_hash.insert(file.content_hash.clone(), unique.len());
                    slots.push((unique.len(), input));
                    unique.push(file);
                }
            }
        }

        let reports: Vec<BundleReport> = stream::iter(unique)
            .map(|file| {
                let analyzer = Arc::clone(&self);
                async move {
                    let fallback = BundleReport {
                        input: file.path.display().to_string(),
                        content_hash: file.content_hash.clone(),
                        bytes: file.content.len(),
                        signature: None,
                        functions: AnalysisResult::default(),
                        error: None,
                        duration_secs: 0.0,
                    };
                    match tokio::task::spawn_blocking(move || analyzer.report(&file)).await {
                        Ok(report) => report,
                        Err(e) => BundleReport {
                            error: Some(InspectorError::WorkerError(e.to_string()).to_string()),
                            ..fallback
                        },
                    }
                }
            })
            .buffered(parallel_count)
            .inspect(|_| {
                if let Some(pb) = &progress {
                    pb.inc(1);
                }
            })
            .collect()
            .await;

        if let Some(pb) = &progress {
            pb.finish_and_clear();
        }

        slots
            .into_iter()
            .map(|(slot, input)| BundleReport {
                input,
                ..reports[slot].clone()
            })
            .collect()
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::builtin()
    }
}
