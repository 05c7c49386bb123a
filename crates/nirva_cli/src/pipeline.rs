//! The two batch stages.
//!
//! `extract` sends each day's transcripts to the model and stores the raw
//! reply; `parse` recovers a document from every stored reply. A failure is
//! contained to its own day: the batch always runs to the end.

use std::fmt;
use std::path::Path;

use chrono::NaiveDate;
use futures_util::{StreamExt, stream};
use nirva_analysis::observability::{DocumentOutcome, record_document};
use nirva_analysis::utils::date_from_response_name;
use nirva_analysis::{Analyzer, DailyAnalysis, recover};
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::prompts::render_prompt;
use crate::store::{list_raw_responses, write_document, write_raw_response};
use crate::transcripts::{DayTranscript, load_days};

/// What happened to one day in one stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DayOutcome {
    /// Raw reply stored for the parse stage.
    Extracted,
    Parsed,
    Invalid,
    Unavailable,
}

/// Per-outcome day counts for a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub extracted: usize,
    pub parsed: usize,
    pub invalid: usize,
    pub unavailable: usize,
    /// Days abandoned on an I/O or setup error.
    pub skipped: usize,
}

impl BatchReport {
    fn record(&mut self, result: PipelineResult<DayOutcome>) {
        match result {
            Ok(DayOutcome::Extracted) => self.extracted += 1,
            Ok(DayOutcome::Parsed) => self.parsed += 1,
            Ok(DayOutcome::Invalid) => self.invalid += 1,
            Ok(DayOutcome::Unavailable) => self.unavailable += 1,
            Err(_) => self.skipped += 1,
        }
    }

    pub fn merge(self, other: BatchReport) -> BatchReport {
        BatchReport {
            extracted: self.extracted + other.extracted,
            parsed: self.parsed + other.parsed,
            invalid: self.invalid + other.invalid,
            unavailable: self.unavailable + other.unavailable,
            skipped: self.skipped + other.skipped,
        }
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "extracted={} parsed={} invalid={} unavailable={} skipped={}",
            self.extracted, self.parsed, self.invalid, self.unavailable, self.skipped
        )
    }
}

#[derive(Clone, Debug)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Stage 1: one provider call per transcript day.
    pub async fn extract(&self, analyzer: &dyn Analyzer) -> PipelineResult<BatchReport> {
        let days = load_days(&self.config.raw_data_dir, self.config.year()).await?;
        info!(days = days.len(), "extract stage starting");
        let results: Vec<_> = stream::iter(days)
            .map(|day| async move {
                let date = day.date;
                (date, self.extract_day(analyzer, day).await)
            })
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;
        Ok(tally(results))
    }

    /// Stage 2: recover a document from every stored raw reply.
    pub async fn parse(&self) -> PipelineResult<BatchReport> {
        let artifacts = list_raw_responses(&self.config.debug_dir).await?;
        info!(artifacts = artifacts.len(), "parse stage starting");
        let results: Vec<_> = stream::iter(artifacts)
            .map(|(date, path)| async move { (date, self.parse_day(date, &path).await) })
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;
        Ok(tally(results))
    }

    /// Stage 2 for explicitly named raw replies, e.g. one re-run by hand.
    ///
    /// Each name must still follow `raw_response_YYYY-MM-DD.txt` since the
    /// date comes from it.
    pub async fn parse_files(&self, paths: &[&Path]) -> PipelineResult<BatchReport> {
        let mut dated = Vec::with_capacity(paths.len());
        for path in paths {
            let date = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(date_from_response_name)
                .ok_or_else(|| PipelineError::InvalidFileName(path.display().to_string()))?;
            dated.push((date, *path));
        }
        let results: Vec<_> = stream::iter(dated)
            .map(|(date, path)| async move { (date, self.parse_day(date, path).await) })
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;
        Ok(tally(results))
    }

    /// Both stages, one after the other.
    pub async fn run(&self, analyzer: &dyn Analyzer) -> PipelineResult<BatchReport> {
        let extracted = self.extract(analyzer).await?;
        let parsed = self.parse().await?;
        Ok(extracted.merge(parsed))
    }

    async fn extract_day(
        &self,
        analyzer: &dyn Analyzer,
        day: DayTranscript,
    ) -> PipelineResult<DayOutcome> {
        let prompt = render_prompt(day.date, &self.config.user_name, &day.text);
        info!(date = %day.date, files = day.files.len(), "requesting analysis");
        match analyzer.analyze(&prompt).await {
            Ok(reply) => {
                let path = write_raw_response(&self.config.debug_dir, day.date, &prompt, &reply)
                    .await?;
                info!(date = %day.date, path = %path.display(), "saved raw response");
                Ok(DayOutcome::Extracted)
            }
            Err(e) if e.is_provider_failure() => {
                warn!(date = %day.date, error = %e, "no analysis available");
                let doc = DailyAnalysis::unavailable(&e.to_string());
                write_document(&self.config.analysis_dir, day.date, &doc).await?;
                record_document(DocumentOutcome::Unavailable);
                Ok(DayOutcome::Unavailable)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn parse_day(&self, date: NaiveDate, path: &Path) -> PipelineResult<DayOutcome> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| PipelineError::io(path, e))?;
        match recover(&raw) {
            Ok(recovered) => {
                let out = write_document(&self.config.analysis_dir, date, &recovered.analysis)
                    .await?;
                info!(
                    %date,
                    events = recovered.analysis.events.len(),
                    warnings = recovered.warnings.len(),
                    path = %out.display(),
                    "saved daily analysis"
                );
                Ok(DayOutcome::Parsed)
            }
            Err(e) => {
                error!(%date, error = %e, "document rejected");
                Ok(DayOutcome::Invalid)
            }
        }
    }
}

fn tally(mut results: Vec<(NaiveDate, PipelineResult<DayOutcome>)>) -> BatchReport {
    results.sort_by_key(|(date, _)| *date);
    let mut report = BatchReport::default();
    for (date, result) in results {
        if let Err(e) = &result {
            error!(%date, error = %e, "day skipped");
        }
        report.record(result);
    }
    report
}
