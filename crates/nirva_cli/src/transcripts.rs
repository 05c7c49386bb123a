//! Discovery and grouping of `MM-DD_*.txt` transcript files.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use nirva_analysis::utils::date_from_transcript_name;
use tracing::warn;

use crate::error::{PipelineError, PipelineResult};

/// Every transcript recorded on one date, combined for a single prompt.
#[derive(Clone, Debug, PartialEq)]
pub struct DayTranscript {
    pub date: NaiveDate,
    pub files: Vec<String>,
    pub text: String,
}

/// `=== name ===` headed blocks joined by a blank line.
pub fn combine(parts: &[(String, String)]) -> String {
    parts
        .iter()
        .map(|(name, content)| format!("=== {name} ===\n{content}"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Transcript files in `dir` grouped by date, oldest first.
///
/// Names that do not carry a valid `MM-DD_` date are skipped with a
/// warning, as are files with no text or that cannot be read as UTF-8.
pub async fn load_days(dir: &Path, year: i32) -> PipelineResult<Vec<DayTranscript>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| PipelineError::io(dir, e))?;
    let mut by_date: BTreeMap<NaiveDate, Vec<(String, PathBuf)>> = BTreeMap::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PipelineError::io(dir, e))?
    {
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if !name.ends_with(".txt") {
            continue;
        }
        match date_from_transcript_name(&name, year) {
            Some(date) => by_date.entry(date).or_default().push((name, path)),
            None => warn!(file = %name, "skipping transcript without a valid MM-DD_ date prefix"),
        }
    }

    let mut days = Vec::with_capacity(by_date.len());
    for (date, mut files) in by_date {
        files.sort();
        let mut parts = Vec::with_capacity(files.len());
        for (name, path) in files {
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(file = %name, error = %e, "skipping unreadable transcript");
                    continue;
                }
            };
            let content = content.trim();
            if content.is_empty() {
                warn!(file = %name, "skipping empty transcript");
                continue;
            }
            parts.push((name, content.to_string()));
        }
        if parts.is_empty() {
            continue;
        }
        days.push(DayTranscript {
            date,
            files: parts.iter().map(|(name, _)| name.clone()).collect(),
            text: combine(&parts),
        });
    }
    Ok(days)
}
