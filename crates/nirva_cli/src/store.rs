//! Artifact files: raw replies in the debug dir and documents in the
//! analysis dir.
//!
//! Writes go to a sibling `.tmp` file that is synced and then renamed over
//! the target, so readers never observe a partial file.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use nirva_analysis::DailyAnalysis;
use nirva_analysis::recovery::RESPONSE_MARKER;
use nirva_analysis::utils::{analysis_file_name, date_from_response_name, response_file_name};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

/// Marker line preceding the prompt in a raw artifact.
pub const PROMPT_MARKER: &str = "=== PROMPT ===";

/// Body of a raw artifact: the prompt, then the reply after the marker.
pub fn raw_artifact(prompt: &str, reply: &str) -> String {
    format!("{PROMPT_MARKER}\n{prompt}\n\n{RESPONSE_MARKER}\n{reply}")
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Replace `path` with `contents` via temp file and rename.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> PipelineResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| PipelineError::io(parent, e))?;
    }
    let tmp = temp_path(path);
    let mut file = tokio::fs::File::create(&tmp)
        .await
        .map_err(|e| PipelineError::io(&tmp, e))?;
    file.write_all(contents)
        .await
        .map_err(|e| PipelineError::io(&tmp, e))?;
    file.sync_all()
        .await
        .map_err(|e| PipelineError::io(&tmp, e))?;
    drop(file);
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| PipelineError::io(path, e))?;
    debug!(path = %path.display(), bytes = contents.len(), "wrote artifact");
    Ok(())
}

pub async fn write_raw_response(
    debug_dir: &Path,
    date: NaiveDate,
    prompt: &str,
    reply: &str,
) -> PipelineResult<PathBuf> {
    let path = debug_dir.join(response_file_name(date));
    write_atomic(&path, raw_artifact(prompt, reply).as_bytes()).await?;
    Ok(path)
}

/// Pretty-printed JSON with a trailing newline.
pub async fn write_document(
    analysis_dir: &Path,
    date: NaiveDate,
    doc: &DailyAnalysis,
) -> PipelineResult<PathBuf> {
    let mut json = serde_json::to_string_pretty(doc)?;
    json.push('\n');
    let path = analysis_dir.join(analysis_file_name(date));
    write_atomic(&path, json.as_bytes()).await?;
    Ok(path)
}

pub async fn read_document(path: &Path) -> PipelineResult<DailyAnalysis> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PipelineError::io(path, e))?;
    Ok(serde_json::from_str(&text)?)
}

/// Raw artifacts in `debug_dir` with their dates, oldest first.
///
/// Files whose name does not match `raw_response_YYYY-MM-DD.txt` are
/// ignored; a missing directory yields an empty list.
pub async fn list_raw_responses(debug_dir: &Path) -> PipelineResult<Vec<(NaiveDate, PathBuf)>> {
    let mut entries = match tokio::fs::read_dir(debug_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(PipelineError::io(debug_dir, e)),
    };
    let mut found = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| PipelineError::io(debug_dir, e))?
    {
        let path = entry.path();
        let date = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(date_from_response_name);
        match date {
            Some(date) => found.push((date, path)),
            None => debug!(path = %path.display(), "not a raw response artifact"),
        }
    }
    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_artifact_layout() {
        assert_eq!(
            raw_artifact("P", "R"),
            "=== PROMPT ===\nP\n\n=== RESPONSE ===\nR"
        );
    }

    #[test]
    fn temp_path_is_a_sibling() {
        let p = Path::new("/out/daily_analysis_2025-01-01.json");
        assert_eq!(
            temp_path(p),
            PathBuf::from("/out/daily_analysis_2025-01-01.json.tmp")
        );
    }

    #[tokio::test]
    async fn write_document_overwrites_atomically() {
        let dir = tempfile::tempdir().expect("tempdir");
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let out = dir.path().join("analysis");

        write_document(&out, date, &DailyAnalysis::unavailable("first"))
            .await
            .expect("write");
        let path = write_document(&out, date, &DailyAnalysis::default())
            .await
            .expect("rewrite");

        assert_eq!(path, out.join("daily_analysis_2025-01-02.json"));
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("}\n"));
        assert_eq!(read_document(&path).await.unwrap(), DailyAnalysis::default());
        let names: Vec<_> = std::fs::read_dir(&out).unwrap().collect();
        assert_eq!(names.len(), 1);
    }

    #[tokio::test]
    async fn list_raw_responses_sorts_and_filters() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in [
            "raw_response_2025-03-02.txt",
            "raw_response_2025-03-01.txt",
            "raw_response_2025-03-01.txt.tmp",
            "notes.txt",
        ] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        let found = list_raw_responses(dir.path()).await.expect("list");
        let dates: Vec<_> = found.iter().map(|(d, _)| d.to_string()).collect();
        assert_eq!(dates, ["2025-03-01", "2025-03-02"]);

        let missing = list_raw_responses(&dir.path().join("absent")).await.unwrap();
        assert!(missing.is_empty());
    }
}
