//! Date and file-name helpers shared by the pipeline stages.

use chrono::{NaiveDate, NaiveTime};

const RESPONSE_PREFIX: &str = "raw_response_";
const ANALYSIS_PREFIX: &str = "daily_analysis_";

/// Date of a transcript named `MM-DD_<anything>.txt` in `year`.
///
/// Returns `None` for other names and for impossible dates such as `02-30`.
pub fn date_from_transcript_name(name: &str, year: i32) -> Option<NaiveDate> {
    name.strip_suffix(".txt")?;
    let (prefix, _) = name.split_once('_')?;
    let (month, day) = prefix.split_once('-')?;
    if month.len() != 2 || day.len() != 2 {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

/// Date of a raw artifact named `raw_response_YYYY-MM-DD.txt`.
pub fn date_from_response_name(name: &str) -> Option<NaiveDate> {
    let stem = name.strip_prefix(RESPONSE_PREFIX)?.strip_suffix(".txt")?;
    NaiveDate::parse_from_str(stem, "%Y-%m-%d").ok()
}

pub fn response_file_name(date: NaiveDate) -> String {
    format!("{RESPONSE_PREFIX}{}.txt", date.format("%Y-%m-%d"))
}

pub fn analysis_file_name(date: NaiveDate) -> String {
    format!("{ANALYSIS_PREFIX}{}.json", date.format("%Y-%m-%d"))
}

/// `MM.DD.YYYY`, the form the prompt template expects.
pub fn prompt_date(date: NaiveDate) -> String {
    date.format("%m.%d.%Y").to_string()
}

/// Clock time written as `H:MM`, `HH:MM` or `HH:MM:SS`.
pub fn parse_clock_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}
