use std::path::PathBuf;
use std::str::FromStr;

use chrono::{Datelike, Local};

use crate::error::{PipelineError, PipelineResult};

/// Where the stages read and write, and how many days run at once.
#[derive(Clone, Debug, PartialEq)]
pub struct PipelineConfig {
    pub raw_data_dir: PathBuf,
    pub debug_dir: PathBuf,
    pub analysis_dir: PathBuf,
    /// Name the prompt addresses the journaling subject by.
    pub user_name: String,
    pub concurrency: usize,
    /// Year assigned to `MM-DD_*` transcripts; the current year when unset.
    pub year: Option<i32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            raw_data_dir: PathBuf::from("raw_data"),
            debug_dir: PathBuf::from("debug"),
            analysis_dir: PathBuf::from("analysis"),
            user_name: "user".to_string(),
            concurrency: 1,
            year: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> PipelineResult<Self> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    pub fn from_env_with<F>(mut get: F) -> PipelineResult<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let concurrency: usize = parse_var(&mut get, "NIRVA_CONCURRENCY")?.unwrap_or(1);
        Ok(Self {
            raw_data_dir: get("NIRVA_RAW_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.raw_data_dir),
            debug_dir: get("NIRVA_DEBUG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.debug_dir),
            analysis_dir: get("NIRVA_ANALYSIS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.analysis_dir),
            user_name: get("NIRVA_USER_NAME")
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(defaults.user_name),
            concurrency: concurrency.max(1),
            year: parse_var(&mut get, "NIRVA_YEAR")?,
        })
    }

    pub fn year(&self) -> i32 {
        self.year.unwrap_or_else(|| Local::now().year())
    }
}

fn parse_var<F, T>(get: &mut F, key: &str) -> PipelineResult<Option<T>>
where
    F: FnMut(&str) -> Option<String>,
    T: FromStr,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| PipelineError::Config(format!("{key}: cannot parse {raw:?}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_unset() {
        let cfg = PipelineConfig::from_env_with(|_| None).expect("cfg");
        assert_eq!(cfg, PipelineConfig::default());
        assert_eq!(cfg.year(), Local::now().year());
    }

    #[test]
    fn reads_values() {
        let get = |k: &str| match k {
            "NIRVA_RAW_DATA_DIR" => Some("/data/in".into()),
            "NIRVA_ANALYSIS_DIR" => Some("/data/out".into()),
            "NIRVA_USER_NAME" => Some("Wei".into()),
            "NIRVA_CONCURRENCY" => Some("4".into()),
            "NIRVA_YEAR" => Some("2024".into()),
            _ => None,
        };
        let cfg = PipelineConfig::from_env_with(get).expect("cfg");
        assert_eq!(cfg.raw_data_dir, PathBuf::from("/data/in"));
        assert_eq!(cfg.debug_dir, PathBuf::from("debug"));
        assert_eq!(cfg.analysis_dir, PathBuf::from("/data/out"));
        assert_eq!(cfg.user_name, "Wei");
        assert_eq!(cfg.concurrency, 4);
        assert_eq!(cfg.year(), 2024);
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        let get = |k: &str| (k == "NIRVA_CONCURRENCY").then(|| "0".to_string());
        assert_eq!(PipelineConfig::from_env_with(get).unwrap().concurrency, 1);
    }

    #[test]
    fn unparsable_values_are_errors() {
        let get = |k: &str| (k == "NIRVA_YEAR").then(|| "last year".to_string());
        let err = PipelineConfig::from_env_with(get).unwrap_err();
        assert!(matches!(err, PipelineError::Config(ref m) if m.contains("NIRVA_YEAR")));
    }
}
