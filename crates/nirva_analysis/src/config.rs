use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::AnalysisError;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-3-opus-20240229";
pub const DEFAULT_MAX_TOKENS: u32 = 4000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Settings for the model provider.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl ProviderConfig {
    pub fn from_env() -> Result<Self, AnalysisError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Read settings through `get` so tests never touch the process
    /// environment.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, AnalysisError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let api = get("ANTHROPIC_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AnalysisError::Config("ANTHROPIC_API_KEY missing".into()))?;
        let base_url = get("NIRVA_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());
        let model = get("NIRVA_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into());
        let max_tokens = parse_or(&mut get, "NIRVA_MAX_TOKENS", DEFAULT_MAX_TOKENS)?;
        let temperature = parse_or(&mut get, "NIRVA_TEMPERATURE", DEFAULT_TEMPERATURE)?;
        let timeout_secs = parse_or(&mut get, "NIRVA_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        Ok(Self {
            api_key: SecretString::new(api.into()),
            base_url,
            model,
            max_tokens,
            temperature,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Parse `key` when set; a present but unparsable value is an error.
pub fn parse_or<F, T>(get: &mut F, key: &str, default: T) -> Result<T, AnalysisError>
where
    F: FnMut(&str) -> Option<String>,
    T: FromStr,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AnalysisError::Config(format!("{key}: cannot parse {raw:?}"))),
    }
}
