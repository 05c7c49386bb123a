//! Recovery of structured daily analyses from semi-formatted LLM replies.
//!
//! The crate turns the free-text answer of a language model (events as an
//! embedded JSON array, labeled daily scores, chart data in loose line
//! formats) into a validated [`DailyAnalysis`]. Every section falls back to
//! an event-derived reconstruction when the model's text is missing or
//! malformed, so one bad section never sinks the whole document.
//!
//! The [`Analyzer`] trait is the seam to the model provider;
//! [`http_client::AnthropicAnalyzer`] is the reqwest-based implementation.

use async_trait::async_trait;
use thiserror::Error;

pub mod config;
pub mod derive;
pub mod extract;
pub mod http_client;
pub mod model;
pub mod observability;
pub mod recovery;
pub mod sections;
pub mod utils;

pub use model::{
    DailyAnalysis, Event, OverallScores, SocialInteractionDetail, TimelinePoint, TopicDetail,
};
pub use recovery::{Recovered, RecoveryWarning, Section, recover};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("provider unavailable ({status}): {body}")]
    Server { status: u16, body: String },
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("response blocked by provider safety filter")]
    SafetyBlocked,
    #[error("provider returned no content")]
    EmptyResponse,
    #[error("undecodable provider reply: {0}")]
    InvalidReply(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(
        "document validation failed: {reason} (events={events}, timeline={timeline}, social={social}, topics={topics})"
    )]
    Validation {
        reason: String,
        events: usize,
        timeline: usize,
        social: usize,
        topics: usize,
    },
}

impl AnalysisError {
    /// Map a non-success HTTP status to the matching error variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => AnalysisError::Auth(body),
            429 => AnalysisError::RateLimited(body),
            500..=599 => AnalysisError::Server { status, body },
            _ => AnalysisError::Status { status, body },
        }
    }

    /// Provider-side failures that leave a document without analysis but
    /// must not stop the batch.
    pub fn is_provider_failure(&self) -> bool {
        !matches!(
            self,
            AnalysisError::Config(_)
                | AnalysisError::Serialization(_)
                | AnalysisError::Validation { .. }
        )
    }
}

/// A language model that answers one prompt with one block of text.
///
/// Implementations make a single attempt per call; callers decide what a
/// failure means for their batch.
#[async_trait]
pub trait Analyzer: Send + Sync + 'static {
    async fn analyze(&self, prompt: &str) -> Result<String, AnalysisError>;
}

#[cfg(test)]
mod tests {
    use super::AnalysisError;

    #[test]
    fn from_status_maps_known_codes() {
        assert!(matches!(
            AnalysisError::from_status(401, "no".into()),
            AnalysisError::Auth(_)
        ));
        assert!(matches!(
            AnalysisError::from_status(429, "slow down".into()),
            AnalysisError::RateLimited(_)
        ));
        assert!(matches!(
            AnalysisError::from_status(529, "overloaded".into()),
            AnalysisError::Server { status: 529, .. }
        ));
        assert!(matches!(
            AnalysisError::from_status(404, "missing".into()),
            AnalysisError::Status { status: 404, .. }
        ));
    }

    #[test]
    fn provider_failures_are_distinguished_from_document_failures() {
        assert!(AnalysisError::SafetyBlocked.is_provider_failure());
        assert!(AnalysisError::EmptyResponse.is_provider_failure());
        assert!(!AnalysisError::Config("x".into()).is_provider_failure());
        let invalid = AnalysisError::Validation {
            reason: "r".into(),
            events: 0,
            timeline: 0,
            social: 0,
            topics: 0,
        };
        assert!(!invalid.is_provider_failure());
        assert!(invalid.to_string().contains("events=0"));
    }
}
