//! Counters recorded through the `metrics` facade.
//!
//! Every helper is a no-op until a recorder is installed (the binary
//! installs a Prometheus one on request).

use metrics::counter;

use crate::recovery::Section;

pub const DOCUMENTS_TOTAL: &str = "nirva_documents_total";
pub const EVENTS_DROPPED_TOTAL: &str = "nirva_events_dropped_total";
pub const SECTION_FALLBACKS_TOTAL: &str = "nirva_section_fallbacks_total";
pub const PROVIDER_REQUESTS_TOTAL: &str = "nirva_provider_requests_total";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentOutcome {
    Parsed,
    Invalid,
    Unavailable,
}

impl DocumentOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentOutcome::Parsed => "parsed",
            DocumentOutcome::Invalid => "invalid",
            DocumentOutcome::Unavailable => "unavailable",
        }
    }
}

pub fn record_document(outcome: DocumentOutcome) {
    counter!(DOCUMENTS_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

pub fn record_events_dropped(count: usize) {
    if count > 0 {
        counter!(EVENTS_DROPPED_TOTAL).increment(count as u64);
    }
}

pub fn record_section_fallback(section: Section) {
    counter!(SECTION_FALLBACKS_TOTAL, "section" => section.name()).increment(1);
}

/// `outcome` is `ok` or a short failure tag such as `rate_limited`.
pub fn record_provider_request(outcome: &'static str) {
    counter!(PROVIDER_REQUESTS_TOTAL, "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_labels() {
        assert_eq!(DocumentOutcome::Parsed.as_str(), "parsed");
        assert_eq!(DocumentOutcome::Invalid.as_str(), "invalid");
        assert_eq!(DocumentOutcome::Unavailable.as_str(), "unavailable");
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_document(DocumentOutcome::Parsed);
        record_events_dropped(3);
        record_section_fallback(Section::Timeline);
        record_provider_request("ok");
    }
}
