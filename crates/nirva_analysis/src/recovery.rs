//! Response-recovery orchestrator.
//!
//! [`recover`] drives every section parser over one raw reply and falls
//! back to event derivation section by section, so a missing or garbled
//! section never costs the rest of the document.

use std::fmt;

use tracing::{info, warn};

use crate::derive;
use crate::extract::{extract_labeled_score, slice_between_any};
use crate::model::{DailyAnalysis, Event, MinuteDistribution, OverallScores, score_in_range};
use crate::observability::{self, DocumentOutcome};
use crate::sections;
use crate::AnalysisError;

/// Line separating the prompt from the model's reply in a raw artifact.
pub const RESPONSE_MARKER: &str = "=== RESPONSE ===";

const MOOD_LABEL: &str = "Daily Mood Score:";
const STRESS_LABEL: &str = "Daily Stress Level Score:";
const ENERGY_LABEL: &str = "Daily Energy Level Score:";

/// One headed region of the reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Section {
    Events,
    Scores,
    Timeline,
    MoodDistribution,
    AwakeTimeAllocation,
    SocialInteractions,
    TopicAnalysis,
}

impl Section {
    pub const ALL: [Section; 7] = [
        Section::Events,
        Section::Scores,
        Section::Timeline,
        Section::MoodDistribution,
        Section::AwakeTimeAllocation,
        Section::SocialInteractions,
        Section::TopicAnalysis,
    ];

    /// Name of the document field the section fills.
    pub fn name(self) -> &'static str {
        match self {
            Section::Events => "events",
            Section::Scores => "overall_scores",
            Section::Timeline => "energy_timeline",
            Section::MoodDistribution => "mood_distribution",
            Section::AwakeTimeAllocation => "awake_time_allocation",
            Section::SocialInteractions => "social_interactions",
            Section::TopicAnalysis => "topic_analysis",
        }
    }

    /// Headers that open the section, most specific first.
    pub fn start_headers(self) -> &'static [&'static str] {
        match self {
            Section::Events => &["Step 2: Structured Event Analysis (JSON Output)"],
            Section::Scores => &["Overall Daily Scores:"],
            Section::Timeline => &[
                "Energy Level Timeline (Line Graph Data):",
                "Energy Level Timeline:",
            ],
            Section::MoodDistribution => {
                &["Mood Distribution (Pie Chart Data):", "Mood Distribution:"]
            }
            Section::AwakeTimeAllocation => &[
                "Awake Time Allocation (Bar Chart Data):",
                "Awake Time Allocation:",
            ],
            Section::SocialInteractions => &["Social Interaction Summary:"],
            Section::TopicAnalysis => &[
                "Topic Analysis (Ranked List):",
                "Topic Analysis (Ranked List or Bar Chart Data):",
                "Topic Analysis:",
            ],
        }
    }

    /// Headers any one of which closes the section.
    pub fn end_headers(self) -> &'static [&'static str] {
        match self {
            Section::Events => &["Step 3: Daily Summaries and Visualization Data", "Step 3:"],
            Section::Scores => &["Energy Level Timeline", "Mood Distribution"],
            Section::Timeline => &["Mood Distribution", "Awake Time Allocation"],
            Section::MoodDistribution => &[
                "Awake Time Allocation",
                "Social Interaction Summary",
                "Topic Analysis",
            ],
            Section::AwakeTimeAllocation => &["Social Interaction Summary", "Topic Analysis"],
            Section::SocialInteractions => &["Topic Analysis", "\n\n\n"],
            Section::TopicAnalysis => &["\n\n\n"],
        }
    }

    /// The section's text in `body`; `""` when its header is absent.
    pub fn slice(self, body: &str) -> &str {
        slice_between_any(body, self.start_headers(), self.end_headers())
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A tolerated defect in the reply.
#[derive(Clone, Debug, PartialEq)]
pub enum RecoveryWarning {
    MarkerMissing,
    SectionMissing { section: Section },
    MalformedJson { section: Section, error: String },
    EventDropped { event_id: String, reason: String },
    DuplicateEventId { event_id: String, renamed: String },
    ScoreOutOfRange { label: &'static str, value: f64 },
    Derived { section: Section },
}

impl RecoveryWarning {
    /// Derivations are expected behavior; everything else is a defect.
    pub fn is_derivation(&self) -> bool {
        matches!(self, RecoveryWarning::Derived { .. })
    }
}

impl fmt::Display for RecoveryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryWarning::MarkerMissing => {
                write!(f, "response marker missing; using the whole text")
            }
            RecoveryWarning::SectionMissing { section } => {
                write!(f, "section {section} not found")
            }
            RecoveryWarning::MalformedJson { section, error } => {
                write!(f, "malformed JSON in {section}: {error}")
            }
            RecoveryWarning::EventDropped { event_id, reason } => {
                write!(f, "dropped event {event_id}: {reason}")
            }
            RecoveryWarning::DuplicateEventId { event_id, renamed } => {
                write!(f, "duplicate event_id {event_id} renamed to {renamed}")
            }
            RecoveryWarning::ScoreOutOfRange { label, value } => {
                write!(f, "{label} {value} out of range; ignoring it")
            }
            RecoveryWarning::Derived { section } => {
                write!(f, "{section} derived from events")
            }
        }
    }
}

/// A validated document plus everything that had to be tolerated.
#[derive(Clone, Debug, PartialEq)]
pub struct Recovered {
    pub analysis: DailyAnalysis,
    pub warnings: Vec<RecoveryWarning>,
}

impl Recovered {
    /// Warnings other than routine derivations.
    pub fn defects(&self) -> impl Iterator<Item = &RecoveryWarning> {
        self.warnings.iter().filter(|w| !w.is_derivation())
    }
}

/// Text after [`RESPONSE_MARKER`]; `None` when the marker is absent.
pub fn response_body(raw: &str) -> Option<&str> {
    raw.find(RESPONSE_MARKER)
        .map(|at| &raw[at + RESPONSE_MARKER.len()..])
}

/// Recover one day's document from a raw reply.
///
/// Only schema validation can fail; every parse gap is tolerated and
/// reported in [`Recovered::warnings`].
pub fn recover(raw: &str) -> Result<Recovered, AnalysisError> {
    let mut warnings = Vec::new();
    let body = response_body(raw).unwrap_or_else(|| {
        warnings.push(RecoveryWarning::MarkerMissing);
        raw
    });

    let events = recover_events(body, &mut warnings);
    let dropped = warnings
        .iter()
        .filter(|w| matches!(w, RecoveryWarning::EventDropped { .. }))
        .count();
    observability::record_events_dropped(dropped);

    let overall_scores = recover_scores(body, &events, &mut warnings);

    let energy_timeline = section_or_derived(
        Section::Timeline,
        body,
        &mut warnings,
        sections::parse_timeline,
        || derive::timeline(&events),
    );
    let mood_distribution = distribution(Section::MoodDistribution, body, &mut warnings, || {
        derive::mood_distribution(&events)
    });
    let awake_time_allocation =
        distribution(Section::AwakeTimeAllocation, body, &mut warnings, || {
            derive::awake_time_allocation(&events)
        });
    let social_interactions = section_or_derived(
        Section::SocialInteractions,
        body,
        &mut warnings,
        sections::parse_social_interactions,
        || derive::social_interactions(&events),
    );
    let topic_analysis = section_or_derived(
        Section::TopicAnalysis,
        body,
        &mut warnings,
        sections::parse_topic_analysis,
        || derive::topic_analysis(&events),
    );

    let analysis = DailyAnalysis {
        events,
        energy_timeline,
        overall_scores,
        mood_distribution,
        awake_time_allocation,
        social_interactions,
        topic_analysis,
        summary: None,
    };

    for warning in &warnings {
        if let RecoveryWarning::Derived { section } = warning {
            observability::record_section_fallback(*section);
            info!("{warning}");
        } else {
            warn!("{warning}");
        }
    }

    if let Err(e) = analysis.validate() {
        observability::record_document(DocumentOutcome::Invalid);
        return Err(e);
    }
    observability::record_document(DocumentOutcome::Parsed);
    Ok(Recovered { analysis, warnings })
}

fn recover_events(body: &str, warnings: &mut Vec<RecoveryWarning>) -> Vec<Event> {
    let section = Section::Events.slice(body);
    if section.is_empty() {
        warnings.push(RecoveryWarning::SectionMissing {
            section: Section::Events,
        });
        return sections::parse_events(body, warnings);
    }
    sections::parse_events(section, warnings)
}

fn recover_scores(
    body: &str,
    events: &[Event],
    warnings: &mut Vec<RecoveryWarning>,
) -> OverallScores {
    let section = Section::Scores.slice(body);
    if section.is_empty() {
        warnings.push(RecoveryWarning::SectionMissing {
            section: Section::Scores,
        });
    }
    let mut explicit = |label: &'static str| {
        let value = extract_labeled_score(section, label)?;
        if score_in_range(value) {
            Some(value)
        } else {
            warnings.push(RecoveryWarning::ScoreOutOfRange { label, value });
            None
        }
    };
    let (mood, stress, energy) = (
        explicit(MOOD_LABEL),
        explicit(STRESS_LABEL),
        explicit(ENERGY_LABEL),
    );

    if mood.is_none() || stress.is_none() || energy.is_none() {
        warnings.push(RecoveryWarning::Derived {
            section: Section::Scores,
        });
    }
    let derived = derive::overall_scores(events);
    OverallScores {
        daily_mood_score: derive::score_or_derived(
            mood,
            derived.as_ref().map(|d| d.daily_mood_score),
        ),
        daily_stress_level_score: derive::score_or_derived(
            stress,
            derived.as_ref().map(|d| d.daily_stress_level_score),
        ),
        daily_energy_level_score: derive::score_or_derived(
            energy,
            derived.as_ref().map(|d| d.daily_energy_level_score),
        ),
    }
}

/// Parse a section, deriving it instead when it is absent or yields nothing.
fn section_or_derived<T>(
    section: Section,
    body: &str,
    warnings: &mut Vec<RecoveryWarning>,
    parse: impl Fn(&str) -> Vec<T>,
    derive: impl FnOnce() -> Vec<T>,
) -> Vec<T> {
    let text = section.slice(body);
    if text.is_empty() {
        warnings.push(RecoveryWarning::SectionMissing { section });
    } else {
        let parsed = parse(text);
        if !parsed.is_empty() {
            return parsed;
        }
    }
    warnings.push(RecoveryWarning::Derived { section });
    derive()
}

fn distribution(
    section: Section,
    body: &str,
    warnings: &mut Vec<RecoveryWarning>,
    derive: impl FnOnce() -> MinuteDistribution,
) -> MinuteDistribution {
    let text = section.slice(body);
    if text.is_empty() {
        warnings.push(RecoveryWarning::SectionMissing { section });
    } else {
        let parsed = sections::parse_distribution(text);
        if !parsed.is_empty() {
            return parsed;
        }
    }
    warnings.push(RecoveryWarning::Derived { section });
    derive()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENTS: &str = r#"[{"event_id":"e1","event_title":"Standup","time_range":"09:00-09:30","duration_minutes":30,"mood_score":8,"stress_level":2,"energy_level":7,"mood_labels":["happy"],"activity_type":"work","people_involved":["Self","Ana"],"inferred_impact_on_subject":"energizing","topic_labels":["planning"],"context_summary":"sprint kickoff"}]"#;

    fn reply(rest: &str) -> String {
        format!(
            "=== PROMPT ===\nignored [1, 2]\n\n=== RESPONSE ===\nStep 1: notes\nStep 2: Structured Event Analysis (JSON Output)\n{EVENTS}\nStep 3: Daily Summaries and Visualization Data\n{rest}"
        )
    }

    #[test]
    fn section_slices_use_alternate_headers() {
        let body = "Energy Level Timeline:\n[[\"07:00\", 5]]\nMood Distribution:\nhappy: 5 minutes\n";
        assert_eq!(Section::Timeline.slice(body), "[[\"07:00\", 5]]");
        assert_eq!(Section::MoodDistribution.slice(body), "happy: 5 minutes");
        assert_eq!(Section::TopicAnalysis.slice(body), "");
    }

    #[test]
    fn explicit_scores_win() {
        let raw = reply("Overall Daily Scores:\nDaily Mood Score: 6\nDaily Stress Level Score: 4.5\nDaily Energy Level Score: 3\n");
        let rec = recover(&raw).unwrap();
        let scores = &rec.analysis.overall_scores;
        assert_eq!(scores.daily_mood_score, 6.0);
        assert_eq!(scores.daily_stress_level_score, 4.5);
        assert_eq!(scores.daily_energy_level_score, 3.0);
        assert!(!rec.warnings.contains(&RecoveryWarning::Derived {
            section: Section::Scores
        }));
    }

    #[test]
    fn everything_derives_from_events() {
        let rec = recover(&reply("")).unwrap();
        let doc = &rec.analysis;
        assert_eq!(doc.events.len(), 1);
        assert_eq!(doc.overall_scores.daily_mood_score, 8.0);
        assert_eq!(doc.energy_timeline, vec![crate::TimelinePoint::new("09:00", "7")]);
        assert_eq!(doc.mood_distribution["happy"], 30);
        assert_eq!(doc.awake_time_allocation["work"], 30);
        assert_eq!(doc.social_interactions.len(), 1);
        assert_eq!(doc.social_interactions[0].person_name, "Ana");
        assert_eq!(doc.topic_analysis[0].topic_name, "planning");
        for section in [
            Section::Scores,
            Section::Timeline,
            Section::MoodDistribution,
            Section::AwakeTimeAllocation,
            Section::SocialInteractions,
            Section::TopicAnalysis,
        ] {
            assert!(rec.warnings.contains(&RecoveryWarning::Derived { section }));
        }
    }

    #[test]
    fn out_of_range_explicit_score_is_replaced() {
        let raw = reply("Overall Daily Scores:\nDaily Mood Score: 42\nDaily Stress Level Score: 1\nDaily Energy Level Score: 2\n");
        let rec = recover(&raw).unwrap();
        assert_eq!(rec.analysis.overall_scores.daily_mood_score, 8.0);
        assert!(rec.warnings.iter().any(|w| matches!(
            w,
            RecoveryWarning::ScoreOutOfRange { label: MOOD_LABEL, .. }
        )));
    }

    #[test]
    fn missing_marker_uses_whole_text() {
        let raw = format!("Step 2: Structured Event Analysis (JSON Output)\n{EVENTS}\n");
        let rec = recover(&raw).unwrap();
        assert_eq!(rec.warnings[0], RecoveryWarning::MarkerMissing);
        assert_eq!(rec.analysis.events.len(), 1);
    }

    #[test]
    fn missing_events_header_tries_whole_body() {
        let raw = format!("=== RESPONSE ===\nHere are the events:\n{EVENTS}\n");
        let rec = recover(&raw).unwrap();
        assert_eq!(rec.analysis.events.len(), 1);
        assert!(rec.warnings.contains(&RecoveryWarning::SectionMissing {
            section: Section::Events
        }));
    }

    #[test]
    fn no_events_gives_midpoint_scores() {
        let rec = recover("=== RESPONSE ===\nI could not analyze this transcript.").unwrap();
        let doc = &rec.analysis;
        assert!(doc.events.is_empty());
        assert_eq!(doc.overall_scores, OverallScores::default());
        assert!(doc.energy_timeline.is_empty());
        assert!(doc.mood_distribution.is_empty());
        assert!(rec.defects().count() > 0);
    }

    #[test]
    fn warnings_render_readably() {
        let w = RecoveryWarning::EventDropped {
            event_id: "e9".into(),
            reason: "missing or non-numeric energy_level".into(),
        };
        assert_eq!(w.to_string(), "dropped event e9: missing or non-numeric energy_level");
        assert_eq!(
            RecoveryWarning::Derived { section: Section::Timeline }.to_string(),
            "energy_timeline derived from events"
        );
    }
}
