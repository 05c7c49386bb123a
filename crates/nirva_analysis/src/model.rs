//! Validated document schema shared by recovery and the dashboard.

use std::collections::{BTreeMap, HashSet};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::AnalysisError;

/// Lowest value any mood/stress/energy score may take.
pub const SCORE_MIN: f64 = 0.0;
/// Highest value any mood/stress/energy score may take.
pub const SCORE_MAX: f64 = 10.0;
/// Score used when neither explicit text nor events provide a value.
pub const MIDPOINT_SCORE: f64 = 5.0;

/// Participant name the model uses for solo activities.
pub const SELF_SENTINEL: &str = "Self";

/// Prefix of the summary written when the provider produced no analysis.
pub const UNAVAILABLE_SUMMARY: &str = "[NO ANALYSIS AVAILABLE]";

pub fn score_in_range(value: f64) -> bool {
    value.is_finite() && (SCORE_MIN..=SCORE_MAX).contains(&value)
}

/// One episode of the day.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct Event {
    pub event_id: String,
    pub event_title: String,
    /// `HH:MM-HH:MM`
    pub time_range: String,
    pub duration_minutes: u32,
    pub mood_labels: Vec<String>,
    pub mood_score: f64,
    pub stress_level: f64,
    pub energy_level: f64,
    pub activity_type: String,
    pub people_involved: Vec<String>,
    pub interaction_dynamic: String,
    #[serde(alias = "inferred_impact_on_wei")]
    pub inferred_impact_on_subject: String,
    pub topic_labels: Vec<String>,
    pub context_summary: String,
    pub key_quote_or_moment: String,
}

impl Event {
    /// First token of `time_range`, e.g. `07:30` for `07:30-08:00`.
    pub fn start_time(&self) -> &str {
        self.time_range
            .split('-')
            .next()
            .map(str::trim)
            .unwrap_or_default()
    }

    /// Dominant mood; `neutral` when the model gave no labels.
    pub fn primary_mood(&self) -> &str {
        self.mood_labels
            .first()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .unwrap_or("neutral")
    }

    pub fn is_self(name: &str) -> bool {
        name.trim().eq_ignore_ascii_case(SELF_SENTINEL)
    }

    fn check(&self) -> Result<(), String> {
        for (name, value) in [
            ("mood_score", self.mood_score),
            ("stress_level", self.stress_level),
            ("energy_level", self.energy_level),
        ] {
            if !score_in_range(value) {
                return Err(format!(
                    "event {}: {name} {value} outside [{SCORE_MIN}, {SCORE_MAX}]",
                    self.event_id
                ));
            }
        }
        Ok(())
    }
}

/// Duration-weighted daily aggregates.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct OverallScores {
    pub daily_mood_score: f64,
    pub daily_stress_level_score: f64,
    pub daily_energy_level_score: f64,
}

impl Default for OverallScores {
    fn default() -> Self {
        Self {
            daily_mood_score: MIDPOINT_SCORE,
            daily_stress_level_score: MIDPOINT_SCORE,
            daily_energy_level_score: MIDPOINT_SCORE,
        }
    }
}

/// `[time, energy]`; serialized as a two-element array.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct TimelinePoint(pub String, pub String);

impl TimelinePoint {
    pub fn new(time: impl Into<String>, energy: impl Into<String>) -> Self {
        Self(time.into(), energy.into())
    }

    pub fn time(&self) -> &str {
        &self.0
    }

    pub fn energy(&self) -> &str {
        &self.1
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct SocialInteractionDetail {
    pub person_name: String,
    #[serde(default = "unknown")]
    pub total_interaction_time: String,
    #[serde(default = "neutral")]
    pub overall_inferred_impact: String,
    #[serde(default = "not_available")]
    pub key_observation: String,
}

fn unknown() -> String {
    "Unknown".to_string()
}

fn neutral() -> String {
    "Neutral".to_string()
}

fn not_available() -> String {
    "N/A".to_string()
}

impl SocialInteractionDetail {
    /// A record with placeholder values for every detail field.
    pub fn new(person_name: impl Into<String>) -> Self {
        Self {
            person_name: person_name.into(),
            total_interaction_time: unknown(),
            overall_inferred_impact: neutral(),
            key_observation: not_available(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct TopicDetail {
    #[serde(default)]
    pub rank: Option<u32>,
    pub topic_name: String,
    #[serde(default)]
    pub num_events: Option<u32>,
    #[serde(default)]
    pub total_duration_minutes: Option<u32>,
    /// Detail text as written by the model, e.g. `3 events, 135 minutes`.
    #[serde(default)]
    pub raw_description: String,
}

/// Label to total minutes.
pub type MinuteDistribution = BTreeMap<String, u32>;

/// Root document: one per day, immutable once recovered.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct DailyAnalysis {
    pub events: Vec<Event>,
    pub energy_timeline: Vec<TimelinePoint>,
    pub overall_scores: OverallScores,
    pub mood_distribution: MinuteDistribution,
    pub awake_time_allocation: MinuteDistribution,
    pub social_interactions: Vec<SocialInteractionDetail>,
    pub topic_analysis: Vec<TopicDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl DailyAnalysis {
    /// Document for a day whose provider call produced nothing usable.
    pub fn unavailable(reason: &str) -> Self {
        Self {
            summary: Some(format!("{UNAVAILABLE_SUMMARY} {reason}")),
            ..Self::default()
        }
    }

    pub fn is_available(&self) -> bool {
        !self
            .summary
            .as_deref()
            .is_some_and(|s| s.starts_with(UNAVAILABLE_SUMMARY))
    }

    /// Check every field constraint of the schema.
    ///
    /// This is the contract boundary with downstream consumers; a failure
    /// carries entry counts so the offending payload can be diagnosed.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.check().map_err(|reason| AnalysisError::Validation {
            reason,
            events: self.events.len(),
            timeline: self.energy_timeline.len(),
            social: self.social_interactions.len(),
            topics: self.topic_analysis.len(),
        })
    }

    fn check(&self) -> Result<(), String> {
        let mut ids = HashSet::new();
        for event in &self.events {
            event.check()?;
            if !ids.insert(event.event_id.as_str()) {
                return Err(format!("duplicate event_id {}", event.event_id));
            }
        }
        let scores = &self.overall_scores;
        for (name, value) in [
            ("daily_mood_score", scores.daily_mood_score),
            ("daily_stress_level_score", scores.daily_stress_level_score),
            ("daily_energy_level_score", scores.daily_energy_level_score),
        ] {
            if !score_in_range(value) {
                return Err(format!("{name} {value} outside [{SCORE_MIN}, {SCORE_MAX}]"));
            }
        }
        if let Some(person) = self
            .social_interactions
            .iter()
            .find(|s| s.person_name.trim().is_empty())
        {
            return Err(format!("social interaction without a name: {person:?}"));
        }
        if self
            .topic_analysis
            .iter()
            .any(|t| t.topic_name.trim().is_empty())
        {
            return Err("topic without a name".to_string());
        }
        Ok(())
    }
}
