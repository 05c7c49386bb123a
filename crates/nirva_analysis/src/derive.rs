//! Event-based reconstruction of every summary section.
//!
//! These run when the model's own text for a section is absent or yields
//! nothing. All of them are pure functions of the event list.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use crate::model::{
    Event, MIDPOINT_SCORE, MinuteDistribution, OverallScores, SocialInteractionDetail,
    TimelinePoint, TopicDetail,
};
use crate::utils::parse_clock_time;

const IMPACT_ENERGIZING: &str = "energizing";
const IMPACT_DRAINING: &str = "draining";
const IMPACT_NEUTRAL: &str = "neutral";
const UNKNOWN_ACTIVITY: &str = "unknown";

fn total_minutes(events: &[Event]) -> u64 {
    events.iter().map(|e| u64::from(e.duration_minutes)).sum()
}

/// `sum(score * duration) / sum(duration)`, or `0.0` for zero total duration.
pub fn weighted_average(events: &[Event], score: impl Fn(&Event) -> f64) -> f64 {
    let total = total_minutes(events);
    if total == 0 {
        return 0.0;
    }
    let weighted: f64 = events
        .iter()
        .map(|e| score(e) * f64::from(e.duration_minutes))
        .sum();
    weighted / total as f64
}

/// Weighted daily scores, or `None` when there are no events.
pub fn overall_scores(events: &[Event]) -> Option<OverallScores> {
    (!events.is_empty()).then(|| OverallScores {
        daily_mood_score: weighted_average(events, |e| e.mood_score),
        daily_stress_level_score: weighted_average(events, |e| e.stress_level),
        daily_energy_level_score: weighted_average(events, |e| e.energy_level),
    })
}

/// Explicit value, else the event-weighted one, else the midpoint.
pub fn score_or_derived(explicit: Option<f64>, derived: Option<f64>) -> f64 {
    explicit.or(derived).unwrap_or(MIDPOINT_SCORE)
}

/// One `[start_time, energy]` point per event, ordered by start time.
///
/// Start times that are not a clock value sort after all others, then
/// lexicographically; ties keep event order.
pub fn timeline(events: &[Event]) -> Vec<TimelinePoint> {
    let mut ordered: Vec<&Event> = events.iter().collect();
    ordered.sort_by(|a, b| {
        let (ta, tb) = (parse_clock_time(a.start_time()), parse_clock_time(b.start_time()));
        match (ta, tb) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.start_time().cmp(b.start_time()),
        }
    });
    ordered
        .into_iter()
        .map(|e| TimelinePoint::new(e.start_time(), e.energy_level.to_string()))
        .collect()
}

/// Minutes summed per key; events with an empty key are skipped.
pub fn minutes_by<'a>(events: &'a [Event], key: impl Fn(&'a Event) -> &'a str) -> MinuteDistribution {
    let mut out = MinuteDistribution::new();
    for event in events {
        let label = key(event).trim();
        if label.is_empty() {
            continue;
        }
        let minutes = out.entry(label.to_string()).or_default();
        *minutes = minutes.saturating_add(event.duration_minutes);
    }
    out
}

/// Minutes per primary mood label.
pub fn mood_distribution(events: &[Event]) -> MinuteDistribution {
    minutes_by(events, Event::primary_mood)
}

/// Minutes per activity type; unlabeled events count as `unknown`.
pub fn awake_time_allocation(events: &[Event]) -> MinuteDistribution {
    minutes_by(events, |e| {
        let activity = e.activity_type.trim();
        if activity.is_empty() { UNKNOWN_ACTIVITY } else { activity }
    })
}

#[derive(Default)]
struct PersonTally {
    minutes: u32,
    energizing: bool,
    draining: bool,
    observation: Option<String>,
}

impl PersonTally {
    fn add(&mut self, event: &Event) {
        self.minutes = self.minutes.saturating_add(event.duration_minutes);
        let impact = event.inferred_impact_on_subject.to_lowercase();
        self.energizing |= impact.contains(IMPACT_ENERGIZING);
        self.draining |= impact.contains(IMPACT_DRAINING);
        if self.observation.is_none() && !event.context_summary.trim().is_empty() {
            self.observation = Some(event.context_summary.trim().to_string());
        }
    }

    fn finish(self, name: String) -> SocialInteractionDetail {
        let impact = if self.energizing {
            IMPACT_ENERGIZING
        } else if self.draining {
            IMPACT_DRAINING
        } else {
            IMPACT_NEUTRAL
        };
        let mut detail = SocialInteractionDetail::new(name);
        detail.total_interaction_time = format!("{} minutes", self.minutes);
        detail.overall_inferred_impact = impact.to_string();
        if let Some(observation) = self.observation {
            detail.key_observation = observation;
        }
        detail
    }
}

/// One record per participant other than `Self`, in order of first
/// appearance.
pub fn social_interactions(events: &[Event]) -> Vec<SocialInteractionDetail> {
    let mut order: Vec<String> = Vec::new();
    let mut tallies: HashMap<String, PersonTally> = HashMap::new();
    for event in events {
        let mut seen: Vec<&str> = Vec::new();
        for person in &event.people_involved {
            let name = person.trim();
            if name.is_empty() || Event::is_self(name) || seen.contains(&name) {
                continue;
            }
            seen.push(name);
            tallies
                .entry(name.to_string())
                .or_insert_with(|| {
                    order.push(name.to_string());
                    PersonTally::default()
                })
                .add(event);
        }
    }
    order
        .into_iter()
        .filter_map(|name| {
            let tally = tallies.remove(&name)?;
            Some(tally.finish(name))
        })
        .collect()
}

fn is_blank_topic(label: &str) -> bool {
    let lower = label.trim().to_lowercase();
    lower.is_empty() || lower == "n/a" || lower == "none"
}

/// One record per topic label, ranked by minutes, then event count, then
/// name.
pub fn topic_analysis(events: &[Event]) -> Vec<TopicDetail> {
    let mut tallies: BTreeMap<String, (u32, u32)> = BTreeMap::new();
    for event in events {
        let mut seen: Vec<&str> = Vec::new();
        for label in &event.topic_labels {
            let label = label.trim();
            if is_blank_topic(label) || seen.contains(&label) {
                continue;
            }
            seen.push(label);
            let (count, minutes) = tallies.entry(label.to_string()).or_default();
            *count += 1;
            *minutes = minutes.saturating_add(event.duration_minutes);
        }
    }

    let mut ranked: Vec<(String, (u32, u32))> = tallies.into_iter().collect();
    ranked.sort_by_key(|(name, (count, minutes))| (Reverse(*minutes), Reverse(*count), name.clone()));
    ranked
        .into_iter()
        .zip(1u32..)
        .map(|((topic_name, (count, minutes)), rank)| TopicDetail {
            rank: Some(rank),
            topic_name,
            num_events: Some(count),
            total_duration_minutes: Some(minutes),
            raw_description: format!("{count} events, {minutes} minutes"),
        })
        .collect()
}
